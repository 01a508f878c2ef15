/// Hard ceiling on one output page, in characters. Wikidot refuses source
/// longer than this.
pub const PAGE_CHAR_BUDGET: usize = 200_000;

/// Pack rendered fragments into the fewest pages that respect the budget.
///
/// Greedy first-fit over the fragments in order: a fragment joins the open
/// page while the combined character count stays under the budget, otherwise
/// the open page is finalized and the fragment opens the next one. Fragments
/// are never split, and their order is preserved, so concatenating the pages
/// reproduces the concatenated input. An empty open page always accepts the
/// next fragment; a single fragment over the budget therefore occupies a
/// page alone rather than producing an extra empty page before it.
pub fn paginate(fragments: &[String], budget: usize) -> Vec<String> {
    let mut pages = Vec::new();
    let mut page = String::new();
    let mut page_chars = 0usize;

    for fragment in fragments {
        let fragment_chars = fragment.chars().count();
        if page_chars > 0 && page_chars + fragment_chars >= budget {
            pages.push(std::mem::take(&mut page));
            page_chars = 0;
        }
        page.push_str(fragment);
        page_chars += fragment_chars;
    }

    // The trailing page is emitted even when it holds a single fragment.
    pages.push(page);
    pages
}
