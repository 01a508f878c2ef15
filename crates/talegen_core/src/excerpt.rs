//! Excerpt resolution: either an author-supplied preview directive from the
//! raw page source, or a truncated plain-text rendering of the page HTML.

const PREVIEW_MARKER: &str = "[[include component:preview text=";

/// Auto-excerpts keep the first word boundary before this many characters.
const EXCERPT_PREFIX_CHARS: usize = 201;

/// Resolve the preview text for one tale.
///
/// An explicit `component:preview` directive in the raw source wins over the
/// generated excerpt; its payload is passed through verbatim. Either way the
/// result has `||` escaped so it cannot open a table column when embedded in
/// a cell.
pub fn resolve_excerpt(raw_source: &str, rendered_html: &str) -> String {
    let excerpt = match preview_directive(raw_source) {
        Some(payload) => payload.to_string(),
        None => auto_excerpt(rendered_html),
    };
    escape_columns(&excerpt)
}

/// Find the payload of a `component:preview` include, if the page has one.
/// The payload runs from the marker to the last `]]` on the same line.
pub fn preview_directive(raw_source: &str) -> Option<&str> {
    for line in raw_source.lines() {
        if let Some(start) = line.find(PREVIEW_MARKER) {
            let rest = &line[start + PREVIEW_MARKER.len()..];
            if let Some(end) = rest.rfind("]]") {
                return Some(&rest[..end]);
            }
        }
    }
    None
}

/// Strip the rendered HTML and truncate at a word boundary, appending `...`.
/// Empty or tagless-empty HTML produces a bare `...` rather than failing.
fn auto_excerpt(rendered_html: &str) -> String {
    let text = strip_html(rendered_html).replace('\n', " ");
    let prefix = text.chars().take(EXCERPT_PREFIX_CHARS).collect::<String>();
    let words = prefix.split(' ').collect::<Vec<_>>();
    // The last element is a possibly cut-off word fragment; drop it.
    let mut excerpt = words[..words.len() - 1].join(" ");
    excerpt.push_str("...");
    excerpt
}

/// Escape the Wikidot column delimiter so excerpt text stays inside its cell.
pub fn escape_columns(text: &str) -> String {
    text.replace("||", "@<||>@")
}

/// Remove tags from an HTML snippet and decode the common entities.
pub fn strip_html(html: &str) -> String {
    let mut output = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => output.push(ch),
        }
    }
    decode_entities(&output)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_directive_takes_precedence_over_html() {
        let source = "Some intro.\n[[include component:preview text=A hand-written teaser.]]\nBody.";
        let excerpt = resolve_excerpt(source, "<p>Generated text that must not be used.</p>");
        assert_eq!(excerpt, "A hand-written teaser.");
    }

    #[test]
    fn preview_payload_runs_to_last_bracket_pair_on_the_line() {
        let source = "[[include component:preview text=He said [[this]] happened.]]";
        assert_eq!(
            preview_directive(source),
            Some("He said [[this]] happened.")
        );
    }

    #[test]
    fn auto_excerpt_strips_tags_and_cuts_at_a_word_boundary() {
        let word = "word ";
        let html = format!("<p>{}</p>", word.repeat(50));
        let excerpt = resolve_excerpt("", &html);
        // 201 chars of "word " cuts inside the 41st word; the fragment is
        // dropped and the ellipsis appended.
        assert!(excerpt.ends_with("..."));
        assert!(!excerpt.contains("  "));
        assert!(excerpt.chars().count() <= EXCERPT_PREFIX_CHARS + 3);
    }

    #[test]
    fn auto_excerpt_collapses_line_breaks() {
        let excerpt = resolve_excerpt("", "<p>line one</p>\n<p>line two</p>");
        // The trailing word is treated as a possible fragment and dropped.
        assert_eq!(excerpt, "line one line...");
        assert!(!excerpt.contains('\n'));
    }

    #[test]
    fn empty_html_resolves_to_bare_ellipsis() {
        assert_eq!(resolve_excerpt("", ""), "...");
        assert_eq!(resolve_excerpt("", "<div></div>"), "...");
    }

    #[test]
    fn column_delimiters_are_escaped_in_both_branches() {
        let from_directive =
            resolve_excerpt("[[include component:preview text=a||b]]", "");
        assert_eq!(from_directive, "a@<||>@b");

        let from_html = resolve_excerpt("", "<p>a||b more words here</p>");
        assert!(from_html.starts_with("a@<||>@b"));
    }

    #[test]
    fn double_delimiters_escape_without_overlap() {
        assert_eq!(escape_columns("a||||b"), "a@<||>@@<||>@b");
    }

    #[test]
    fn strip_html_decodes_common_entities() {
        assert_eq!(
            strip_html("<b>a&amp;b</b> &lt;tag&gt;&nbsp;&#39;q&#39;"),
            "a&b <tag> 'q'"
        );
    }
}
