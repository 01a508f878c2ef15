use crate::excerpt::strip_html;
use crate::record::Credit;

/// Displayed in place of an author whose account no longer exists.
pub const DELETED_ACCOUNT: &str = "(account deleted)";

/// One row of the attribution-metadata table: which article, which user,
/// and what kind of credit they hold on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionRow {
    pub fullname: String,
    pub username: String,
    pub role: String,
}

/// Credits resolved for one article.
#[derive(Debug, Clone)]
pub struct ResolvedCredits {
    pub credits: Vec<Credit>,
    /// True when the attribution table named this article explicitly.
    pub explicit: bool,
    /// The author name the by-author listing falls back to for sorting.
    pub primary_author: String,
}

/// Resolve the credit list for an article.
///
/// Every attribution-table row matching the article fullname (value
/// equality, table order preserved) becomes a credit. With no table match,
/// the creator gets a single synthetic "author" credit; a deleted creator
/// account becomes the `(account deleted)` sentinel.
pub fn resolve_credits(
    fullname: &str,
    created_by: Option<&str>,
    table: &[AttributionRow],
) -> ResolvedCredits {
    let matches = table
        .iter()
        .filter(|row| row.fullname == fullname)
        .collect::<Vec<_>>();

    if !matches.is_empty() {
        return ResolvedCredits {
            credits: matches
                .iter()
                .map(|row| Credit {
                    username: row.username.clone(),
                    role: row.role.clone(),
                })
                .collect(),
            explicit: true,
            primary_author: matches[0].username.clone(),
        };
    }

    let author = created_by.unwrap_or(DELETED_ACCOUNT).to_string();
    ResolvedCredits {
        credits: vec![Credit {
            username: author.clone(),
            role: "author".to_string(),
        }],
        explicit: false,
        primary_author: author,
    }
}

/// Parse the attribution-metadata page HTML into rows.
///
/// The page is a plain table; each `<tr>` holds the article fullname, the
/// username, and the credit role as its first three `<td>` cells. Rows with
/// fewer cells (headers, padding) are ignored. Document order is kept so
/// resolution stays reproducible.
pub fn parse_attribution_table(html: &str) -> Vec<AttributionRow> {
    let mut rows = Vec::new();
    for row_html in delimited_sections(html, "<tr", "</tr>") {
        let cells = delimited_sections(row_html, "<td", "</td>")
            .into_iter()
            .map(cell_text)
            .collect::<Vec<_>>();
        if cells.len() >= 3 {
            rows.push(AttributionRow {
                fullname: cells[0].clone(),
                username: cells[1].clone(),
                role: cells[2].clone(),
            });
        }
    }
    rows
}

/// Collect the inner text of every `open...close` section, in order.
/// `open` is matched as a tag prefix, so `<td` also matches `<td class=..>`.
fn delimited_sections<'a>(html: &'a str, open: &str, close: &str) -> Vec<&'a str> {
    let mut sections = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(tag_end) = after_open.find('>') else {
            break;
        };
        let body = &after_open[tag_end + 1..];
        let Some(end) = body.find(close) else {
            break;
        };
        sections.push(&body[..end]);
        rest = &body[end + close.len()..];
    }
    sections
}

fn cell_text(cell: &str) -> String {
    strip_html(cell).trim().to_string()
}
