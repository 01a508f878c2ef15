use crate::attribution::DELETED_ACCOUNT;
use crate::bucket::{Group, GroupingMode};
use crate::record::TaleRecord;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Render one tale as its two table rows: the link/author/date header row
/// and the full-width excerpt row beneath it.
pub fn render_row(record: &TaleRecord) -> String {
    let date = record.created_at.chars().take(10).collect::<String>();
    format!(
        "||[[[{}|]]]||{}||//{}//||\n||||||{}||\n",
        record.fullname,
        attribution_text(record),
        date,
        record.excerpt,
    )
}

/// The author column text for a tale.
///
/// Explicit credits are each rendered as `[[user X]] (role)` and joined with
/// the Wikidot line-continuation separator, no trailing separator. The
/// single-creator fallback renders one such credit, except for a deleted
/// account which stays plain text (there is no user page to link).
///
/// Records loaded from a snapshot may carry no credits at all; those fall
/// back to `primary_author`, and to the deleted-account sentinel when that
/// is empty too.
pub fn attribution_text(record: &TaleRecord) -> String {
    if record.explicit_credits && !record.credits.is_empty() {
        return record
            .credits
            .iter()
            .map(|credit| format!("[[user {}]] ({})", credit.username, credit.role))
            .collect::<Vec<_>>()
            .join(" _\n");
    }
    let author = record
        .credits
        .first()
        .map(|credit| credit.username.as_str())
        .unwrap_or(record.primary_author.as_str());
    if author.is_empty() || author == DELETED_ACCOUNT {
        return DELETED_ACCOUNT.to_string();
    }
    format!("[[user {author}]] (author)")
}

/// Render a whole group into its fragment: anchor, section open, heading,
/// back-to-top link, column headers, every member row, section close.
pub fn render_fragment(group: &Group, mode: GroupingMode, records: &[TaleRecord]) -> String {
    let mut fragment = fragment_header(&group.key, &group_heading(&group.key, mode));
    for &index in &group.members {
        fragment.push_str(&render_row(&records[index]));
    }
    fragment.push_str("[[/div]]\n");
    fragment
}

fn fragment_header(key: &str, heading: &str) -> String {
    format!(
        "[[# {key}]]\n[[div class=\"section\"]]\n+++ {heading}\n[#top \u{21d1}]\n||~ Title||~ Author||~ Created||\n"
    )
}

/// Visible heading for a group. Alphabetic groups use the key itself; date
/// groups turn `YYYY-MM` into `MonthName YYYY`. A key whose month part does
/// not parse falls back to the raw key.
pub fn group_heading(key: &str, mode: GroupingMode) -> String {
    if mode != GroupingMode::ByDate {
        return key.to_string();
    }
    let (year, month) = (key.get(..4), key.get(5..7));
    let month_name = month
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|number| (1..=12).contains(number))
        .map(|number| MONTH_NAMES[number - 1]);
    match (year, month_name) {
        (Some(year), Some(month_name)) => format!("{month_name} {year}"),
        _ => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Group;
    use crate::record::Credit;

    fn tale(fullname: &str, author: &str) -> TaleRecord {
        TaleRecord {
            fullname: fullname.to_string(),
            title: "A Tale".to_string(),
            created_by: Some(author.to_string()),
            created_at: "2016-04-02T11:22:33".to_string(),
            credits: vec![Credit {
                username: author.to_string(),
                role: "author".to_string(),
            }],
            explicit_credits: false,
            primary_author: author.to_string(),
            excerpt: "It begins...".to_string(),
        }
    }

    #[test]
    fn row_layout_is_exact() {
        let record = tale("my-tale", "alice");
        assert_eq!(
            render_row(&record),
            "||[[[my-tale|]]]||[[user alice]] (author)||//2016-04-02//||\n||||||It begins...||\n"
        );
    }

    #[test]
    fn deleted_account_attribution_is_plain_text() {
        let mut record = tale("ghost", DELETED_ACCOUNT);
        record.created_by = None;
        assert_eq!(attribution_text(&record), "(account deleted)");
    }

    #[test]
    fn empty_credits_fall_back_to_the_primary_author() {
        let mut record = tale("orphan", "alice");
        record.credits = Vec::new();
        assert_eq!(attribution_text(&record), "[[user alice]] (author)");

        record.primary_author = String::new();
        assert_eq!(attribution_text(&record), "(account deleted)");

        record.explicit_credits = true;
        assert_eq!(attribution_text(&record), "(account deleted)");
    }

    #[test]
    fn explicit_credits_join_with_line_continuations() {
        let mut record = tale("joint", "Alice");
        record.explicit_credits = true;
        record.credits = vec![
            Credit {
                username: "Alice".to_string(),
                role: "author".to_string(),
            },
            Credit {
                username: "Bob".to_string(),
                role: "artist".to_string(),
            },
        ];
        assert_eq!(
            attribution_text(&record),
            "[[user Alice]] (author) _\n[[user Bob]] (artist)"
        );
    }

    #[test]
    fn fragment_wraps_rows_with_anchor_and_section() {
        let records = vec![tale("my-tale", "alice")];
        let group = Group {
            key: "A".to_string(),
            members: vec![0],
        };
        let fragment = render_fragment(&group, GroupingMode::ByTitle, &records);

        assert!(fragment.starts_with(
            "[[# A]]\n[[div class=\"section\"]]\n+++ A\n[#top \u{21d1}]\n||~ Title||~ Author||~ Created||\n"
        ));
        assert!(fragment.ends_with("[[/div]]\n"));
        assert!(fragment.contains("||[[[my-tale|]]]||"));
    }

    #[test]
    fn empty_group_still_renders_header_and_footer() {
        let group = Group {
            key: "Q".to_string(),
            members: Vec::new(),
        };
        let fragment = render_fragment(&group, GroupingMode::ByTitle, &[]);
        assert_eq!(
            fragment,
            "[[# Q]]\n[[div class=\"section\"]]\n+++ Q\n[#top \u{21d1}]\n||~ Title||~ Author||~ Created||\n[[/div]]\n"
        );
    }

    #[test]
    fn date_heading_uses_the_month_name() {
        assert_eq!(group_heading("2016-04", GroupingMode::ByDate), "April 2016");
        assert_eq!(group_heading("2019-12", GroupingMode::ByDate), "December 2019");
        assert_eq!(group_heading("zzzz-zz", GroupingMode::ByDate), "zzzz-zz");
        assert_eq!(group_heading("A", GroupingMode::ByTitle), "A");
    }

    #[test]
    fn date_anchor_keeps_the_raw_key() {
        let group = Group {
            key: "2016-04".to_string(),
            members: Vec::new(),
        };
        let fragment = render_fragment(&group, GroupingMode::ByDate, &[]);
        assert!(fragment.starts_with("[[# 2016-04]]\n"));
        assert!(fragment.contains("+++ April 2016\n"));
    }
}
