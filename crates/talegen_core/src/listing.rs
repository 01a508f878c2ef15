use anyhow::Result;
use serde::Serialize;

use crate::bucket::{GroupingMode, bucketize};
use crate::paginate::{PAGE_CHAR_BUDGET, paginate};
use crate::record::TaleRecord;
use crate::render::render_fragment;
use crate::sink::PageSink;

/// The three listings the generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    ByTitle,
    ByAuthor,
    ByDate,
}

impl ListingKind {
    pub const ALL: [ListingKind; 3] = [Self::ByTitle, Self::ByAuthor, Self::ByDate];

    pub fn page_name(self) -> &'static str {
        match self {
            Self::ByTitle => "tales-by-title",
            Self::ByAuthor => "tales-by-author",
            Self::ByDate => "tales-by-date",
        }
    }

    fn grouping_mode(self) -> GroupingMode {
        match self {
            Self::ByTitle => GroupingMode::ByTitle,
            Self::ByAuthor => GroupingMode::ByAuthor,
            Self::ByDate => GroupingMode::ByDate,
        }
    }
}

/// Outcome of one listing pass.
#[derive(Debug, Clone, Serialize)]
pub struct ListingReport {
    pub listing: String,
    pub records: usize,
    pub placements: usize,
    pub fragments: usize,
    pub pages_written: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Run one full listing pass: bucketize, render every group to a fragment,
/// pack fragments into pages, persist each page through the sink.
///
/// Records are only read, so the three passes can share one slice. A sink
/// failure propagates immediately; data-quality skips only show up in the
/// report.
pub fn generate_listing(
    records: &[TaleRecord],
    kind: ListingKind,
    sink: &mut dyn PageSink,
) -> Result<ListingReport> {
    let mode = kind.grouping_mode();
    let grouped = bucketize(records, mode);

    let fragments = grouped
        .groups
        .iter()
        .map(|group| render_fragment(group, mode, records))
        .collect::<Vec<_>>();

    let pages = paginate(&fragments, PAGE_CHAR_BUDGET);
    for (offset, content) in pages.iter().enumerate() {
        sink.persist(kind.page_name(), offset + 1, content)?;
    }

    Ok(ListingReport {
        listing: kind.page_name().to_string(),
        records: records.len(),
        placements: grouped.placements,
        fragments: fragments.len(),
        pages_written: pages.len(),
        skipped: grouped.skipped,
        warnings: grouped.warnings,
    })
}

/// Run every requested listing against the same record set.
pub fn generate_listings(
    records: &[TaleRecord],
    kinds: &[ListingKind],
    sink: &mut dyn PageSink,
) -> Result<Vec<ListingReport>> {
    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        reports.push(generate_listing(records, *kind, sink)?);
    }
    Ok(reports)
}
