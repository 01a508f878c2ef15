use std::collections::BTreeMap;

use crate::record::TaleRecord;

/// Which listing a bucketing pass feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingMode {
    ByTitle,
    ByAuthor,
    ByDate,
}

/// A named group of row placements sharing one grouping key.
///
/// Members are indices into the shared record slice, so a record placed
/// under several authors shares one `TaleRecord` rather than being cloned.
#[derive(Debug, Clone)]
pub struct Group {
    pub key: String,
    pub members: Vec<usize>,
}

/// Buckets in emission order plus any data-quality skips.
#[derive(Debug, Clone)]
pub struct GroupedRecords {
    pub groups: Vec<Group>,
    pub placements: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// The fixed key sequence for the alphabetic listings, in emission order.
pub const ALPHA_KEYS: [&str; 27] = [
    "Misc", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q",
    "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
];

/// Partition records into named groups under the given mode.
///
/// Alphabetic modes always return all 27 groups (empty ones included) in
/// the fixed `Misc, A..Z` order; the date mode returns one group per
/// year-month present, ascending by key.
pub fn bucketize(records: &[TaleRecord], mode: GroupingMode) -> GroupedRecords {
    match mode {
        GroupingMode::ByTitle => bucketize_alpha(records, title_placements(records)),
        GroupingMode::ByAuthor => bucketize_alpha(records, author_placements(records)),
        GroupingMode::ByDate => bucketize_by_date(records),
    }
}

/// A pending placement: the sort name deciding where and in what order the
/// record's row lands, plus the record index.
struct Placement {
    sort_name: String,
    record: usize,
}

fn title_placements(records: &[TaleRecord]) -> Vec<Placement> {
    let mut placements = records
        .iter()
        .enumerate()
        .map(|(index, record)| Placement {
            sort_name: record.title.clone(),
            record: index,
        })
        .collect::<Vec<_>>();
    placements.sort_by_key(|placement| placement.sort_name.to_lowercase());
    placements
}

/// One placement per credited author for records with explicit attribution
/// metadata; a single placement under the fallback author otherwise. The
/// same record row can therefore land in several groups.
fn author_placements(records: &[TaleRecord]) -> Vec<Placement> {
    let mut placements = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if record.explicit_credits {
            for credit in &record.credits {
                placements.push(Placement {
                    sort_name: credit.username.clone(),
                    record: index,
                });
            }
        } else {
            placements.push(Placement {
                sort_name: record.primary_author.clone(),
                record: index,
            });
        }
    }
    placements.sort_by_key(|placement| placement.sort_name.to_lowercase());
    placements
}

fn bucketize_alpha(records: &[TaleRecord], placements: Vec<Placement>) -> GroupedRecords {
    let mut groups = ALPHA_KEYS
        .iter()
        .map(|key| Group {
            key: (*key).to_string(),
            members: Vec::new(),
        })
        .collect::<Vec<_>>();
    let mut warnings = Vec::new();
    let mut skipped = 0usize;
    let mut placed = 0usize;

    for placement in placements {
        let key = alpha_key(&placement.sort_name);
        // The Misc fallback makes a miss impossible, but a malformed key
        // must skip the placement rather than abort the batch.
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => {
                group.members.push(placement.record);
                placed += 1;
            }
            None => {
                skipped += 1;
                warnings.push(format!(
                    "no group for key {key:?} ({}), placement skipped",
                    records[placement.record].fullname
                ));
            }
        }
    }

    GroupedRecords {
        groups,
        placements: placed,
        skipped,
        warnings,
    }
}

fn bucketize_by_date(records: &[TaleRecord]) -> GroupedRecords {
    let mut order = (0..records.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| records[a].created_at.cmp(&records[b].created_at));

    // An explicit ordered map so emission is ascending by key no matter
    // which month was seen first.
    let mut by_month: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut skipped = 0usize;
    let mut placed = 0usize;

    for index in order {
        let record = &records[index];
        let Some(key) = date_key(&record.created_at) else {
            skipped += 1;
            warnings.push(format!(
                "record {} has no usable created_at ({:?}), dropped from the date listing",
                record.fullname, record.created_at
            ));
            continue;
        };
        by_month.entry(key).or_default().push(index);
        placed += 1;
    }

    GroupedRecords {
        groups: by_month
            .into_iter()
            .map(|(key, members)| Group { key, members })
            .collect(),
        placements: placed,
        skipped,
        warnings,
    }
}

/// Group key for an alphabetic listing: the uppercased first character when
/// it is an ASCII letter, `Misc` otherwise (digits, punctuation, empty).
pub fn alpha_key(name: &str) -> String {
    match name.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => first.to_ascii_uppercase().to_string(),
        _ => "Misc".to_string(),
    }
}

/// Group key for the date listing: the `YYYY-MM` prefix of the timestamp.
/// A timestamp too short to carry one means the grouping key is missing.
pub fn date_key(created_at: &str) -> Option<String> {
    if created_at.chars().count() < 7 {
        return None;
    }
    Some(created_at.chars().take(7).collect())
}
