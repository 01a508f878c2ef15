use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::attribution::{AttributionRow, resolve_credits};
use crate::excerpt::resolve_excerpt;

/// One credited (username, role) pair on a tale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub username: String,
    pub role: String,
}

/// A fully resolved tale article, ready for the listing passes.
///
/// Records are built once and then only read; the three listing passes share
/// the same slice without mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaleRecord {
    pub fullname: String,
    pub title: String,
    pub created_by: Option<String>,
    pub created_at: String,
    pub credits: Vec<Credit>,
    pub explicit_credits: bool,
    pub primary_author: String,
    pub excerpt: String,
}

/// Raw per-page metadata as returned by the wiki API.
#[derive(Debug, Clone)]
pub struct PageMeta {
    pub fullname: String,
    pub title: String,
    pub created_by: Option<String>,
    pub created_at: String,
}

/// Raw page source and rendered HTML as returned by the wiki API.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub source: String,
    pub html: String,
}

/// Combine metadata, page content, and the attribution table into a record.
pub fn resolve_record(
    meta: &PageMeta,
    content: &PageContent,
    attribution_table: &[AttributionRow],
) -> TaleRecord {
    let excerpt = resolve_excerpt(&content.source, &content.html);
    let resolved = resolve_credits(
        &meta.fullname,
        meta.created_by.as_deref(),
        attribution_table,
    );

    TaleRecord {
        fullname: meta.fullname.clone(),
        title: meta.title.clone(),
        created_by: meta.created_by.clone(),
        created_at: meta.created_at.clone(),
        credits: resolved.credits,
        explicit_credits: resolved.explicit,
        primary_author: resolved.primary_author,
        excerpt,
    }
}

/// Write a resolved record set as a pretty JSON snapshot.
pub fn save_snapshot(path: &Path, records: &[TaleRecord]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(records).context("failed to serialize snapshot")?;
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Load a record set back from a JSON snapshot.
pub fn load_snapshot(path: &Path) -> Result<Vec<TaleRecord>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<TaleRecord> =
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(records)
}
