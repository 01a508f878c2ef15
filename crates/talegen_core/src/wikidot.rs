use std::env;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;

use crate::attribution::{AttributionRow, parse_attribution_table};
use crate::config::TalegenConfig;
use crate::record::{PageContent, PageMeta, TaleRecord, resolve_record};
use crate::xmlrpc::{XmlValue, decode_response, encode_request};

/// The metadata call accepts at most this many pages per request.
const META_BATCH_SIZE: usize = 10;

/// The page holding the authoritative attribution table.
const ATTRIBUTION_PAGE: &str = "attribution-metadata";

/// Read side of the wiki API, as much of it as record resolution needs.
pub trait TaleSource {
    /// Fullnames of every page carrying the tale tag.
    fn select_tales(&mut self, tag: &str) -> Result<Vec<String>>;
    /// Metadata for one batch of pages (at most `META_BATCH_SIZE`).
    fn page_meta(&mut self, fullnames: &[String]) -> Result<MetaBatch>;
    /// One page's raw source and rendered HTML.
    fn page_content(&mut self, fullname: &str) -> Result<PageContent>;
    fn request_count(&self) -> usize;
}

/// One `pages.get_meta` batch: the usable entries, plus a warning for every
/// entry dropped as incomplete.
#[derive(Debug, Default)]
pub struct MetaBatch {
    pub metas: Vec<PageMeta>,
    pub warnings: Vec<String>,
}

/// Write side of the wiki API, all the sink needs.
pub trait WikiWriteApi {
    fn save_page(&mut self, page: &str, content: &str, comment: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct WikidotClientConfig {
    pub api_url: String,
    pub site: String,
    pub user: String,
    pub api_key: String,
    pub timeout_ms: u64,
    /// Wikidot allows 240 requests per minute; 250 ms spacing stays under it.
    pub rate_limit_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl WikidotClientConfig {
    pub fn from_config(config: &TalegenConfig) -> Result<Self> {
        Ok(Self {
            api_url: config.api_url(),
            site: config.site()?,
            user: config.api_user()?,
            api_key: config.api_key()?,
            timeout_ms: env_value_u64("WIKIDOT_HTTP_TIMEOUT_MS", 30_000),
            rate_limit_ms: env_value_u64("WIKIDOT_RATE_LIMIT_MS", 250),
            max_retries: env_value_usize("WIKIDOT_HTTP_RETRIES", 2),
            retry_delay_ms: env_value_u64("WIKIDOT_HTTP_RETRY_DELAY_MS", 500),
        })
    }
}

pub struct WikidotClient {
    client: Client,
    config: WikidotClientConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
}

impl WikidotClient {
    pub fn new(config: WikidotClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build Wikidot HTTP client")?;
        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
        })
    }

    /// Fetch and parse the attribution-metadata table.
    pub fn attribution_table(&mut self) -> Result<Vec<AttributionRow>> {
        let content = self.get_page(ATTRIBUTION_PAGE)?;
        Ok(parse_attribution_table(&content.html))
    }

    fn call(&mut self, method: &str, params: &[XmlValue]) -> Result<XmlValue> {
        let body = encode_request(method, params);

        for attempt in 0..=self.config.max_retries {
            self.apply_rate_limit();
            let response = self
                .client
                .post(&self.config.api_url)
                .basic_auth(&self.config.user, Some(&self.config.api_key))
                .header("Content-Type", "text/xml")
                .body(body.clone())
                .send();
            self.last_request_at = Some(Instant::now());
            self.request_count += 1;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        if attempt < self.config.max_retries && is_retryable_status(status) {
                            self.wait_before_retry(attempt);
                            continue;
                        }
                        bail!("Wikidot API request failed with HTTP {status}");
                    }
                    let text = response
                        .text()
                        .context("failed to read Wikidot API response body")?;
                    return decode_response(&text)
                        .with_context(|| format!("bad response to {method}"));
                }
                Err(error) => {
                    if attempt < self.config.max_retries
                        && (error.is_timeout() || error.is_connect())
                    {
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(error).context("failed to call Wikidot API");
                }
            }
        }

        bail!("Wikidot API request exhausted retry budget")
    }

    fn get_page(&mut self, fullname: &str) -> Result<PageContent> {
        let payload = self.call(
            "pages.get_one",
            &[XmlValue::Struct(vec![
                ("site".to_string(), XmlValue::String(self.config.site.clone())),
                ("page".to_string(), XmlValue::String(fullname.to_string())),
            ])],
        )?;
        Ok(PageContent {
            source: payload
                .get("content")
                .and_then(XmlValue::as_str)
                .unwrap_or_default()
                .to_string(),
            html: payload
                .get("html")
                .and_then(XmlValue::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    fn apply_rate_limit(&mut self) {
        if let Some(last) = self.last_request_at {
            let min_delay = Duration::from_millis(self.config.rate_limit_ms);
            let elapsed = last.elapsed();
            if elapsed < min_delay {
                sleep(min_delay - elapsed);
            }
        }
    }

    fn wait_before_retry(&self, attempt: usize) {
        sleep(Duration::from_millis(
            self.config.retry_delay_ms.saturating_mul(attempt as u64 + 1),
        ));
    }
}

impl TaleSource for WikidotClient {
    fn select_tales(&mut self, tag: &str) -> Result<Vec<String>> {
        let payload = self.call(
            "pages.select",
            &[XmlValue::Struct(vec![
                ("site".to_string(), XmlValue::String(self.config.site.clone())),
                (
                    "tags_all".to_string(),
                    XmlValue::Array(vec![XmlValue::String(tag.to_string())]),
                ),
            ])],
        )?;
        let fullnames = payload
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(XmlValue::as_str)
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(fullnames)
    }

    fn page_meta(&mut self, fullnames: &[String]) -> Result<MetaBatch> {
        let pages = fullnames
            .iter()
            .map(|name| XmlValue::String(name.clone()))
            .collect::<Vec<_>>();
        let payload = self.call(
            "pages.get_meta",
            &[XmlValue::Struct(vec![
                ("site".to_string(), XmlValue::String(self.config.site.clone())),
                ("pages".to_string(), XmlValue::Array(pages)),
            ])],
        )?;
        Ok(flatten_meta(&payload))
    }

    fn page_content(&mut self, fullname: &str) -> Result<PageContent> {
        self.get_page(fullname)
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

impl WikiWriteApi for WikidotClient {
    fn save_page(&mut self, page: &str, content: &str, comment: &str) -> Result<()> {
        self.call(
            "pages.save_one",
            &[XmlValue::Struct(vec![
                ("site".to_string(), XmlValue::String(self.config.site.clone())),
                ("page".to_string(), XmlValue::String(page.to_string())),
                (
                    "revision_comment".to_string(),
                    XmlValue::String(comment.to_string()),
                ),
                ("content".to_string(), XmlValue::String(content.to_string())),
            ])],
        )?;
        Ok(())
    }
}

/// Pull the per-page structs out of a `pages.get_meta` response, which maps
/// fullname to a metadata struct. Response member order is kept. An entry
/// missing its title or creation date is dropped with a warning rather than
/// failing the batch.
pub fn flatten_meta(payload: &XmlValue) -> MetaBatch {
    let mut batch = MetaBatch::default();
    let Some(members) = payload.as_struct() else {
        return batch;
    };
    for (fullname, meta) in members {
        let title = meta.get("title").and_then(XmlValue::as_str);
        let created_at = meta.get("created_at").and_then(XmlValue::as_str);
        let (Some(title), Some(created_at)) = (title, created_at) else {
            batch.warnings.push(format!(
                "metadata for {fullname} is incomplete, page skipped"
            ));
            continue;
        };
        let created_by = match meta.get("created_by") {
            Some(XmlValue::String(name)) => Some(name.clone()),
            _ => None,
        };
        batch.metas.push(PageMeta {
            fullname: fullname.clone(),
            title: title.to_string(),
            created_by,
            created_at: created_at.to_string(),
        });
    }
    batch
}

/// The full resolved record set, plus the data-quality skips hit on the way.
#[derive(Debug, Default)]
pub struct CollectedRecords {
    pub records: Vec<TaleRecord>,
    pub warnings: Vec<String>,
}

/// Build the full resolved record set from a tale source plus the
/// attribution table: list the tagged pages, fetch their metadata, then
/// fetch each page's content to resolve its excerpt and credits. Skips
/// reported by the metadata batches are carried through, not dropped.
pub fn collect_records(
    source: &mut dyn TaleSource,
    tag: &str,
    attribution_table: &[AttributionRow],
) -> Result<CollectedRecords> {
    let fullnames = source.select_tales(tag)?;
    let mut metas = Vec::with_capacity(fullnames.len());
    let mut warnings = Vec::new();
    for chunk in fullnames.chunks(META_BATCH_SIZE) {
        let batch = source.page_meta(chunk)?;
        metas.extend(batch.metas);
        warnings.extend(batch.warnings);
    }

    let mut records = Vec::with_capacity(metas.len());
    for meta in &metas {
        let content = source
            .page_content(&meta.fullname)
            .with_context(|| format!("failed to fetch {}", meta.fullname))?;
        records.push(resolve_record(meta, &content, attribution_table));
    }
    Ok(CollectedRecords { records, warnings })
}

fn env_value_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_value_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::AttributionRow;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockSource {
        tales: Vec<String>,
        metas: Vec<PageMeta>,
        contents: HashMap<String, PageContent>,
        requests: usize,
        meta_batches: Vec<usize>,
        meta_warnings: Vec<String>,
    }

    impl TaleSource for MockSource {
        fn select_tales(&mut self, _tag: &str) -> Result<Vec<String>> {
            self.requests += 1;
            Ok(self.tales.clone())
        }

        fn page_meta(&mut self, fullnames: &[String]) -> Result<MetaBatch> {
            self.requests += 1;
            self.meta_batches.push(fullnames.len());
            Ok(MetaBatch {
                metas: self
                    .metas
                    .iter()
                    .filter(|meta| fullnames.contains(&meta.fullname))
                    .cloned()
                    .collect(),
                warnings: std::mem::take(&mut self.meta_warnings),
            })
        }

        fn page_content(&mut self, fullname: &str) -> Result<PageContent> {
            self.requests += 1;
            Ok(self.contents.get(fullname).cloned().unwrap_or_default())
        }

        fn request_count(&self) -> usize {
            self.requests
        }
    }

    fn meta(fullname: &str, title: &str, author: &str) -> PageMeta {
        PageMeta {
            fullname: fullname.to_string(),
            title: title.to_string(),
            created_by: Some(author.to_string()),
            created_at: "2020-06-07T08:09:10".to_string(),
        }
    }

    #[test]
    fn flatten_meta_reads_the_fullname_keyed_struct() {
        let payload = XmlValue::Struct(vec![(
            "my-tale".to_string(),
            XmlValue::Struct(vec![
                ("title".to_string(), XmlValue::String("My Tale".to_string())),
                ("created_by".to_string(), XmlValue::Nil),
                (
                    "created_at".to_string(),
                    XmlValue::String("2016-04-02T11:22:33".to_string()),
                ),
            ]),
        )]);
        let batch = flatten_meta(&payload);
        assert_eq!(batch.metas.len(), 1);
        assert_eq!(batch.metas[0].fullname, "my-tale");
        assert_eq!(batch.metas[0].title, "My Tale");
        assert!(batch.metas[0].created_by.is_none());
        assert!(batch.warnings.is_empty());
    }

    #[test]
    fn flatten_meta_skips_malformed_entries_with_a_warning() {
        let payload = XmlValue::Struct(vec![(
            "broken".to_string(),
            XmlValue::Struct(vec![(
                "title".to_string(),
                XmlValue::String("No date".to_string()),
            )]),
        )]);
        let batch = flatten_meta(&payload);
        assert!(batch.metas.is_empty());
        assert_eq!(batch.warnings.len(), 1);
        assert!(batch.warnings[0].contains("broken"));
    }

    #[test]
    fn collect_records_resolves_each_tale() {
        let mut source = MockSource {
            tales: vec!["a-tale".to_string(), "b-tale".to_string()],
            metas: vec![meta("a-tale", "A Tale", "alice"), meta("b-tale", "B Tale", "bob")],
            ..Default::default()
        };
        source.contents.insert(
            "a-tale".to_string(),
            PageContent {
                source: String::new(),
                html: "<p>First story text goes here at length.</p>".to_string(),
            },
        );

        let table = vec![AttributionRow {
            fullname: "b-tale".to_string(),
            username: "carol".to_string(),
            role: "rewrite".to_string(),
        }];
        let collected = collect_records(&mut source, "tale", &table).expect("collect");
        let records = &collected.records;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].primary_author, "alice");
        assert!(!records[0].explicit_credits);
        assert!(records[1].explicit_credits);
        assert_eq!(records[1].credits[0].username, "carol");
        assert!(collected.warnings.is_empty());
        // select + one meta batch + two content fetches
        assert_eq!(source.request_count(), 4);
    }

    #[test]
    fn collect_records_carries_metadata_warnings() {
        let mut source = MockSource {
            tales: vec!["a-tale".to_string()],
            metas: vec![meta("a-tale", "A Tale", "alice")],
            meta_warnings: vec!["metadata for broken-tale is incomplete, page skipped".to_string()],
            ..Default::default()
        };
        let collected = collect_records(&mut source, "tale", &[]).expect("collect");

        assert_eq!(collected.records.len(), 1);
        assert_eq!(collected.warnings.len(), 1);
        assert!(collected.warnings[0].contains("broken-tale"));
    }

    #[test]
    fn meta_batches_respect_the_api_limit() {
        let tales = (0..23).map(|n| format!("tale-{n}")).collect::<Vec<_>>();
        let mut source = MockSource {
            metas: tales.iter().map(|name| meta(name, name, "x")).collect(),
            tales,
            ..Default::default()
        };
        collect_records(&mut source, "tale", &[]).expect("collect");
        assert_eq!(source.meta_batches, vec![10, 10, 3]);
    }
}
