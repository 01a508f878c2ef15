use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::wikidot::WikiWriteApi;

/// Where finished pages go. Page names follow `{page_name}-{page_index}`
/// with indices starting at 1 per listing.
pub trait PageSink {
    fn persist(&mut self, page_name: &str, page_index: usize, content: &str) -> Result<()>;
}

/// Read-only mode: each page becomes a local file under the output
/// directory.
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

impl PageSink for FileSink {
    fn persist(&mut self, page_name: &str, page_index: usize, content: &str) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;
        let path = self.output_dir.join(format!("{page_name}-{page_index}"));
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Read-write mode: each page is published under `includes:` on the wiki.
///
/// The target is blanked with a separate save before the real content goes
/// up; saving a large body over an already-large page tends to time out.
pub struct RemoteSink<'a> {
    api: &'a mut dyn WikiWriteApi,
}

impl<'a> RemoteSink<'a> {
    pub fn new(api: &'a mut dyn WikiWriteApi) -> Self {
        Self { api }
    }
}

impl PageSink for RemoteSink<'_> {
    fn persist(&mut self, page_name: &str, page_index: usize, content: &str) -> Result<()> {
        let target = format!("includes:{page_name}-{page_index}");
        self.api
            .save_page(&target, "", "Page prepped with talegen.")
            .with_context(|| format!("failed to blank {target}"))?;
        self.api
            .save_page(&target, content, "Page created with talegen.")
            .with_context(|| format!("failed to save {target}"))?;
        Ok(())
    }
}

/// Test support: keeps persisted pages in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub pages: Vec<(String, usize, String)>,
}

impl PageSink for MemorySink {
    fn persist(&mut self, page_name: &str, page_index: usize, content: &str) -> Result<()> {
        self.pages
            .push((page_name.to_string(), page_index, content.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingApi {
        saves: Vec<(String, String, String)>,
    }

    impl WikiWriteApi for RecordingApi {
        fn save_page(&mut self, page: &str, content: &str, comment: &str) -> Result<()> {
            self.saves
                .push((page.to_string(), content.to_string(), comment.to_string()));
            Ok(())
        }
    }

    #[test]
    fn file_sink_writes_named_pages() {
        let temp = tempdir().expect("tempdir");
        let mut sink = FileSink::new(temp.path().join("pages"));
        sink.persist("tales-by-title", 1, "page one")
            .expect("persist");
        sink.persist("tales-by-title", 2, "page two")
            .expect("persist");

        let first = fs::read_to_string(temp.path().join("pages").join("tales-by-title-1"))
            .expect("read page");
        assert_eq!(first, "page one");
        assert!(temp.path().join("pages").join("tales-by-title-2").exists());
    }

    #[test]
    fn remote_sink_blanks_before_saving() {
        let mut api = RecordingApi::default();
        let mut sink = RemoteSink::new(&mut api);
        sink.persist("tales-by-date", 3, "content").expect("persist");

        assert_eq!(api.saves.len(), 2);
        assert_eq!(api.saves[0].0, "includes:tales-by-date-3");
        assert_eq!(api.saves[0].1, "");
        assert_eq!(api.saves[1].1, "content");
    }
}
