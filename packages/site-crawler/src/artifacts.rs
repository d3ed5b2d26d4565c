//! Artifact persistence: text files, downloaded documents, crawl logs.
//!
//! Filenames are derived deterministically from the source URL, and an
//! existing file always wins over a re-fetch. That existence check is what
//! makes a crawl resumable across runs, so a partially written artifact
//! must never land at the final path: text artifacts are staged to a
//! temporary file and renamed into place.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::error::{CrawlError, CrawlResult};
use crate::extract::ExtractedDocument;

/// Maximum length of a derived document filename.
const MAX_DOCUMENT_FILENAME: usize = 255;

/// Derive the text artifact filename for a page URL: scheme stripped,
/// every character outside `[A-Za-z0-9_-]` replaced with `_`.
pub fn text_filename(url: &Url) -> String {
    let stripped = url
        .as_str()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let mut name: String = stripped
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    name.push_str(".txt");
    name
}

/// Derive the document filename from the final path segment, keeping only
/// alphanumeric characters plus `._-`, capped at 255 characters.
pub fn document_filename(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let sanitized: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_DOCUMENT_FILENAME)
        .collect();
    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Outcome of a direct document download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded,
    AlreadyPresent,
    /// Response body was not the advertised document type.
    WrongContentType,
}

/// Persists extracted pages and downloaded documents.
pub struct ArtifactWriter {
    text_dir: PathBuf,
    document_dir: PathBuf,
    client: reqwest::Client,
}

impl ArtifactWriter {
    /// Create a writer rooted at the given directories.
    pub fn new(text_dir: impl Into<PathBuf>, document_dir: impl Into<PathBuf>) -> Self {
        Self {
            text_dir: text_dir.into(),
            document_dir: document_dir.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create both output directories if they do not exist yet.
    pub async fn ensure_dirs(&self) -> CrawlResult<()> {
        tokio::fs::create_dir_all(&self.text_dir).await?;
        tokio::fs::create_dir_all(&self.document_dir).await?;
        Ok(())
    }

    /// Path the given document would be written to.
    pub fn text_path(&self, source_url: &Url) -> PathBuf {
        self.text_dir.join(text_filename(source_url))
    }

    /// Write the document unless an artifact for its URL already exists.
    ///
    /// Returns `true` if a file was written, `false` if an artifact was
    /// already present (first-writer-wins).
    pub async fn write_if_absent(&self, document: &ExtractedDocument) -> CrawlResult<bool> {
        let source_url = Url::parse(&document.source_url).map_err(|e| CrawlError::Extraction {
            url: document.source_url.clone(),
            message: e.to_string(),
        })?;
        let path = self.text_path(&source_url);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }

        let contents = format!(
            "URL (Source): {}\nScraped on: {}\n\n{}",
            document.source_url,
            document.fetched_at.to_rfc3339(),
            document.serialize_blocks()
        );

        // Stage and rename so an interrupted write never leaves a partial
        // artifact masquerading as a completed page.
        let staging = path.with_extension("txt.tmp");
        tokio::fs::write(&staging, contents.as_bytes()).await?;
        tokio::fs::rename(&staging, &path).await?;

        info!(url = %document.source_url, path = %path.display(), "Saved text artifact");
        Ok(true)
    }

    /// Download a PDF/DOCX directly, skipping if already present.
    pub async fn download_document(&self, url: &Url) -> CrawlResult<DownloadOutcome> {
        let Some(filename) = document_filename(url) else {
            return Err(CrawlError::Extraction {
                url: url.as_str().to_string(),
                message: "no usable filename in document URL".into(),
            });
        };
        let path = self.document_dir.join(&filename);
        if tokio::fs::try_exists(&path).await? {
            return Ok(DownloadOutcome::AlreadyPresent);
        }

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| CrawlError::Http(Box::new(e)))?;
        if !response.status().is_success() {
            return Err(CrawlError::Http(Box::new(std::io::Error::other(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )))));
        }

        // A .pdf link that serves an HTML error page must not be saved as
        // a document.
        if filename.to_lowercase().ends_with(".pdf") {
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_lowercase();
            if !content_type.contains("pdf") {
                return Ok(DownloadOutcome::WrongContentType);
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CrawlError::Http(Box::new(e)))?;

        let staging = self.document_dir.join(format!("{filename}.part"));
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await?;

        info!(url = %url, path = %path.display(), "Downloaded document");
        Ok(DownloadOutcome::Downloaded)
    }
}

/// Append-only error and skipped logs, shared by every worker.
///
/// Appends are serialized behind a lock so concurrent workers cannot
/// interleave partial lines.
pub struct CrawlLogs {
    error: Mutex<tokio::fs::File>,
    skipped: Mutex<tokio::fs::File>,
}

impl CrawlLogs {
    /// Open (creating if needed) `errors.log` and `skipped_pages.log`
    /// under `log_dir`.
    pub async fn open(log_dir: impl AsRef<Path>) -> CrawlResult<Self> {
        let log_dir = log_dir.as_ref();
        tokio::fs::create_dir_all(log_dir).await?;
        let open = |path: PathBuf| async move {
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
        };
        Ok(Self {
            error: Mutex::new(open(log_dir.join("errors.log")).await?),
            skipped: Mutex::new(open(log_dir.join("skipped_pages.log")).await?),
        })
    }

    /// Append an `[ERROR]` line.
    pub async fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!("{message}");
        let mut file = self.error.lock().await;
        let line = format!("[ERROR] {message}\n");
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(error = %e, "Failed to append to error log");
        }
    }

    /// Append a `[SKIPPED]` line.
    pub async fn skipped(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{message}");
        let mut file = self.skipped.lock().await;
        let line = format!("[SKIPPED] {message}\n");
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(error = %e, "Failed to append to skipped log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ContentBlock;
    use chrono::Utc;

    #[test]
    fn test_text_filename_derivation() {
        let url = Url::parse("https://recreation.example.edu/hours/?week=2").unwrap();
        assert_eq!(
            text_filename(&url),
            "recreation_example_edu_hours__week_2.txt"
        );
    }

    #[test]
    fn test_document_filename_sanitized() {
        let url = Url::parse("https://example.edu/files/Fall%20Handbook.pdf").unwrap();
        assert_eq!(document_filename(&url), Some("Fall20Handbook.pdf".into()));

        let root = Url::parse("https://example.edu/").unwrap();
        assert_eq!(document_filename(&root), None);
    }

    fn sample_document(url: &str) -> ExtractedDocument {
        ExtractedDocument {
            source_url: url.to_string(),
            fetched_at: Utc::now(),
            content_blocks: vec![
                ContentBlock::heading("Hours"),
                ContentBlock::paragraph("Open daily."),
            ],
        }
    }

    #[tokio::test]
    async fn test_write_if_absent_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("texts"), dir.path().join("docs"));
        writer.ensure_dirs().await.unwrap();

        let document = sample_document("https://example.edu/hours");
        assert!(writer.write_if_absent(&document).await.unwrap());

        let path = writer.text_path(&Url::parse("https://example.edu/hours").unwrap());
        let first = tokio::fs::read_to_string(&path).await.unwrap();

        // Second write is a no-op even with different content blocks.
        let mut altered = sample_document("https://example.edu/hours");
        altered.content_blocks.push(ContentBlock::paragraph("Changed."));
        assert!(!writer.write_if_absent(&altered).await.unwrap());

        let second = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_artifact_header_format() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("texts"), dir.path().join("docs"));
        writer.ensure_dirs().await.unwrap();

        let document = sample_document("https://example.edu/hours");
        writer.write_if_absent(&document).await.unwrap();

        let path = writer.text_path(&Url::parse("https://example.edu/hours").unwrap());
        let contents = tokio::fs::read_to_string(&path).await.unwrap();

        assert!(contents.starts_with("URL (Source): https://example.edu/hours\nScraped on: "));
        assert!(contents.contains("\n\n"));
        assert!(contents.contains("[Hours]"));
        assert!(contents.contains("Open daily."));
    }

    #[tokio::test]
    async fn test_logs_prefix_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logs = CrawlLogs::open(dir.path()).await.unwrap();

        logs.error("boom on https://example.edu/a").await;
        logs.skipped("external domain: https://other.org/b").await;

        let errors = tokio::fs::read_to_string(dir.path().join("errors.log"))
            .await
            .unwrap();
        let skipped = tokio::fs::read_to_string(dir.path().join("skipped_pages.log"))
            .await
            .unwrap();

        assert_eq!(errors, "[ERROR] boom on https://example.edu/a\n");
        assert_eq!(skipped, "[SKIPPED] external domain: https://other.org/b\n");
    }
}
