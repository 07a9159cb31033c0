//! Feed sources.
//!
//! The pipeline does not care where feed bytes come from; it awaits a
//! [`FeedSource`] and treats any failure as "this feed is empty this
//! build". File and in-memory sources are always available; the HTTP
//! source sits behind the `http` cargo feature.

use crate::FeedError;
use async_trait::async_trait;
use std::path::PathBuf;

/// An asynchronous origin for one feed body.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<String, FeedError>;

    /// Short human-readable description for diagnostics.
    fn describe(&self) -> String;
}

/// Reads the feed from a local file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileSource {
    async fn fetch(&self) -> Result<String, FeedError> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Serves a fixed body; used by tests and embedded configurations.
pub struct StaticSource {
    body: String,
}

impl StaticSource {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    async fn fetch(&self) -> Result<String, FeedError> {
        Ok(self.body.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Fetches the feed over HTTP. Published-sheet page URLs are rewritten to
/// their raw export form at construction time.
#[cfg(feature = "http")]
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpSource {
    pub fn new(url: &str) -> Self {
        let url = crate::sheet::rewrite_published_url(url).unwrap_or_else(|| url.to_string());
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl FeedSource for HttpSource {
    async fn fetch(&self) -> Result<String, FeedError> {
        let response = self.client.get(&self.url).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }

    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }
}
