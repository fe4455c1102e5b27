//! Raw module fetching
//!
//! Used by the load coordinator when the engine refuses a URL outright: the
//! player reads the module bytes itself and hands them to the engine.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use reqwest::{Client, Url};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Upper bound on a fetched module
pub const MAX_MODULE_BYTES: usize = 32 * 1024 * 1024;

/// Reads the raw bytes behind a track URL
pub trait SourceFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Fetches absolute URLs over HTTP and relative ones from the media root
/// (or from `base_url` when one is configured)
pub struct MediaFetcher {
    client: Client,
    media_root: PathBuf,
    base_url: Option<Url>,
}

impl MediaFetcher {
    pub fn new(media_root: PathBuf, base_url: Option<Url>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tod-player/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            media_root,
            base_url,
        })
    }

    fn remote_url(&self, url: &str) -> Result<Option<Url>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Url::parse(url)
                .map(Some)
                .map_err(|e| Error::Fetch(format!("invalid URL '{}': {}", url, e)));
        }
        match &self.base_url {
            Some(base) => base
                .join(url)
                .map(Some)
                .map_err(|e| Error::Fetch(format!("cannot resolve '{}' against {}: {}", url, base, e))),
            None => Ok(None),
        }
    }

    async fn fetch_remote(&self, url: Url) -> Result<Vec<u8>> {
        debug!("Fetching module from {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("{} returned {}", url, status)));
        }
        let bytes = response.bytes().await?;
        check_size(url.as_str(), bytes.len())?;
        Ok(bytes.to_vec())
    }

    async fn fetch_local(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.media_root.join(url.trim_start_matches('/'));
        debug!("Reading module from {}", path.display());
        let bytes = tokio::fs::read(&path).await?;
        check_size(url, bytes.len())?;
        Ok(bytes)
    }
}

fn check_size(url: &str, len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::Fetch(format!("{} is empty", url)));
    }
    if len > MAX_MODULE_BYTES {
        return Err(Error::Fetch(format!(
            "{} exceeds {} bytes",
            url, MAX_MODULE_BYTES
        )));
    }
    Ok(())
}

impl SourceFetcher for MediaFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            match self.remote_url(url)? {
                Some(remote) => self.fetch_remote(remote).await,
                None => self.fetch_local(url).await,
            }
        })
    }
}
