//! Async file downloads with retry.
//!
//! Files stream into `<name>.partial` beside their destination and are
//! renamed when complete, so the locator never sees a half-written file.
//! Existing destinations are skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::{header, Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::sources::DownloadItem;

/// Configuration for the download manager.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Downloads running at once
    pub max_concurrent: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(120),
            request_timeout: Duration::from_secs(600),
            max_concurrent: 4,
        }
    }
}

/// Outcome of a batch of downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes: u64,
}

pub struct DownloadManager {
    client: Client,
    config: DownloadConfig,
}

impl DownloadManager {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Fetch every item, at most `max_concurrent` at a time.
    ///
    /// Fails on the first item that exhausts its retries.
    pub async fn download_all(&self, items: &[DownloadItem]) -> Result<DownloadSummary> {
        let concurrency = self.config.max_concurrent.max(1);
        let mut results = stream::iter(items)
            .map(|item| self.download(item))
            .buffer_unordered(concurrency);

        let mut summary = DownloadSummary::default();
        while let Some(result) = results.next().await {
            match result? {
                Some(bytes) => {
                    summary.downloaded += 1;
                    summary.bytes += bytes;
                }
                None => summary.skipped += 1,
            }
        }

        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            bytes = summary.bytes,
            "Downloads finished"
        );
        Ok(summary)
    }

    /// Download one file. Returns `None` when the destination already exists.
    #[instrument(skip(self, item), fields(url = %item.url))]
    pub async fn download(&self, item: &DownloadItem) -> Result<Option<u64>> {
        if item.destination.exists() {
            debug!(path = %item.destination.display(), "File already exists, skipping download");
            return Ok(None);
        }
        if let Some(parent) = item.destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = partial_path(&item.destination);

        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.fetch_to_file(&item.url, &temp_path).await {
                Ok(bytes) => {
                    fs::rename(&temp_path, &item.destination)
                        .await
                        .with_context(|| format!("Failed to move {}", temp_path.display()))?;
                    info!(path = %item.destination.display(), bytes = bytes, "Download completed");
                    return Ok(Some(bytes));
                }
                Err(e) => {
                    fs::remove_file(&temp_path).await.ok();
                    retry_count += 1;

                    if retry_count > self.config.max_retries {
                        return Err(anyhow!(
                            "Download of {} failed after {} attempts: {}",
                            item.url,
                            retry_count,
                            e
                        ));
                    }

                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_secs = delay.as_secs(),
                        "Download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;

                    // Exponential backoff
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }

    /// Stream the response body to `path`, returning the byte count.
    async fn fetch_to_file(&self, url: &str, path: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        match response.status() {
            StatusCode::OK => {}
            status => return Err(anyhow!("HTTP error: {}", status)),
        }

        let expected: Option<u64> = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        let mut file = fs::File::create(path)
            .await
            .context("Failed to open output file")?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading response chunk")?;
            file.write_all(&chunk)
                .await
                .context("Error writing to file")?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = expected {
            if written != expected {
                return Err(anyhow!(
                    "Download size mismatch: expected {} bytes, got {}",
                    expected,
                    written
                ));
            }
        }
        Ok(written)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}
