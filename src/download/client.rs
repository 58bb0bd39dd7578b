//! HTTP client wrapper for page fetches and stream downloads.
//!
//! This module provides the `HttpClient` struct which performs the blocking
//! I/O of the pipeline: fetching watch/playlist pages and streaming media
//! bytes into scratch files.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, ClientBuilder, Proxy};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PAGE_ACCEPT_LANGUAGE, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client for page fetches and streaming downloads.
///
/// Created once per run and shared (cheaply cloned) across concurrent tasks
/// so connection pooling is reused.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = build_client(connect_timeout_secs, read_timeout_secs)
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches a page and returns its body as text.
    ///
    /// Requests carry a browser User-Agent so hosting pages include their
    /// embedded metadata objects.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on transport failure, timeout, a non-2xx
    /// response, or an unreadable body.
    #[instrument(skip(self, url), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<String, DownloadError> {
        let response = self
            .send_get(url, Some(user_agent::BROWSER_USER_AGENT))
            .await?;
        let body = response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        debug!(bytes = body.len(), "page fetched");
        Ok(body)
    }

    /// Streams the body of `url` into the file at `path`, truncating it first.
    ///
    /// `on_progress` is called after every chunk with the bytes written so far
    /// and the expected total when the server reports one.
    ///
    /// Partial data is left in place on failure; the owner of `path` is
    /// responsible for removing it.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if the request fails, the server returns a
    /// non-2xx status, or writing to disk fails.
    #[instrument(skip(self, url, path, on_progress), fields(url = %url, path = %path.display()))]
    pub async fn download_to_path<F>(
        &self,
        url: &str,
        path: &Path,
        on_progress: F,
    ) -> Result<u64, DownloadError>
    where
        F: Fn(u64, Option<u64>) + Send + Sync,
    {
        let response = self.send_get(url, None).await?;
        let content_length = response.content_length();

        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            bytes_written += chunk.len() as u64;
            on_progress(bytes_written, content_length);
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        debug!(bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }

    async fn send_get(
        &self,
        url: &str,
        user_agent: Option<&str>,
    ) -> Result<reqwest::Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut request = self.client.get(url);
        if let Some(ua) = user_agent {
            request = request
                .header(USER_AGENT, ua)
                .header(ACCEPT_LANGUAGE, PAGE_ACCEPT_LANGUAGE);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn build_client(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    let attempt = catch_unwind(AssertUnwindSafe(|| {
        base_client_builder(connect_timeout_secs, read_timeout_secs).build()
    }));
    match attempt {
        Ok(result) => result,
        Err(_) => {
            // Some sandboxed environments panic while reading system proxy
            // settings; environment proxies still apply.
            warn!(
                "HTTP client builder panicked while loading system proxy settings; retrying with env-proxy fallback"
            );
            apply_env_proxy_fallback(
                base_client_builder(connect_timeout_secs, read_timeout_secs).no_proxy(),
            )
            .build()
        }
    }
}

fn base_client_builder(connect_timeout_secs: u64, read_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .read_timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_download_user_agent())
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    for (scheme, names) in [
        (
            "https",
            ["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        ),
        ("http", ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
    ] {
        let Some(proxy) = find_first_proxy_var(&names) else {
            continue;
        };
        let resolved = if scheme == "https" {
            Proxy::https(&proxy)
        } else {
            Proxy::http(&proxy)
        };
        if let Ok(resolved) = resolved {
            builder = builder.proxy(resolved);
        }
    }
    builder
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
