//! HTTP text downloader: HEAD content-type probe, GET with gzip and
//! charset handling, bounded retries, a single client-wide timeout.
//!
//! `user_agent`, `timeout`, and `retry_count` are swapped live by the
//! admin-pushed dynamic settings poll (§6); the `timeout` is therefore
//! applied per request rather than baked into the `reqwest::Client` at
//! construction, since reqwest has no way to change a client's timeout
//! after it is built.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use encoding_rs::Encoding;
use reqwest::Client;
use tracing::debug;

use crate::core::error::{Error, ErrorKind, Result};

pub struct Downloader {
    client: Client,
    user_agent: ArcSwap<String>,
    timeout_ms: AtomicU64,
    retry_count: AtomicU32,
}

impl Downloader {
    pub fn new(user_agent: impl Into<String>, timeout: Duration, retry_count: u32) -> Result<Self> {
        let client = Client::builder().build().map_err(Error::from)?;
        Ok(Downloader {
            client,
            user_agent: ArcSwap::from_pointee(user_agent.into()),
            timeout_ms: AtomicU64::new(timeout.as_millis() as u64),
            retry_count: AtomicU32::new(retry_count),
        })
    }

    pub fn set_user_agent(&self, user_agent: String) {
        self.user_agent.store(std::sync::Arc::new(user_agent));
    }

    pub fn set_timeout_ms(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    pub fn set_retry_count(&self, retry_count: u32) {
        self.retry_count.store(retry_count, Ordering::Relaxed);
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    /// HEAD-probes `url`; returns `false` if the response's Content-Type is
    /// absent or does not contain `text/html`.
    async fn probe_is_html(&self, url: &str) -> Result<bool> {
        let response = self
            .client
            .head(url)
            .timeout(self.timeout())
            .header("User-Agent", self.user_agent.load().as_str())
            .send()
            .await?;
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        Ok(is_html)
    }

    /// Downloads `url` as UTF-8 text. Retries up to `retry_count + 1` times
    /// on transport error; fails with `NetworkError` on HTTP status ≥ 400.
    pub async fn download_text(&self, url: &str) -> Result<String> {
        if !self.probe_is_html(url).await.unwrap_or(true) {
            return Err(Error::new(ErrorKind::PolicyBlocked, format!("{url} is not text/html")));
        }

        let mut last_err = None;
        let retry_count = self.retry_count.load(Ordering::Relaxed);
        for attempt in 0..=retry_count {
            match self.fetch_once(url).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    debug!(url, attempt, error = %err, "download attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::new(ErrorKind::NetworkError, "no attempts made".to_string())))
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout())
            .header("User-Agent", self.user_agent.load().as_str())
            .header("Accept-Encoding", "gzip")
            .send()
            .await?;

        if response.status().as_u16() >= 400 {
            return Err(Error::new(
                ErrorKind::NetworkError,
                format!("{url} returned status {}", response.status()),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await?.to_vec();
        let bytes = maybe_gunzip(&bytes)?;
        Ok(transcode_to_utf8(&bytes, content_type.as_deref()))
    }
}

fn maybe_gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;
    // gzip magic bytes
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        let mut decoder = flate2::read::GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(Error::from)?;
        Ok(out)
    } else {
        Ok(bytes.to_vec())
    }
}

fn transcode_to_utf8(bytes: &[u8], content_type: Option<&str>) -> String {
    let charset_hint = content_type
        .and_then(|ct| ct.split(';').nth(1))
        .and_then(|part| part.trim().strip_prefix("charset="));

    let encoding = charset_hint
        .and_then(Encoding::for_label)
        .or_else(|| {
            let (encoding, _) = Encoding::for_bom(bytes).unwrap_or((encoding_rs::UTF_8, 0));
            Some(encoding)
        })
        .unwrap_or(encoding_rs::UTF_8);

    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}
