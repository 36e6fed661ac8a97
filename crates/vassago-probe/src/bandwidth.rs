//! Bandwidth probe transport

use crate::{ProbeError, Result};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;
use vassago_core::now_ms;

/// Fetches probe payloads of a requested size
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Download roughly `size_bytes` and return the bytes received
    async fn fetch(&self, size_bytes: u64) -> Result<u64>;
}

/// HTTP probe transport
///
/// Requests `<probe_url>?size=<bytes>&_cb=<nonce>` so that no cache
/// between the client and the endpoint can answer a probe.
#[derive(Debug)]
pub struct HttpProbeTransport {
    client: Client,
    base: Url,
    nonce: AtomicU64,
}

impl HttpProbeTransport {
    /// Create a transport for `probe_url`
    pub fn new(probe_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(probe_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ProbeError::InvalidUrl(format!(
                "unsupported scheme: {}",
                base.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base,
            nonce: AtomicU64::new(0),
        })
    }

    /// URL for a probe of `size_bytes`
    pub fn probe_url(&self, size_bytes: u64) -> Url {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("size", &size_bytes.to_string())
            .append_pair("_cb", &format!("{}-{}", now_ms(), nonce));
        url
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    async fn fetch(&self, size_bytes: u64) -> Result<u64> {
        let url = self.probe_url(size_bytes);
        debug!("Bandwidth probe: {}", url);

        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(body.len() as u64)
    }
}

/// Mean after dropping `floor(n * trim)` samples from each end
///
/// Falls back to the plain mean when trimming would leave nothing.
pub fn trimmed_mean(values: &[f64], trim: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let k = (n as f64 * trim.clamp(0.0, 0.5)).floor() as usize;
    let kept = if 2 * k < n { &sorted[k..n - k] } else { &sorted[..] };

    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}
