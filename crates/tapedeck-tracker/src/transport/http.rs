use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use tapedeck_core::error::{Result, TapedeckError};

use super::{Delivery, IngestTransport, INGEST_PATH};
use crate::config::IngestSection;

/// `reqwest`-backed transport.
///
/// Small payloads reuse pooled keep-alive connections; large ones go through a
/// client that keeps no idle connections, so a slow upload never occupies the
/// pooled path.
pub struct HttpTransport {
    ingest_url: String,
    pooled: Client,
    unpooled: Client,
}

impl HttpTransport {
    pub fn new(cfg: &IngestSection) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.request_timeout_ms);
        let pooled = Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| TapedeckError::Internal(format!("http client build failed: {e}")))?;
        let unpooled = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| TapedeckError::Internal(format!("http client build failed: {e}")))?;

        Ok(Self {
            ingest_url: format!("{}{}", cfg.base_url.trim_end_matches('/'), INGEST_PATH),
            pooled,
            unpooled,
        })
    }

    pub fn ingest_url(&self) -> &str {
        &self.ingest_url
    }
}

#[async_trait]
impl IngestTransport for HttpTransport {
    async fn post(&self, delivery: Delivery) -> Result<u16> {
        let client = if delivery.keepalive {
            &self.pooled
        } else {
            &self.unpooled
        };
        let response = client
            .post(&self.ingest_url)
            .bearer_auth(&delivery.token)
            .body(delivery.body)
            .send()
            .await
            .map_err(|e| TapedeckError::Transport(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}
