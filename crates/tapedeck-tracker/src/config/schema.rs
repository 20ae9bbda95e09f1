use std::time::Duration;

use serde::Deserialize;
use tapedeck_core::error::{Result, TapedeckError};

use crate::sender::RetryPolicy;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    pub version: u32,

    pub ingest: IngestSection,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TapedeckError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.ingest.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestSection {
    /// Ingestion host; the ingest path is appended to it.
    pub base_url: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base retry interval; attempt `n` waits `n * attempt_timeout_ms`.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl IngestSection {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_attempts: default_max_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            TapedeckError::Config(format!("ingest.base_url is not a valid url: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TapedeckError::Config(
                "ingest.base_url must use http or https".into(),
            ));
        }
        if !(1..=100).contains(&self.max_attempts) {
            return Err(TapedeckError::Config(
                "ingest.max_attempts must be between 1 and 100".into(),
            ));
        }
        if !(10..=60_000).contains(&self.attempt_timeout_ms) {
            return Err(TapedeckError::Config(
                "ingest.attempt_timeout_ms must be between 10 and 60000".into(),
            ));
        }
        if !(100..=300_000).contains(&self.request_timeout_ms) {
            return Err(TapedeckError::Config(
                "ingest.request_timeout_ms must be between 100 and 300000".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}
fn default_attempt_timeout_ms() -> u64 {
    1000
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
