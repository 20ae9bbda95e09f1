//! Tracker config loader (strict parsing).

pub mod schema;

use std::fs;

use tapedeck_core::error::{Result, TapedeckError};

pub use schema::{IngestSection, TrackerConfig};

pub fn load_from_file(path: &str) -> Result<TrackerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| TapedeckError::Config(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<TrackerConfig> {
    let cfg: TrackerConfig = serde_yaml::from_str(s)
        .map_err(|e| TapedeckError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
