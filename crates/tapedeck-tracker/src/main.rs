//! tapedeck-upload: deliver recorded batch files to the ingestion endpoint.
//!
//! Usage: `tapedeck-upload <batch-file>...`
//! - config: `$TAPEDECK_CONFIG` or `./tapedeck.yaml`
//! - credential: `$TAPEDECK_TOKEN`
//!
//! Exits once every batch is acknowledged, or with an error on an
//! unauthorized credential or exhausted retries.

use tracing_subscriber::{fmt, EnvFilter};

use tapedeck_core::error::{Result, TapedeckError};
use tapedeck_tracker::config;
use tapedeck_tracker::sender::{QueueSender, SenderEvent};
use tapedeck_tracker::transport::HttpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg_path = std::env::var("TAPEDECK_CONFIG").unwrap_or_else(|_| "tapedeck.yaml".into());
    let cfg = config::load_from_file(&cfg_path)?;
    let token = std::env::var("TAPEDECK_TOKEN")
        .map_err(|_| TapedeckError::Config("TAPEDECK_TOKEN is not set".into()))?;

    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.is_empty() {
        tracing::info!("no batch files given; nothing to do");
        return Ok(());
    }

    let transport = HttpTransport::new(&cfg.ingest)?;
    tracing::info!(url = transport.ingest_url(), batches = files.len(), "tapedeck-upload starting");

    let (sender, mut events) = QueueSender::spawn(transport, cfg.ingest.retry_policy());
    for path in &files {
        let batch = tokio::fs::read(path)
            .await
            .map_err(|e| TapedeckError::Internal(format!("read batch failed ({path}): {e}")))?;
        sender.enqueue(batch);
    }
    sender.authorise(token);

    let mut delivered = 0usize;
    let outcome = loop {
        match events.recv().await {
            Some(SenderEvent::Delivered { bytes }) => {
                delivered += 1;
                tracing::info!(bytes, delivered, total = files.len(), "batch delivered");
                if delivered == files.len() {
                    break Ok(());
                }
            }
            Some(SenderEvent::Unauthorized) => break Err(TapedeckError::Unauthorized),
            Some(SenderEvent::Failed { reason }) => break Err(TapedeckError::Transport(reason)),
            None => break Err(TapedeckError::Internal("uploader task stopped".into())),
        }
    };

    tracing::debug!(metrics = %sender.metrics().render(), "uploader metrics");
    outcome
}
