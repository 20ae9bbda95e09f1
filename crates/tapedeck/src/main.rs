//! tapedeck-decode: dump a stored session as JSON lines.
//!
//! Usage: `tapedeck-decode <session-file> [start-time-ms]`
//!
//! One message per line on stdout; the decode summary is logged.

use std::io::Write;

use tracing_subscriber::{fmt, EnvFilter};

use tapedeck::core::protocol::StreamDecoder;
use tapedeck::core::{Result, TapedeckError};

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or_else(|| TapedeckError::Config("usage: tapedeck-decode <session-file> [start-time-ms]".into()))?;
    let start_time = args
        .next()
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| TapedeckError::Config(format!("invalid start time '{s}': {e}")))
        })
        .transpose()?;

    let buf = std::fs::read(&path)
        .map_err(|e| TapedeckError::Internal(format!("read session failed ({path}): {e}")))?;
    let bytes = buf.len();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut decoder = StreamDecoder::from_bytes(buf, start_time);
    let mut count = 0usize;
    for msg in decoder.by_ref() {
        let line = serde_json::to_string(&msg)
            .map_err(|e| TapedeckError::Internal(format!("encode message failed: {e}")))?;
        writeln!(out, "{line}").map_err(|e| TapedeckError::Internal(format!("write failed: {e}")))?;
        count += 1;
    }

    tracing::info!(
        path = %path,
        bytes,
        messages = count,
        skipped = decoder.skipped(),
        truncated = decoder.has_trailing_bytes(),
        "session decoded"
    );
    if decoder.error() {
        return Err(TapedeckError::Decode(format!("malformed record after {count} messages")));
    }
    Ok(())
}
