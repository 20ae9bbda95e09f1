//! Pull-based replay stream decoder.
//!
//! A stored session is a sequence of records, each prefixed by an 8-byte
//! little-endian record id. The decoder:
//! - drops records whose id is lower than the last accepted one (duplicates
//!   and late arrivals are skipped, never reordered),
//! - consumes `Timestamp` records to keep a relative clock against the epoch,
//! - resolves URL-based records and tags every message with time and id.
//!
//! A decode pass is single-use: state lives for one buffer and the sequence
//! is forward-only. Malformed input ends the pass and raises `error()`.

use bytes::{Buf, Bytes};
use serde::Serialize;

use super::record::{RawReader, Record, RecordSource};
use super::resolve::resolve_record;

/// Size of the record id prefix.
pub const RECORD_ID_LEN: usize = 8;

/// A decoded, enriched record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Milliseconds relative to the epoch.
    pub time: i64,
    /// Record id the message was stored under. Serialized as `_index`, since
    /// tree records carry an `index` of their own.
    #[serde(rename = "_index")]
    pub index: u64,
    #[serde(flatten)]
    pub record: Record,
}

/// Decoder over any `RecordSource`.
pub struct StreamDecoder<S: RecordSource> {
    source: S,
    last_id: Option<u64>,
    epoch: Option<u64>,
    current_time: i64,
    skipped: u64,
    error: bool,
}

impl StreamDecoder<RawReader> {
    /// Decoder over an in-memory buffer.
    pub fn from_bytes(buf: impl Into<Bytes>, start_time: Option<u64>) -> Self {
        Self::new(RawReader::new(buf), start_time)
    }
}

impl<S: RecordSource> StreamDecoder<S> {
    /// `start_time`, when given and non-zero, is the epoch; otherwise the first
    /// `Timestamp` record fixes it.
    pub fn new(source: S, start_time: Option<u64>) -> Self {
        Self {
            source,
            last_id: None,
            epoch: start_time.filter(|t| *t != 0),
            current_time: 0,
            skipped: 0,
            error: false,
        }
    }

    /// True once a malformed record ended the pass.
    pub fn error(&self) -> bool {
        self.error
    }

    /// Records dropped by the ordering check.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Id of the last accepted record.
    pub fn last_index(&self) -> Option<u64> {
        self.last_id
    }

    /// Absolute time (ms) that `time` is measured from, once known.
    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    /// Bytes left unread after the stream ended; non-zero on a clean pass
    /// means the buffer ends in a truncated record.
    pub fn has_trailing_bytes(&self) -> bool {
        self.source.position() < self.source.buffer().len()
    }

    fn has_next_byte(&self) -> bool {
        self.source.position() < self.source.buffer().len()
    }

    /// Id at the read position, if 8 bytes are available.
    fn peek_id(&self) -> Option<u64> {
        let rest = self.source.buffer().get(self.source.position()..)?;
        let mut id = rest.get(..RECORD_ID_LEN)?;
        Some(id.get_u64_le())
    }

    /// Candidate ids are compared most-significant byte first, which for
    /// little-endian ids is plain numeric order.
    fn needs_skip(&self) -> bool {
        match (self.last_id, self.peek_id()) {
            (Some(last), Some(id)) => id < last,
            _ => false,
        }
    }

    /// Read id + payload. `None` on a truncated tail (position restored) or on
    /// a parse failure (error flag raised).
    fn read_raw(&mut self) -> Option<(u64, Record)> {
        let start = self.source.position();
        let id = self.peek_id()?;
        self.source.seek(start + RECORD_ID_LEN);
        match self.source.read_record() {
            Ok(Some(record)) => Some((id, record)),
            Ok(None) => {
                self.source.seek(start);
                None
            }
            Err(e) => {
                self.error = true;
                tracing::error!(position = start, error = %e, "read record failed");
                None
            }
        }
    }

    /// Next message, or `None` at end of stream (check `error()` to tell a
    /// clean finish from corruption).
    pub fn read_next(&mut self) -> Option<Message> {
        loop {
            if self.error || !self.has_next_byte() {
                return None;
            }

            while self.needs_skip() {
                let (id, record) = self.read_raw()?;
                self.skipped += 1;
                tracing::debug!(id, tag = record.tag(), "skipping out-of-order record");
            }

            let (id, record) = self.read_raw()?;
            self.last_id = Some(id);

            if let Record::Timestamp { timestamp } = record {
                // a zero epoch counts as unset
                let epoch = match self.epoch {
                    Some(e) if e != 0 => e,
                    _ => *self.epoch.insert(timestamp),
                };
                self.current_time = timestamp.wrapping_sub(epoch) as i64;
                continue;
            }

            return Some(Message {
                time: self.current_time,
                index: id,
                record: resolve_record(record),
            });
        }
    }
}

impl<S: RecordSource> Iterator for StreamDecoder<S> {
    type Item = Message;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}

/// Outcome of decoding a whole buffer.
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    pub messages: Vec<Message>,
    pub skipped: u64,
    /// A malformed record ended the pass early.
    pub error: bool,
    /// The buffer ended inside a record.
    pub truncated: bool,
}

/// Decode every message in `buf`.
pub fn decode_all(buf: impl Into<Bytes>, start_time: Option<u64>) -> DecodeReport {
    let mut decoder = StreamDecoder::from_bytes(buf, start_time);
    let messages: Vec<Message> = decoder.by_ref().collect();
    let error = decoder.error();
    DecodeReport {
        messages,
        skipped: decoder.skipped(),
        error,
        truncated: !error && decoder.has_trailing_bytes(),
    }
}
