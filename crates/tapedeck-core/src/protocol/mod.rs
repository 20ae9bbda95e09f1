//! Replay wire format and decoding.
//!
//! - `record`: the type-tagged record framing and the `RecordSource` contract
//!   the decoder reads through.
//! - `decoder`: ordered, deduplicated, epoch-normalised message stream.
//! - `resolve`: relative URL / CSS link resolution for URL-based records.
//!
//! All parsers are panic-free: malformed input is reported as `TapedeckError`
//! (or the decoder's error flag) instead of panicking or indexing raw buffers.

pub mod decoder;
pub mod record;
pub mod resolve;

pub use decoder::{decode_all, DecodeReport, Message, StreamDecoder, RECORD_ID_LEN};
pub use record::{RawReader, Record, RecordSource, RecordWriter};
