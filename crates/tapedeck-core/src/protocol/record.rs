//! Record framing (panic-free).
//!
//! Wire rules:
//! - `uint`: unsigned LEB128 varint (u64, at most 10 bytes)
//! - `int`: zig-zag encoded varint (i64)
//! - `string`: `uint` byte length, then UTF-8 bytes
//! - `boolean`: one byte
//! - payload: `uint` type tag followed by the record's fields in order
//!
//! Parsing rules:
//! - Never index (`buf[0]`); always use `Buf` and `remaining()` checks.
//! - A payload cut short by the end of the buffer is "incomplete" (`Ok(None)`),
//!   not an error. Unknown tags, bad UTF-8 and overlong varints are errors.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{Result, TapedeckError};

/// Record type tags.
pub mod tag {
    pub const TIMESTAMP: u64 = 0;
    pub const SET_PAGE_LOCATION: u64 = 4;
    pub const SET_VIEWPORT_SIZE: u64 = 5;
    pub const SET_VIEWPORT_SCROLL: u64 = 6;
    pub const CREATE_DOCUMENT: u64 = 7;
    pub const CREATE_ELEMENT_NODE: u64 = 8;
    pub const CREATE_TEXT_NODE: u64 = 9;
    pub const MOVE_NODE: u64 = 10;
    pub const REMOVE_NODE: u64 = 11;
    pub const SET_NODE_ATTRIBUTE: u64 = 12;
    pub const REMOVE_NODE_ATTRIBUTE: u64 = 13;
    pub const SET_NODE_DATA: u64 = 14;
    pub const SET_CSS_DATA: u64 = 15;
    pub const SET_NODE_SCROLL: u64 = 16;
    pub const MOUSE_MOVE: u64 = 20;
    pub const CSS_INSERT_RULE: u64 = 37;
    pub const SET_NODE_ATTRIBUTE_URL_BASED: u64 = 60;
    pub const SET_CSS_DATA_URL_BASED: u64 = 61;
    pub const CSS_INSERT_RULE_URL_BASED: u64 = 67;
}

/// One decoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Record {
    /// Absolute instant (ms). Consumed by the decoder, never emitted.
    Timestamp { timestamp: u64 },
    SetPageLocation {
        url: String,
        referrer: String,
        navigation_start: u64,
    },
    SetViewportSize { width: u64, height: u64 },
    SetViewportScroll { x: i64, y: i64 },
    CreateDocument,
    CreateElementNode {
        id: u64,
        parent_id: u64,
        index: u64,
        tag: String,
        svg: bool,
    },
    CreateTextNode { id: u64, parent_id: u64, index: u64 },
    MoveNode { id: u64, parent_id: u64, index: u64 },
    RemoveNode { id: u64 },
    SetNodeAttribute { id: u64, name: String, value: String },
    RemoveNodeAttribute { id: u64, name: String },
    SetNodeData { id: u64, data: String },
    SetCssData { id: u64, data: String },
    SetNodeScroll { id: u64, x: i64, y: i64 },
    MouseMove { x: u64, y: u64 },
    CssInsertRule { id: u64, rule: String, index: u64 },
    /// Attribute whose value may hold a URL relative to `base_url`.
    SetNodeAttributeUrlBased {
        id: u64,
        name: String,
        value: String,
        base_url: String,
    },
    SetCssDataUrlBased {
        id: u64,
        data: String,
        base_url: String,
    },
    CssInsertRuleUrlBased {
        id: u64,
        rule: String,
        index: u64,
        base_url: String,
    },
}

impl Record {
    /// Wire type tag.
    pub fn tag(&self) -> u64 {
        match self {
            Record::Timestamp { .. } => tag::TIMESTAMP,
            Record::SetPageLocation { .. } => tag::SET_PAGE_LOCATION,
            Record::SetViewportSize { .. } => tag::SET_VIEWPORT_SIZE,
            Record::SetViewportScroll { .. } => tag::SET_VIEWPORT_SCROLL,
            Record::CreateDocument => tag::CREATE_DOCUMENT,
            Record::CreateElementNode { .. } => tag::CREATE_ELEMENT_NODE,
            Record::CreateTextNode { .. } => tag::CREATE_TEXT_NODE,
            Record::MoveNode { .. } => tag::MOVE_NODE,
            Record::RemoveNode { .. } => tag::REMOVE_NODE,
            Record::SetNodeAttribute { .. } => tag::SET_NODE_ATTRIBUTE,
            Record::RemoveNodeAttribute { .. } => tag::REMOVE_NODE_ATTRIBUTE,
            Record::SetNodeData { .. } => tag::SET_NODE_DATA,
            Record::SetCssData { .. } => tag::SET_CSS_DATA,
            Record::SetNodeScroll { .. } => tag::SET_NODE_SCROLL,
            Record::MouseMove { .. } => tag::MOUSE_MOVE,
            Record::CssInsertRule { .. } => tag::CSS_INSERT_RULE,
            Record::SetNodeAttributeUrlBased { .. } => tag::SET_NODE_ATTRIBUTE_URL_BASED,
            Record::SetCssDataUrlBased { .. } => tag::SET_CSS_DATA_URL_BASED,
            Record::CssInsertRuleUrlBased { .. } => tag::CSS_INSERT_RULE_URL_BASED,
        }
    }
}

/// Positional access to a buffer of records.
///
/// The decoder drives a source through this contract instead of reaching into
/// its cursor: it moves the position to skip record ids and reads exactly one
/// payload at a time.
pub trait RecordSource {
    /// Current read position.
    fn position(&self) -> usize;
    /// The whole underlying buffer.
    fn buffer(&self) -> &[u8];
    /// Move the read position (clamped to the buffer length).
    fn seek(&mut self, pos: usize);
    /// Parse one payload at the current position.
    ///
    /// `Ok(None)` means the remaining bytes do not hold a complete payload;
    /// the position is left untouched in that case.
    fn read_record(&mut self) -> Result<Option<Record>>;
}

/// `RecordSource` over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct RawReader {
    buf: Bytes,
    pos: usize,
}

impl RawReader {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            pos: 0,
        }
    }
}

impl RecordSource for RawReader {
    fn position(&self) -> usize {
        self.pos
    }

    fn buffer(&self) -> &[u8] {
        &self.buf
    }

    fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let mut cur: &[u8] = self.buf.get(self.pos..).unwrap_or(&[]);
        let before = cur.remaining();
        let record = parse_record(&mut cur)?;
        if record.is_some() {
            self.pos += before - cur.remaining();
        }
        Ok(record)
    }
}

// Unwraps a field read; an incomplete field makes the whole record incomplete.
macro_rules! need {
    ($e:expr) => {
        match $e? {
            Some(v) => v,
            None => return Ok(None),
        }
    };
}

fn read_uint(buf: &mut &[u8]) -> Result<Option<u64>> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        if !buf.has_remaining() {
            return Ok(None);
        }
        if shift >= 64 {
            return Err(TapedeckError::Decode("varint overflow".into()));
        }
        let b = buf.get_u8();
        value |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
    }
}

fn read_int(buf: &mut &[u8]) -> Result<Option<i64>> {
    let n = need!(read_uint(buf));
    Ok(Some(((n >> 1) as i64) ^ -((n & 1) as i64)))
}

fn read_string(buf: &mut &[u8]) -> Result<Option<String>> {
    let len = need!(read_uint(buf));
    let len = usize::try_from(len)
        .map_err(|_| TapedeckError::Decode("string length out of range".into()))?;
    if buf.remaining() < len {
        return Ok(None);
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|e| TapedeckError::Decode(format!("invalid utf-8 in string field: {e}")))
}

fn read_bool(buf: &mut &[u8]) -> Result<Option<bool>> {
    if !buf.has_remaining() {
        return Ok(None);
    }
    Ok(Some(buf.get_u8() != 0))
}

/// Parse one payload (type tag + fields) from the front of `buf`.
pub fn parse_record(buf: &mut &[u8]) -> Result<Option<Record>> {
    let tp = need!(read_uint(buf));
    let record = match tp {
        tag::TIMESTAMP => Record::Timestamp {
            timestamp: need!(read_uint(buf)),
        },
        tag::SET_PAGE_LOCATION => Record::SetPageLocation {
            url: need!(read_string(buf)),
            referrer: need!(read_string(buf)),
            navigation_start: need!(read_uint(buf)),
        },
        tag::SET_VIEWPORT_SIZE => Record::SetViewportSize {
            width: need!(read_uint(buf)),
            height: need!(read_uint(buf)),
        },
        tag::SET_VIEWPORT_SCROLL => Record::SetViewportScroll {
            x: need!(read_int(buf)),
            y: need!(read_int(buf)),
        },
        tag::CREATE_DOCUMENT => Record::CreateDocument,
        tag::CREATE_ELEMENT_NODE => Record::CreateElementNode {
            id: need!(read_uint(buf)),
            parent_id: need!(read_uint(buf)),
            index: need!(read_uint(buf)),
            tag: need!(read_string(buf)),
            svg: need!(read_bool(buf)),
        },
        tag::CREATE_TEXT_NODE => Record::CreateTextNode {
            id: need!(read_uint(buf)),
            parent_id: need!(read_uint(buf)),
            index: need!(read_uint(buf)),
        },
        tag::MOVE_NODE => Record::MoveNode {
            id: need!(read_uint(buf)),
            parent_id: need!(read_uint(buf)),
            index: need!(read_uint(buf)),
        },
        tag::REMOVE_NODE => Record::RemoveNode {
            id: need!(read_uint(buf)),
        },
        tag::SET_NODE_ATTRIBUTE => Record::SetNodeAttribute {
            id: need!(read_uint(buf)),
            name: need!(read_string(buf)),
            value: need!(read_string(buf)),
        },
        tag::REMOVE_NODE_ATTRIBUTE => Record::RemoveNodeAttribute {
            id: need!(read_uint(buf)),
            name: need!(read_string(buf)),
        },
        tag::SET_NODE_DATA => Record::SetNodeData {
            id: need!(read_uint(buf)),
            data: need!(read_string(buf)),
        },
        tag::SET_CSS_DATA => Record::SetCssData {
            id: need!(read_uint(buf)),
            data: need!(read_string(buf)),
        },
        tag::SET_NODE_SCROLL => Record::SetNodeScroll {
            id: need!(read_uint(buf)),
            x: need!(read_int(buf)),
            y: need!(read_int(buf)),
        },
        tag::MOUSE_MOVE => Record::MouseMove {
            x: need!(read_uint(buf)),
            y: need!(read_uint(buf)),
        },
        tag::CSS_INSERT_RULE => Record::CssInsertRule {
            id: need!(read_uint(buf)),
            rule: need!(read_string(buf)),
            index: need!(read_uint(buf)),
        },
        tag::SET_NODE_ATTRIBUTE_URL_BASED => Record::SetNodeAttributeUrlBased {
            id: need!(read_uint(buf)),
            name: need!(read_string(buf)),
            value: need!(read_string(buf)),
            base_url: need!(read_string(buf)),
        },
        tag::SET_CSS_DATA_URL_BASED => Record::SetCssDataUrlBased {
            id: need!(read_uint(buf)),
            data: need!(read_string(buf)),
            base_url: need!(read_string(buf)),
        },
        tag::CSS_INSERT_RULE_URL_BASED => Record::CssInsertRuleUrlBased {
            id: need!(read_uint(buf)),
            rule: need!(read_string(buf)),
            index: need!(read_uint(buf)),
            base_url: need!(read_string(buf)),
        },
        other => {
            return Err(TapedeckError::Decode(format!(
                "unrecognizable record type: {other}"
            )))
        }
    };
    Ok(Some(record))
}

fn put_uint(out: &mut BytesMut, mut v: u64) {
    while v >= 0x80 {
        out.put_u8((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    out.put_u8(v as u8);
}

fn put_int(out: &mut BytesMut, v: i64) {
    put_uint(out, ((v << 1) ^ (v >> 63)) as u64);
}

fn put_string(out: &mut BytesMut, s: &str) {
    put_uint(out, s.len() as u64);
    out.put_slice(s.as_bytes());
}

/// Append one payload (type tag + fields) to `out`.
pub fn encode_record(record: &Record, out: &mut BytesMut) {
    put_uint(out, record.tag());
    match record {
        Record::Timestamp { timestamp } => put_uint(out, *timestamp),
        Record::SetPageLocation {
            url,
            referrer,
            navigation_start,
        } => {
            put_string(out, url);
            put_string(out, referrer);
            put_uint(out, *navigation_start);
        }
        Record::SetViewportSize { width, height } => {
            put_uint(out, *width);
            put_uint(out, *height);
        }
        Record::SetViewportScroll { x, y } => {
            put_int(out, *x);
            put_int(out, *y);
        }
        Record::CreateDocument => {}
        Record::CreateElementNode {
            id,
            parent_id,
            index,
            tag,
            svg,
        } => {
            put_uint(out, *id);
            put_uint(out, *parent_id);
            put_uint(out, *index);
            put_string(out, tag);
            out.put_u8(u8::from(*svg));
        }
        Record::CreateTextNode {
            id,
            parent_id,
            index,
        }
        | Record::MoveNode {
            id,
            parent_id,
            index,
        } => {
            put_uint(out, *id);
            put_uint(out, *parent_id);
            put_uint(out, *index);
        }
        Record::RemoveNode { id } => put_uint(out, *id),
        Record::SetNodeAttribute { id, name, value } => {
            put_uint(out, *id);
            put_string(out, name);
            put_string(out, value);
        }
        Record::RemoveNodeAttribute { id, name } => {
            put_uint(out, *id);
            put_string(out, name);
        }
        Record::SetNodeData { id, data } | Record::SetCssData { id, data } => {
            put_uint(out, *id);
            put_string(out, data);
        }
        Record::SetNodeScroll { id, x, y } => {
            put_uint(out, *id);
            put_int(out, *x);
            put_int(out, *y);
        }
        Record::MouseMove { x, y } => {
            put_uint(out, *x);
            put_uint(out, *y);
        }
        Record::CssInsertRule { id, rule, index } => {
            put_uint(out, *id);
            put_string(out, rule);
            put_uint(out, *index);
        }
        Record::SetNodeAttributeUrlBased {
            id,
            name,
            value,
            base_url,
        } => {
            put_uint(out, *id);
            put_string(out, name);
            put_string(out, value);
            put_string(out, base_url);
        }
        Record::SetCssDataUrlBased { id, data, base_url } => {
            put_uint(out, *id);
            put_string(out, data);
            put_string(out, base_url);
        }
        Record::CssInsertRuleUrlBased {
            id,
            rule,
            index,
            base_url,
        } => {
            put_uint(out, *id);
            put_string(out, rule);
            put_uint(out, *index);
            put_string(out, base_url);
        }
    }
}

/// Builds a record stream: each record prefixed with its 8-byte id.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buf: BytesMut,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` under `id` (little-endian).
    pub fn push(&mut self, id: u64, record: &Record) -> &mut Self {
        self.buf.put_u64_le(id);
        encode_record(record, &mut self.buf);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
