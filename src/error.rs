//! Errors raised while streaming a feed body through the decoder.

use thiserror::Error;

/// Failure of one streaming decode.
///
/// The `Display` text is what ends up in a decode-failure report, so every
/// variant carries enough context (offsets, field numbers) to locate the
/// problem in the feed.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended in the middle of a requested read.
    #[error("stream ended after {got} of {wanted} bytes at offset {offset}")]
    Truncated { wanted: u64, got: u64, offset: u64 },
    /// A body with a declared length closed early.
    #[error("body closed {missing} bytes short of its declared length")]
    ShortBody { missing: u64 },
    /// The underlying byte source reported an I/O error.
    #[error("byte source failed: {0}")]
    Source(#[from] std::io::Error),
    #[error("varint longer than ten bytes at offset {offset}")]
    VarintOverflow { offset: u64 },
    #[error("invalid field key {key:#x} at offset {offset}")]
    InvalidKey { key: u64, offset: u64 },
    #[error("field {field} uses unsupported wire type {wire_type}")]
    UnsupportedWireType { field: u32, wire_type: u8 },
    #[error("field {field} has wire type {wire_type}, expected length-delimited")]
    UnexpectedWireType { field: u32, wire_type: u8 },
    /// A sub-message is larger than the decoder is allowed to buffer.
    #[error("field {field} declares {len} bytes, above the {limit} byte limit")]
    MessageTooLarge { field: u32, len: u64, limit: usize },
    #[error("feed header failed to decode: {0}")]
    Header(#[source] prost::DecodeError),
    #[error("entity #{index} failed to decode: {source}")]
    Entity {
        index: usize,
        #[source]
        source: prost::DecodeError,
    },
    /// A `required` schema field was absent. prost does not check these.
    #[error("feed is missing required field {field}")]
    MissingField { field: &'static str },
    #[error("entity #{index} is missing required field id")]
    MissingEntityId { index: usize },
}

impl DecodeError {
    /// Returns `true` for failures caused by the stream ending early rather
    /// than by malformed content.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::ShortBody { .. })
    }
}
