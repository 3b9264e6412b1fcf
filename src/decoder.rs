//! Streaming decoder for the top-level `FeedMessage`.
//!
//! The feed is never decoded as a whole. Top-level fields are read one at a
//! time straight off the [`ByteStream`]; each `entity` sub-message is copied
//! into a single reusable buffer, decoded with prost, handed to an
//! [`EntityVisitor`] and dropped before the next one is read. Peak memory is
//! one sub-message (capped by `max_message_len`), whatever the entity count.

use prost::Message;
use tracing::{debug, trace};

use crate::error::DecodeError;
use crate::filter::EntityVisitor;
use crate::gtfs_rt::{FeedEntity, FeedHeader};
use crate::stream::{ByteStream, ChunkSource};

pub const DEFAULT_MAX_MESSAGE_LEN: usize = 64 * 1024;

const HEADER_FIELD: u32 = 1;
const ENTITY_FIELD: u32 = 2;

const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

#[derive(Debug, Clone, Copy)]
struct Key {
    field: u32,
    wire_type: WireType,
}

/// Result of a completed decode.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSummary {
    pub header: FeedHeader,
    pub entities: usize,
    pub bytes_read: u64,
}

#[derive(Debug, Clone)]
pub struct FeedDecoder {
    max_message_len: usize,
}

impl Default for FeedDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_LEN)
    }
}

impl FeedDecoder {
    /// `max_message_len` caps the size of any single header or entity.
    pub fn new(max_message_len: usize) -> Self {
        Self { max_message_len }
    }

    /// Decodes one `FeedMessage` from `stream`, calling `visitor` once per
    /// entity in feed order.
    ///
    /// The message ends when the stream ends cleanly at a field boundary. A
    /// feed without a header, a header without a version, or an entity
    /// without an id is malformed. Any malformed or truncated field fails
    /// the whole decode; entities
    /// already visited are not rolled back, so callers must treat the
    /// visitor's state as meaningless on error.
    pub async fn decode<S, V>(
        &self,
        stream: &mut ByteStream<S>,
        visitor: &mut V,
    ) -> Result<FeedSummary, DecodeError>
    where
        S: ChunkSource,
        V: EntityVisitor,
    {
        let mut scratch = Vec::new();
        let mut header = None;
        let mut entities = 0;

        while let Some(key) = read_key(stream).await? {
            match key.field {
                HEADER_FIELD => {
                    let bytes = self.read_message(stream, key, &mut scratch).await?;
                    let decoded = FeedHeader::decode(bytes).map_err(DecodeError::Header)?;
                    if decoded.gtfs_realtime_version.is_empty() {
                        return Err(DecodeError::MissingField {
                            field: "header.gtfs_realtime_version",
                        });
                    }
                    debug!(
                        version = %decoded.gtfs_realtime_version,
                        timestamp = decoded.timestamp,
                        "Feed header decoded"
                    );
                    header = Some(decoded);
                }
                ENTITY_FIELD => {
                    let bytes = self.read_message(stream, key, &mut scratch).await?;
                    let entity =
                        FeedEntity::decode(bytes).map_err(|source| DecodeError::Entity {
                            index: entities,
                            source,
                        })?;
                    if entity.id.is_empty() {
                        return Err(DecodeError::MissingEntityId { index: entities });
                    }
                    entities += 1;
                    visitor.visit(entity);
                }
                field => {
                    trace!(field, wire_type = ?key.wire_type, "Skipping top-level field");
                    skip_field(stream, key.wire_type).await?;
                }
            }
        }

        let header = header.ok_or(DecodeError::MissingField { field: "header" })?;
        Ok(FeedSummary {
            header,
            entities,
            bytes_read: stream.position(),
        })
    }

    /// Reads a length-delimited sub-message into `scratch`, reusing its
    /// allocation.
    async fn read_message<'s, S: ChunkSource>(
        &self,
        stream: &mut ByteStream<S>,
        key: Key,
        scratch: &'s mut Vec<u8>,
    ) -> Result<&'s [u8], DecodeError> {
        if key.wire_type != WireType::LengthDelimited {
            return Err(DecodeError::UnexpectedWireType {
                field: key.field,
                wire_type: key.wire_type.code(),
            });
        }

        let len = read_varint(stream).await?;
        if len > self.max_message_len as u64 {
            return Err(DecodeError::MessageTooLarge {
                field: key.field,
                len,
                limit: self.max_message_len,
            });
        }

        scratch.clear();
        scratch.resize(len as usize, 0);
        stream.read(scratch.as_mut_slice()).await?;
        Ok(scratch.as_slice())
    }
}

impl WireType {
    fn code(self) -> u8 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::Fixed32 => 5,
        }
    }
}

/// Reads the next field key, or `None` at a clean end of stream.
async fn read_key<S: ChunkSource>(stream: &mut ByteStream<S>) -> Result<Option<Key>, DecodeError> {
    let offset = stream.position();
    let Some(first) = stream.read_byte().await? else {
        return Ok(None);
    };
    let raw = continue_varint(stream, first, offset).await?;

    let field = raw >> 3;
    if field == 0 || field > u64::from(u32::MAX >> 3) {
        return Err(DecodeError::InvalidKey { key: raw, offset });
    }
    let field = field as u32;

    let wire_type = match raw & 0x7 {
        0 => WireType::Varint,
        1 => WireType::Fixed64,
        2 => WireType::LengthDelimited,
        5 => WireType::Fixed32,
        code @ (3 | 4) => {
            return Err(DecodeError::UnsupportedWireType {
                field,
                wire_type: code as u8,
            });
        }
        _ => return Err(DecodeError::InvalidKey { key: raw, offset }),
    };

    Ok(Some(Key { field, wire_type }))
}

async fn read_varint<S: ChunkSource>(stream: &mut ByteStream<S>) -> Result<u64, DecodeError> {
    let offset = stream.position();
    let mut first = [0u8; 1];
    stream.read(&mut first).await?;
    continue_varint(stream, first[0], offset).await
}

/// Finishes a varint whose first byte has already been read.
async fn continue_varint<S: ChunkSource>(
    stream: &mut ByteStream<S>,
    first: u8,
    offset: u64,
) -> Result<u64, DecodeError> {
    let mut value = u64::from(first & 0x7f);
    let mut byte = first;
    let mut shift = 7;

    for _ in 1..MAX_VARINT_LEN {
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        let mut next = [0u8; 1];
        stream.read(&mut next).await?;
        byte = next[0];
        value |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    // The tenth byte may only contribute the top bit of a u64.
    if byte & 0x80 == 0 && byte <= 1 {
        Ok(value)
    } else {
        Err(DecodeError::VarintOverflow { offset })
    }
}

async fn skip_field<S: ChunkSource>(
    stream: &mut ByteStream<S>,
    wire_type: WireType,
) -> Result<(), DecodeError> {
    match wire_type {
        WireType::Varint => read_varint(stream).await.map(drop),
        WireType::Fixed64 => stream.skip(8).await,
        WireType::Fixed32 => stream.skip(4).await,
        WireType::LengthDelimited => {
            let len = read_varint(stream).await?;
            stream.skip(len).await
        }
    }
}
