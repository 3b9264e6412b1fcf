//! Pull-based byte stream over a chunked body.
//!
//! HTTP bodies arrive as chunks of arbitrary size. The decoder needs the
//! opposite: "give me exactly `n` bytes or fail". [`ByteStream`] sits between
//! the two and never holds more than one source chunk.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::AsyncReadExt;

use crate::error::DecodeError;

/// `bytes_left` value for a stream of unknown length.
pub const UNBOUNDED: u64 = u64::MAX;

/// A producer of body chunks. `Ok(None)` means the body ended.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        self.chunk().await.map_err(io::Error::other)
    }
}

/// An in-memory body handed out in fixed-size chunks.
pub struct MemorySource {
    data: Bytes,
    chunk_len: usize,
}

impl MemorySource {
    /// Hands out the whole buffer as a single chunk.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::chunked(data, usize::MAX)
    }

    /// Hands out the buffer `chunk_len` bytes at a time.
    pub fn chunked(data: impl Into<Bytes>, chunk_len: usize) -> Self {
        Self {
            data: data.into(),
            chunk_len: chunk_len.max(1),
        }
    }
}

#[async_trait]
impl ChunkSource for MemorySource {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let n = self.chunk_len.min(self.data.len());
        Ok(Some(self.data.split_to(n)))
    }
}

/// A saved feed file read in fixed-size chunks.
pub struct FileSource {
    file: tokio::fs::File,
    buf: BytesMut,
    chunk_len: usize,
    len: u64,
}

impl FileSource {
    const CHUNK_LEN: usize = 8 * 1024;

    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            file,
            buf: BytesMut::new(),
            chunk_len: Self::CHUNK_LEN,
            len,
        })
    }

    /// File length at open time.
    pub fn file_len(&self) -> u64 {
        self.len
    }
}

#[async_trait]
impl ChunkSource for FileSource {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        self.buf.reserve(self.chunk_len);
        let n = self.file.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.split().freeze()))
    }
}

/// Exact-read adapter over a [`ChunkSource`].
///
/// A read either fills the whole destination buffer or fails. On any failure
/// the stream is marked exhausted (`bytes_left() == 0`) and stays that way,
/// since a decoder cannot resynchronize in the middle of a field.
pub struct ByteStream<S> {
    source: S,
    pending: Bytes,
    bytes_left: u64,
    position: u64,
}

impl<S: ChunkSource> ByteStream<S> {
    /// A stream of unknown length that ends when the source does.
    pub fn new(source: S) -> Self {
        Self::with_len(source, UNBOUNDED)
    }

    /// A stream limited to `len` bytes. Source bytes past `len` are ignored,
    /// and a source that ends before `len` is a short body.
    pub fn with_len(source: S, len: u64) -> Self {
        Self {
            source,
            pending: Bytes::new(),
            bytes_left: len,
            position: 0,
        }
    }

    /// Remaining length: [`UNBOUNDED`] while unknown, `0` once exhausted.
    pub fn bytes_left(&self) -> u64 {
        self.bytes_left
    }

    pub fn is_exhausted(&self) -> bool {
        self.bytes_left == 0
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fills `buf` completely from the stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        let mut filled = 0;
        while filled < buf.len() {
            if !self.fill().await? {
                return Err(self.truncated(buf.len() as u64, filled as u64));
            }
            let n = self.pending.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.pending[..n]);
            self.consume(n);
            filled += n;
        }
        Ok(())
    }

    /// Reads one byte, or `None` at a clean end of stream.
    pub async fn read_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        if !self.fill().await? {
            return Ok(None);
        }
        let byte = self.pending[0];
        self.consume(1);
        Ok(Some(byte))
    }

    /// Discards exactly `n` bytes without buffering them.
    pub async fn skip(&mut self, n: u64) -> Result<(), DecodeError> {
        let mut skipped = 0;
        while skipped < n {
            if !self.fill().await? {
                return Err(self.truncated(n, skipped));
            }
            let step = (self.pending.len() as u64).min(n - skipped) as usize;
            self.consume(step);
            skipped += step as u64;
        }
        Ok(())
    }

    /// Makes sure `pending` holds at least one byte. `Ok(false)` is a clean
    /// end of stream.
    async fn fill(&mut self) -> Result<bool, DecodeError> {
        if self.bytes_left == 0 {
            return Ok(false);
        }
        while self.pending.is_empty() {
            match self.source.next_chunk().await {
                Ok(Some(mut chunk)) => {
                    if self.bytes_left != UNBOUNDED && chunk.len() as u64 > self.bytes_left {
                        chunk.truncate(self.bytes_left as usize);
                    }
                    self.pending = chunk;
                }
                Ok(None) => {
                    let missing = self.bytes_left;
                    self.bytes_left = 0;
                    if missing != UNBOUNDED {
                        return Err(DecodeError::ShortBody { missing });
                    }
                    return Ok(false);
                }
                Err(err) => {
                    self.bytes_left = 0;
                    return Err(err.into());
                }
            }
        }
        Ok(true)
    }

    fn consume(&mut self, n: usize) {
        self.pending.advance(n);
        self.position += n as u64;
        if self.bytes_left != UNBOUNDED {
            self.bytes_left -= n as u64;
        }
    }

    fn truncated(&mut self, wanted: u64, got: u64) -> DecodeError {
        self.bytes_left = 0;
        DecodeError::Truncated {
            wanted,
            got,
            offset: self.position,
        }
    }
}
