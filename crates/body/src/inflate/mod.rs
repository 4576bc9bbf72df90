//! Content-Encoding decompression.
//!
//! A [`Decompress`] instance is created per request from a named factory in the
//! [`DecompressorRegistry`], fed the compressed frames as they arrive and finished once the
//! body ends. `gzip`, `deflate` and `br` are built in, other encodings can be registered by
//! name.

use crate::error::DecompressError;
use bytes::{Bytes, BytesMut};
use std::io;
use std::sync::Arc;

mod decoder;
mod registry;

pub use registry::DecompressorRegistry;

/// A one-shot stream transform from compressed to raw bytes.
pub trait Decompress: Send {
    /// Feeds compressed bytes, returns whatever raw bytes are ready.
    fn write(&mut self, data: &[u8]) -> Result<Bytes, DecompressError>;

    /// Ends the stream, returns the remaining raw bytes.
    ///
    /// Fails with [`DecompressError::Truncated`] when the compressed stream is incomplete.
    fn finish(self: Box<Self>) -> Result<Bytes, DecompressError>;
}

pub type DecompressorFactory = Arc<dyn Fn() -> Result<Box<dyn Decompress>, DecompressError> + Send + Sync>;

/// In-memory sink for `io::Write` based decoders.
// inspired by from actix-http
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    /// Takes the bytes written so far.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
