use crate::error::DecompressError;
use crate::inflate::{Decompress, Writer};
use bytes::Bytes;
use flate2::write::{GzDecoder, ZlibDecoder};
use std::io;
use std::io::Write;
use tracing::trace;

/// The built-in content decoders.
pub(crate) enum Decoder {
    /// Gzip decoding.
    Gzip(GzDecoder<Writer>),
    /// Deflate decoding, zlib framed as HTTP defines it.
    Deflate(ZlibDecoder<Writer>),
    /// Brotli decoding.
    Br(Box<brotli::DecompressorWriter<Writer>>),
}

impl Decoder {
    pub(crate) fn gzip() -> Self {
        Self::Gzip(GzDecoder::new(Writer::new()))
    }

    pub(crate) fn deflate() -> Self {
        Self::Deflate(ZlibDecoder::new(Writer::new()))
    }

    pub(crate) fn br() -> Self {
        Self::Br(Box::new(brotli::DecompressorWriter::new(
            Writer::new(),
            4096, // 4 KiB buffer
        )))
    }

    /// Returns the name of the encoding.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Decoder::Gzip(_) => "gzip",
            Decoder::Deflate(_) => "deflate",
            Decoder::Br(_) => "br",
        }
    }

    fn take(&mut self) -> Bytes {
        match self {
            Self::Gzip(decoder) => decoder.get_mut().take(),
            Self::Deflate(decoder) => decoder.get_mut().take(),
            Self::Br(decoder) => decoder.get_mut().take(),
        }
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Decoder").field(&self.name()).finish()
    }
}

impl Decompress for Decoder {
    fn write(&mut self, data: &[u8]) -> Result<Bytes, DecompressError> {
        let result = match self {
            Self::Gzip(decoder) => decoder.write_all(data),
            Self::Deflate(decoder) => decoder.write_all(data),
            Self::Br(decoder) => decoder.write_all(data),
        };

        match result {
            Ok(()) => Ok(self.take()),
            Err(err) => {
                trace!("Error decoding {} encoding: {}", self.name(), err);
                Err(DecompressError::corrupt(err))
            }
        }
    }

    fn finish(self: Box<Self>) -> Result<Bytes, DecompressError> {
        let name = self.name();
        let result = match *self {
            Self::Gzip(decoder) => decoder.finish().map(Writer::into_bytes),
            Self::Deflate(decoder) => decoder.finish().map(Writer::into_bytes),
            Self::Br(mut decoder) => match decoder.flush() {
                Ok(()) => decoder.into_inner().map(Writer::into_bytes).map_err(|_incomplete| {
                    io::Error::new(io::ErrorKind::UnexpectedEof, "brotli stream is incomplete")
                }),
                Err(err) => Err(err),
            },
        };

        result.map_err(|err| {
            trace!("Error finishing {} encoding: {}", name, err);
            DecompressError::truncated(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{GzEncoder, ZlibEncoder};

    const TEXT: &[u8] =
        br#"{"name":"tobi","pets":["loki","jane"],"note":"the quick brown fox jumps over the lazy dog"}"#;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn brotli(data: &[u8]) -> Vec<u8> {
        let mut encoder = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 22);
        encoder.write_all(data).unwrap();
        encoder.into_inner()
    }

    fn decode(decoder: Decoder, compressed: &[u8], chunk_size: usize) -> Result<Vec<u8>, DecompressError> {
        let mut decoder: Box<dyn Decompress> = Box::new(decoder);
        let mut output = Vec::new();
        for chunk in compressed.chunks(chunk_size) {
            output.extend_from_slice(&decoder.write(chunk)?);
        }
        output.extend_from_slice(&decoder.finish()?);
        Ok(output)
    }

    #[test]
    fn test_gzip() {
        let compressed = gzip(TEXT);
        assert_eq!(decode(Decoder::gzip(), &compressed, 7).unwrap(), TEXT);
        assert_eq!(decode(Decoder::gzip(), &compressed, compressed.len()).unwrap(), TEXT);
    }

    #[test]
    fn test_deflate() {
        let compressed = zlib(TEXT);
        assert_eq!(decode(Decoder::deflate(), &compressed, 5).unwrap(), TEXT);
    }

    #[test]
    fn test_br() {
        let compressed = brotli(TEXT);
        assert_eq!(decode(Decoder::br(), &compressed, 3).unwrap(), TEXT);
    }

    #[test]
    fn test_corrupt_input() {
        for decoder in [Decoder::gzip(), Decoder::deflate()] {
            let err = decode(decoder, TEXT, TEXT.len()).unwrap_err();
            assert!(matches!(err, DecompressError::Corrupt { .. }), "unexpected error: {err:?}");
        }
    }

    #[test]
    fn test_truncated_input() {
        let compressed = gzip(TEXT);
        let err = decode(Decoder::gzip(), &compressed[..compressed.len() / 2], 8).unwrap_err();
        assert!(matches!(err, DecompressError::Truncated { .. }), "unexpected error: {err:?}");
    }

    #[test]
    fn test_name() {
        assert_eq!(Decoder::gzip().name(), "gzip");
        assert_eq!(Decoder::deflate().name(), "deflate");
        assert_eq!(Decoder::br().name(), "br");
    }
}
