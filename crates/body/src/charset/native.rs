//! Built-in charset decoders.
//!
//! Invalid input never fails, malformed sequences decode to `U+FFFD`. The Unicode charsets
//! are backed by `encoding_rs`.

use crate::charset::{BufferEncoder, StreamDecoder};
use encoding_rs::{CoderResult, Decoder, UTF_8, UTF_16LE, mem};
use std::fmt;
use std::fmt::Write;

/// Every charset name the crate can decode without user supplied encoders.
pub(crate) const NATIVE_CHARSETS: &[&str] =
    &["utf8", "utf-8", "ucs2", "ucs-2", "utf16le", "utf-16le", "latin1", "binary", "ascii", "hex"];

/// Alias groups that share one decoder.
pub(crate) const NATIVE_VARIATIONS: &[&[&str]] = &[&["utf8", "utf-8"], &["ucs2", "ucs-2"]];

/// Creates the built-in encoder for `name`, registered under `aliases`.
pub(crate) fn native_encoder(name: &str, aliases: &[String]) -> Option<BufferEncoder> {
    let aliases = aliases.iter();
    let encoder = match name {
        "utf8" | "utf-8" => BufferEncoder::streaming(aliases, EncodingDecoder::utf8),
        "ucs2" | "ucs-2" | "utf16le" | "utf-16le" => BufferEncoder::streaming(aliases, EncodingDecoder::utf16le),
        "latin1" | "binary" => BufferEncoder::streaming(aliases, || Latin1Decoder),
        "ascii" => BufferEncoder::streaming(aliases, || AsciiDecoder),
        "hex" => BufferEncoder::streaming(aliases, || HexDecoder),
        _ => return None,
    };
    Some(encoder)
}

/// Streaming decoder over an `encoding_rs` decoder.
///
/// Bytes of a character split across chunks are carried over to the next call.
pub struct EncodingDecoder(Decoder);

impl EncodingDecoder {
    pub fn utf8() -> Self {
        Self(UTF_8.new_decoder_without_bom_handling())
    }

    pub fn utf16le() -> Self {
        Self(UTF_16LE.new_decoder_without_bom_handling())
    }

    fn decode_to_string(&mut self, mut chunk: &[u8], last: bool) -> String {
        let capacity = self.0.max_utf8_buffer_length(chunk.len()).unwrap_or(chunk.len() * 3 + 4);
        let mut output = String::with_capacity(capacity);
        loop {
            let (result, read, _replaced) = self.0.decode_to_string(chunk, &mut output, last);
            chunk = &chunk[read..];
            match result {
                CoderResult::InputEmpty => return output,
                CoderResult::OutputFull => {
                    let additional = self.0.max_utf8_buffer_length(chunk.len()).unwrap_or(chunk.len() * 3 + 4);
                    output.reserve(additional);
                }
            }
        }
    }
}

impl StreamDecoder for EncodingDecoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.decode_to_string(chunk, false)
    }

    fn finish(&mut self) -> String {
        self.decode_to_string(&[], true)
    }
}

impl fmt::Debug for EncodingDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodingDecoder").field(&self.0.encoding().name()).finish()
    }
}

/// ISO-8859-1, every byte is the code point of the same value.
#[derive(Debug)]
pub struct Latin1Decoder;

impl StreamDecoder for Latin1Decoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        mem::decode_latin1(chunk).into_owned()
    }

    fn finish(&mut self) -> String {
        String::new()
    }
}

/// Seven bit decoder, the high bit of every byte is dropped.
#[derive(Debug)]
pub struct AsciiDecoder;

impl StreamDecoder for AsciiDecoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        let ascii: Vec<u8> = chunk.iter().map(|b| b & 0x7f).collect();
        mem::decode_latin1(&ascii).into_owned()
    }

    fn finish(&mut self) -> String {
        String::new()
    }
}

#[derive(Debug)]
pub struct HexDecoder;

impl StreamDecoder for HexDecoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut output = String::with_capacity(chunk.len() * 2);
        for b in chunk {
            let _ = write!(output, "{b:02x}");
        }
        output
    }

    fn finish(&mut self) -> String {
        String::new()
    }
}
