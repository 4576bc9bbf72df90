//! Character decoding of request bodies.
//!
//! A [`BufferEncoder`] turns body bytes into text for one or more charset aliases. It comes in
//! two flavours:
//! - streaming: a fresh [`StreamDecoder`] is created per request and decodes every chunk as it
//!   arrives, the decoded pieces are concatenated once the body ends
//! - whole-buffer: the raw body is collected and decoded once at the end
//!
//! Built-in charsets use the streaming flavour, see [`native`].

use crate::error::HookError;
use std::fmt;
use std::sync::Arc;

pub(crate) mod native;
mod registry;
mod variations;

pub use registry::CharsetRegistry;
pub use registry::DecoderHandle;
pub use variations::EncodingVariations;

/// Incremental byte to text decoder, one instance per request.
#[cfg_attr(test, mockall::automock)]
pub trait StreamDecoder: Send {
    /// Decodes a chunk, bytes of an incomplete trailing character are kept for the next call.
    fn decode(&mut self, chunk: &[u8]) -> String;

    /// Flushes whatever is left once the body ended.
    fn finish(&mut self) -> String;
}

pub type StreamDecoderFactory = Arc<dyn Fn() -> Box<dyn StreamDecoder> + Send + Sync>;
pub type WholeDecoder = Arc<dyn Fn(&[u8]) -> Result<String, HookError> + Send + Sync>;

#[derive(Clone)]
pub enum DecoderKind {
    Streaming(StreamDecoderFactory),
    Whole(WholeDecoder),
}

impl fmt::Debug for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderKind::Streaming(_) => f.write_str("Streaming"),
            DecoderKind::Whole(_) => f.write_str("Whole"),
        }
    }
}

/// A charset decoder registered under one or more alias names.
#[derive(Clone)]
pub struct BufferEncoder {
    aliases: Vec<String>,
    kind: DecoderKind,
}

impl BufferEncoder {
    pub fn streaming<I, S, F, D>(aliases: I, factory: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn() -> D + Send + Sync + 'static,
        D: StreamDecoder + 'static,
    {
        let factory: StreamDecoderFactory = Arc::new(move || Box::new(factory()) as Box<dyn StreamDecoder>);
        Self { aliases: normalize_aliases(aliases), kind: DecoderKind::Streaming(factory) }
    }

    pub fn whole<I, S, F>(aliases: I, decode: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&[u8]) -> Result<String, HookError> + Send + Sync + 'static,
    {
        Self { aliases: normalize_aliases(aliases), kind: DecoderKind::Whole(Arc::new(decode)) }
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn kind(&self) -> &DecoderKind {
        &self.kind
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.kind, DecoderKind::Streaming(_))
    }
}

impl fmt::Debug for BufferEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_streaming() { "streaming" } else { "whole" };
        f.debug_struct("BufferEncoder").field("aliases", &self.aliases).field("kind", &kind).finish()
    }
}

fn normalize_aliases<I, S>(aliases: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for alias in aliases {
        let alias = alias.as_ref().trim().to_ascii_lowercase();
        if !alias.is_empty() && !normalized.contains(&alias) {
            normalized.push(alias);
        }
    }
    normalized
}
