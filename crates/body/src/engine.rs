//! Streaming decode of one request body.
//!
//! A [`DecodeEngine`] is handed out by the dispatcher once a parser configuration has been
//! selected. It reads the body frame by frame, runs it through the decompressor and the
//! charset decoder, enforces the size limit and finally applies the parser and verify hooks.
//!
//! The per-request `DecodeState` only ever moves from receiving to terminated. After a
//! terminal error the remaining frames are read and discarded, so the transport is never left
//! with an unread body, and the first error is the one reported.

use crate::charset::{CharsetRegistry, DecoderKind, StreamDecoder, WholeDecoder};
use crate::config::{ResolvedParser, VerifyContext};
use crate::error::{BodyError, BoxError, DecompressError};
use crate::inflate::{Decompress, DecompressorRegistry};
use crate::value::BodyValue;
use bytes::{Bytes, BytesMut};
use http::request::Parts;
use http_body::Body;
use http_body_util::BodyExt;
use std::fmt;
use std::io;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, info, trace};

const IDENTITY: &str = "identity";

/// How a request outcome is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// returned right away, nothing of the body was read
    Inline,
    /// returned after yielding once to the scheduler, the body has been read
    Deferred,
}

impl Completion {
    pub async fn deliver<T>(self, outcome: T) -> T {
        if self == Completion::Deferred {
            tokio::task::yield_now().await;
        }
        outcome
    }
}

/// Decodes the body of one request with the selected parser configuration.
pub struct DecodeEngine {
    parser: Arc<ResolvedParser>,
    decompressors: Arc<DecompressorRegistry>,
    charsets: Arc<CharsetRegistry>,
    content_encoding: String,
    content_length: Option<u64>,
    charset: Option<String>,
}

impl DecodeEngine {
    pub(crate) fn new(
        parser: Arc<ResolvedParser>,
        decompressors: Arc<DecompressorRegistry>,
        charsets: Arc<CharsetRegistry>,
        content_encoding: String,
        content_length: Option<u64>,
        charset: Option<String>,
    ) -> Self {
        Self { parser, decompressors, charsets, content_encoding, content_length, charset }
    }

    pub fn content_encoding(&self) -> &str {
        &self.content_encoding
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// The charset the body is decoded with, `None` when the body stays raw bytes.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Reads the whole body and produces the parsed value.
    ///
    /// `Ok(None)` means the body was empty and the configuration has no empty value.
    pub async fn run<B>(self, head: &Parts, body: B) -> Result<Option<BodyValue>, BodyError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let mut body = pin!(body);
        let mut state = self.start();

        loop {
            match body.as_mut().frame().await {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => state.on_data(data),
                    Err(_trailers) => trace!("ignore trailers of request body"),
                },
                Some(Err(e)) => {
                    state.on_error(e.into());
                    break;
                }
                None => {
                    state.on_end(head);
                    break;
                }
            }
        }

        Completion::Deferred.deliver(state.close()).await
    }

    fn start(&self) -> DecodeState {
        let mut state = DecodeState::new(
            Arc::clone(&self.parser),
            self.strategy(),
            self.content_encoding.clone(),
            self.content_length,
            self.charset.clone(),
        );

        match self.open_decompressor() {
            Ok(decompressor) => state.decompressor = decompressor,
            Err(e) => {
                state.terminate(Err(e));
                return state;
            }
        }

        // a declared length is only trustworthy for the decoded size without compression
        if let (Some(limit), Some(length)) = (self.parser.limit, self.content_length) {
            if state.decompressor.is_none() && length > limit {
                debug!(limit, length, "declared content length exceeds the limit");
                state.terminate(Err(BodyError::too_large(limit, Some(length), 0)));
            }
        }
        state
    }

    fn open_decompressor(&self) -> Result<Option<Box<dyn Decompress>>, BodyError> {
        let content_encoding = self.content_encoding.as_str();
        if content_encoding == IDENTITY {
            return if self.decompressors.is_available(IDENTITY) {
                Ok(None)
            } else {
                Err(unsupported(content_encoding))
            };
        }

        match self.decompressors.open(content_encoding) {
            Some(Ok(decompressor)) => Ok(Some(decompressor)),
            Some(Err(e)) => Err(decompression_failed(content_encoding, e.to_string())),
            None => Err(unsupported(content_encoding)),
        }
    }

    fn strategy(&self) -> Strategy {
        let decoder = self.charset.as_deref().and_then(|charset| self.charsets.decoder(charset));
        match decoder.map(|encoder| encoder.kind()) {
            Some(DecoderKind::Streaming(factory)) => Strategy::Chunked(factory()),
            Some(DecoderKind::Whole(decode)) => Strategy::Whole(Arc::clone(decode)),
            None => Strategy::Raw,
        }
    }
}

impl fmt::Debug for DecodeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeEngine")
            .field("parser", &self.parser)
            .field("content_encoding", &self.content_encoding)
            .field("content_length", &self.content_length)
            .field("charset", &self.charset)
            .finish_non_exhaustive()
    }
}

fn decompression_failed(content_encoding: &str, message: String) -> BodyError {
    BodyError::DecompressionFailed { content_encoding: content_encoding.to_string(), message }
}

fn unsupported(content_encoding: &str) -> BodyError {
    decompression_failed(content_encoding, format!("unsupported content encoding \"{content_encoding}\""))
}

/// How body bytes become text, decided once per request.
enum Strategy {
    /// no charset, the body stays bytes
    Raw,
    /// decode every chunk as it arrives
    Chunked(Box<dyn StreamDecoder>),
    /// collect the bytes, decode them once at the end
    Whole(WholeDecoder),
}

enum Phase {
    Receiving,
    Terminated(Result<Option<BodyValue>, BodyError>),
}

/// Mutable state of one request, owned by its engine.
pub(crate) struct DecodeState {
    parser: Arc<ResolvedParser>,
    strategy: Strategy,
    decompressor: Option<Box<dyn Decompress>>,
    content_encoding: String,
    content_length: Option<u64>,
    charset: Option<String>,
    /// decoded bytes seen so far
    received: u64,
    /// bytes read after termination
    skipped: usize,
    /// raw bytes, for the raw and whole strategies, or for the verify hook
    raw: BytesMut,
    keep_raw: bool,
    pieces: String,
    phase: Phase,
}

impl DecodeState {
    fn new(
        parser: Arc<ResolvedParser>,
        strategy: Strategy,
        content_encoding: String,
        content_length: Option<u64>,
        charset: Option<String>,
    ) -> Self {
        let keep_raw = !matches!(strategy, Strategy::Chunked(_)) || parser.verify.is_some();
        Self {
            parser,
            strategy,
            decompressor: None,
            content_encoding,
            content_length,
            charset,
            received: 0,
            skipped: 0,
            raw: BytesMut::new(),
            keep_raw,
            pieces: String::new(),
            phase: Phase::Receiving,
        }
    }

    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated(_))
    }

    /// Moves to the terminal phase and releases the buffers, later transitions are ignored.
    fn terminate(&mut self, outcome: Result<Option<BodyValue>, BodyError>) {
        if self.is_terminated() {
            return;
        }
        if let Err(e) = &outcome {
            debug!(error = %e, received = self.received, "request body failed");
        }
        self.raw = BytesMut::new();
        self.pieces = String::new();
        self.decompressor = None;
        self.strategy = Strategy::Raw;
        self.phase = Phase::Terminated(outcome);
    }

    fn on_data(&mut self, chunk: Bytes) {
        if self.is_terminated() {
            self.skipped += chunk.len();
            return;
        }

        let data = match self.decompressor.as_mut() {
            Some(decompressor) => match decompressor.write(&chunk) {
                Ok(data) => data,
                Err(e) => {
                    let e = self.decompress_error(e);
                    self.terminate(Err(e));
                    return;
                }
            },
            None => chunk,
        };
        self.accept(&data);
    }

    fn accept(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        self.received += data.len() as u64;
        if let Some(limit) = self.parser.limit {
            if self.received > limit {
                let e = BodyError::too_large(limit, self.content_length, self.received);
                self.terminate(Err(e));
                return;
            }
        }
        trace!(chunk = data.len(), received = self.received, "request body chunk");

        if let Strategy::Chunked(decoder) = &mut self.strategy {
            self.pieces.push_str(&decoder.decode(data));
        }
        if self.keep_raw {
            self.raw.extend_from_slice(data);
        }
    }

    fn on_error(&mut self, e: BoxError) {
        if self.is_terminated() {
            return;
        }

        let aborted = e.downcast_ref::<io::Error>().is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        });
        let e = if aborted {
            BodyError::Aborted { received: self.received, expected: self.content_length }
        } else {
            BodyError::stream(e)
        };
        self.terminate(Err(e));
    }

    fn on_end(&mut self, head: &Parts) {
        if self.is_terminated() {
            return;
        }

        if let Some(decompressor) = self.decompressor.take() {
            match decompressor.finish() {
                Ok(rest) => {
                    self.accept(&rest);
                    if self.is_terminated() {
                        return;
                    }
                }
                Err(e) => {
                    let e = self.decompress_error(e);
                    self.terminate(Err(e));
                    return;
                }
            }
        }

        let outcome = self.finish(head);
        self.terminate(outcome);
    }

    fn finish(&mut self, head: &Parts) -> Result<Option<BodyValue>, BodyError> {
        if let Some(expected) = self.content_length {
            if self.content_encoding == IDENTITY && self.received != expected {
                return Err(BodyError::SizeInvalid { expected, received: self.received });
            }
        }

        if self.received == 0 {
            return Ok(self.parser.empty_response.clone());
        }

        let raw = self.raw.split().freeze();
        let value = match std::mem::replace(&mut self.strategy, Strategy::Raw) {
            Strategy::Raw => BodyValue::Bytes(raw.clone()),
            Strategy::Chunked(mut decoder) => {
                let mut text = std::mem::take(&mut self.pieces);
                text.push_str(&decoder.finish());
                BodyValue::Text(text)
            }
            Strategy::Whole(decode) => match decode(&raw) {
                Ok(text) => BodyValue::Text(text),
                Err(e) => return Err(BodyError::parse_failed(e, String::from_utf8_lossy(&raw).into_owned())),
            },
        };

        let value = match &self.parser.parser {
            Some(parse) => parse(&value).map_err(|e| BodyError::parse_failed(e, value.to_detail_string()))?,
            None => value,
        };

        if let Some(verify) = &self.parser.verify {
            let context =
                VerifyContext { request: head, raw: &raw, body: &value, encoding: self.charset.as_deref() };
            verify(&context).map_err(|e| BodyError::verify_failed(e, value.to_detail_string()))?;
        }

        Ok(Some(value))
    }

    fn decompress_error(&self, e: DecompressError) -> BodyError {
        let content_encoding = self.content_encoding.clone();
        match e {
            DecompressError::Corrupt { .. } => BodyError::HeaderCheck { content_encoding },
            DecompressError::Truncated { .. } => BodyError::EndOfFile { content_encoding },
            DecompressError::Other { source } => BodyError::Stream { source },
        }
    }

    /// Hands out the outcome, the state is gone afterwards.
    fn close(self) -> Result<Option<BodyValue>, BodyError> {
        if self.skipped > 0 {
            info!(size = self.skipped, "skip request body");
        }
        match self.phase {
            Phase::Terminated(outcome) => outcome,
            // closed before the body ended
            Phase::Receiving => Err(BodyError::Aborted { received: self.received, expected: self.content_length }),
        }
    }
}
