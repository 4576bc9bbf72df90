//! The request dispatcher.
//!
//! [`BodyParser::dispatch`] looks at the request head only: it picks the media type, then the
//! charset, then the content encoding, each stage narrowing the parser configurations left
//! from the previous one. Requests without a body complete right there, every other accepted
//! request gets a [`DecodeEngine`] for its body.

use crate::charset::{BufferEncoder, CharsetRegistry, EncodingVariations};
use crate::config::{EncodingPolicy, GlobalOptions, Inflate, ParserEntry, ResolvedParser, join_parsers};
use crate::engine::{Completion, DecodeEngine};
use crate::error::{BodyError, BoxError, ConfigError, DecompressError};
use crate::inflate::{Decompress, DecompressorFactory, DecompressorRegistry};
use crate::limit::Limit;
use crate::media_type::MediaType;
use crate::value::BodyValue;
use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderMap, Method, Request};
use http_body::Body;
use mime::Mime;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const IDENTITY: &str = "identity";

/// Outcome of dispatching a request head.
#[derive(Debug)]
pub enum Dispatch {
    /// the request is settled without reading its body
    Complete(Result<Option<BodyValue>, BodyError>),
    /// the body has to be read with the engine
    Decode(DecodeEngine),
}

/// The body parsing middleware.
///
/// Built once with [`BodyParser::builder`], cheap to clone and shared by every request.
#[derive(Debug, Clone)]
pub struct BodyParser {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    parsers: Vec<Arc<ResolvedParser>>,
    decompressors: Arc<DecompressorRegistry>,
    charsets: Arc<CharsetRegistry>,
    options: GlobalOptions,
    default_content_type: Option<Mime>,
}

impl BodyParser {
    pub fn builder() -> BodyParserBuilder {
        BodyParserBuilder::new()
    }

    pub fn parsers(&self) -> impl Iterator<Item = &ResolvedParser> {
        self.inner.parsers.iter().map(AsRef::as_ref)
    }

    pub fn decompressors(&self) -> &DecompressorRegistry {
        &self.inner.decompressors
    }

    pub fn charsets(&self) -> &CharsetRegistry {
        &self.inner.charsets
    }

    /// Parses the body of `request` and puts the result in its place.
    pub async fn apply<B>(&self, request: Request<B>) -> Result<Request<Option<BodyValue>>, BodyError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let value = self.parse(&parts, body).await?;
        Ok(Request::from_parts(parts, value))
    }

    /// Dispatches the request and, when it has to, reads and parses its body.
    ///
    /// `Ok(None)` means there is no body value: the request has no body, or the body is empty
    /// and the selected configuration has no empty value.
    pub async fn parse<B>(&self, head: &Parts, body: B) -> Result<Option<BodyValue>, BodyError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        match self.dispatch(head) {
            Dispatch::Complete(outcome) => Completion::Inline.deliver(outcome).await,
            Dispatch::Decode(engine) => engine.run(head, body).await,
        }
    }

    /// Selects the parser configuration for a request head.
    ///
    /// # Panics
    ///
    /// A panicking matcher predicate is not caught. Predicates are not called for `GET` and
    /// `DELETE` requests without a body.
    pub fn dispatch(&self, head: &Parts) -> Dispatch {
        let headers = &head.headers;
        let bodiless_method = head.method == Method::GET || head.method == Method::DELETE;
        let content_length = content_length(headers);
        let has_body = content_length.is_some() || headers.contains_key(TRANSFER_ENCODING);

        if content_length.is_none() && self.inner.options.require_content_length {
            return reject(head, BodyError::ContentLengthMissing);
        }
        if bodiless_method && !has_body {
            return Dispatch::Complete(Ok(None));
        }
        let bodiless = bodiless_method || !has_body;
        let content_encoding = content_encoding(headers);

        let mime = match self.media_type(headers) {
            Ok(mime) => mime,
            Err(_) if bodiless_method => return Dispatch::Complete(Ok(None)),
            Err(e) => return reject(head, e),
        };
        let media_type = MediaType::from(&mime);
        let requested = mime.get_param(mime::CHARSET).map(|charset| charset.as_str().to_ascii_lowercase());

        let matched: Vec<&Arc<ResolvedParser>> =
            self.inner.parsers.iter().filter(|parser| parser.matches(&media_type)).collect();
        let compatible: Vec<(&Arc<ResolvedParser>, Option<String>)> = matched
            .iter()
            .filter_map(|parser| self.charset_for(parser, requested.as_deref()).map(|charset| (*parser, charset)))
            .collect();
        let selected = compatible.iter().find(|(parser, _)| {
            parser.accepts_content_encoding(&content_encoding, self.inner.decompressors.available_names())
        });

        if bodiless {
            debug!(%media_type, selected = selected.is_some(), "request without body");
            return Dispatch::Complete(Ok(selected.and_then(|(parser, _)| parser.empty_response.clone())));
        }

        if matched.is_empty() {
            let message = format!("Unsupported media type '{media_type}'.");
            return reject(head, BodyError::MediaTypeUnsupported { media_type: media_type.to_string(), message });
        }
        if compatible.is_empty() {
            return reject(head, self.charset_error(&matched, requested, &media_type));
        }
        let Some((parser, charset)) = selected else {
            return reject(head, self.encoding_error(content_encoding, &media_type));
        };
        if parser.require_content_length && content_length.is_none() {
            return reject(head, BodyError::ContentLengthMissing);
        }

        debug!(%media_type, charset = ?charset, %content_encoding, ?content_length, "decode request body");
        Dispatch::Decode(DecodeEngine::new(
            Arc::clone(*parser),
            Arc::clone(&self.inner.decompressors),
            Arc::clone(&self.inner.charsets),
            content_encoding,
            content_length,
            charset.clone(),
        ))
    }

    fn media_type(&self, headers: &HeaderMap) -> Result<Mime, BodyError> {
        match headers.get(CONTENT_TYPE) {
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|content_type| content_type.parse::<Mime>().ok())
                .ok_or_else(|| BodyError::media_type_invalid(String::from_utf8_lossy(value.as_bytes()))),
            None => self.inner.default_content_type.clone().ok_or_else(|| BodyError::media_type_invalid("")),
        }
    }

    /// The charset a configuration decodes the request with.
    ///
    /// `None` if the configuration can't take the request, `Some(None)` if it has no charset
    /// policy and keeps the body as bytes.
    fn charset_for(&self, parser: &ResolvedParser, requested: Option<&str>) -> Option<Option<String>> {
        let Some(policy) = &parser.encodings else {
            return Some(None);
        };
        let charset = requested.or(parser.default_encoding.as_deref())?;
        let allowed = match policy {
            EncodingPolicy::All => true,
            EncodingPolicy::Only(names) => names.iter().any(|name| name == charset),
        };
        (allowed && self.inner.charsets.is_available(charset)).then(|| Some(charset.to_string()))
    }

    fn charset_error(
        &self,
        matched: &[&Arc<ResolvedParser>],
        requested: Option<String>,
        media_type: &MediaType,
    ) -> BodyError {
        let charset = requested.or_else(|| matched.iter().find_map(|parser| parser.default_encoding.clone()));
        let message = match &charset {
            None => format!("Unable to determine the charset for media type '{media_type}'."),
            Some(charset) if self.inner.charsets.is_available(charset) => {
                format!("Specified 'charset={charset}' is not supported for media type '{media_type}'.")
            }
            Some(charset) => format!("Specified 'charset={charset}' is not available on this server."),
        };
        BodyError::CharsetUnsupported { charset, media_type: media_type.to_string(), message }
    }

    fn encoding_error(&self, content_encoding: String, media_type: &MediaType) -> BodyError {
        let message = if self.inner.decompressors.is_available(&content_encoding) {
            format!("Content-Encoding '{content_encoding}' is not enabled for media type '{media_type}'.")
        } else {
            format!("Unsupported Content-Encoding '{content_encoding}'.")
        };
        BodyError::EncodingUnsupported { content_encoding, message }
    }
}

fn reject(head: &Parts, e: BodyError) -> Dispatch {
    warn!(method = %head.method, uri = %head.uri, status = e.status().as_u16(), kind = e.type_tag(), "{}", e);
    Dispatch::Complete(Err(e))
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

fn content_encoding(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_ENCODING)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| IDENTITY.to_string())
}

/// Builder of a [`BodyParser`].
///
/// Without any [`parser`](BodyParserBuilder::parser) entry the four default media types are
/// registered.
#[derive(Default)]
pub struct BodyParserBuilder {
    options: GlobalOptions,
    entries: Vec<ParserEntry>,
    encoders: Vec<BufferEncoder>,
    decompressors: Vec<(String, DecompressorFactory)>,
}

impl BodyParserBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Default size limit, `"20kb"` unless set.
    pub fn limit<L: Into<Limit>>(mut self, limit: L) -> Self {
        self.options.limit = limit.into();
        self
    }

    /// Default accepted content encodings, only `identity` unless set.
    pub fn inflate<I: Into<Inflate>>(mut self, inflate: I) -> Self {
        self.options.inflate = inflate.into();
        self
    }

    pub fn require_content_length(mut self, required: bool) -> Self {
        self.options.require_content_length = required;
        self
    }

    /// Media type assumed for requests without `Content-Type`.
    pub fn default_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.options.default_content_type = Some(content_type.into());
        self
    }

    pub fn parameter_limit(mut self, parameter_limit: usize) -> Self {
        self.options.parameter_limit = parameter_limit;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    pub fn parser<E: Into<ParserEntry>>(mut self, entry: E) -> Self {
        self.entries.push(entry.into());
        self
    }

    pub fn encoder(mut self, encoder: BufferEncoder) -> Self {
        self.encoders.push(encoder);
        self
    }

    /// Registers a decompressor for a content encoding, replacing a built-in one of the same name.
    pub fn decompressor<S, F>(mut self, name: S, factory: F) -> Self
    where
        S: Into<String>,
        F: Fn() -> Result<Box<dyn Decompress>, DecompressError> + Send + Sync + 'static,
    {
        self.decompressors.push((name.into(), Arc::new(factory)));
        self
    }

    pub fn build(self) -> Result<BodyParser, ConfigError> {
        let default_content_type = match &self.options.default_content_type {
            Some(content_type) => Some(
                content_type
                    .parse::<Mime>()
                    .map_err(|_e| ConfigError::InvalidDefaultContentType { content_type: content_type.clone() })?,
            ),
            None => None,
        };

        let variations = EncodingVariations::resolve(&self.encoders)?;
        let parsers = join_parsers(self.entries, &self.options, &variations)?;
        let charsets = CharsetRegistry::build(&parsers, &variations, self.encoders)?;
        let decompressors = DecompressorRegistry::build(&parsers, self.decompressors)?;

        Ok(BodyParser {
            inner: Arc::new(Inner {
                parsers: parsers.into_iter().map(Arc::new).collect(),
                decompressors: Arc::new(decompressors),
                charsets: Arc::new(charsets),
                options: self.options,
                default_content_type,
            }),
        })
    }
}

impl fmt::Debug for BodyParserBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decompressors: Vec<&str> = self.decompressors.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("BodyParserBuilder")
            .field("options", &self.options)
            .field("entries", &self.entries)
            .field("encoders", &self.encoders)
            .field("decompressors", &decompressors)
            .finish()
    }
}
