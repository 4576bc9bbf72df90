use http::StatusCode;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors raised while a request body is dispatched, decoded and parsed.
///
/// Every variant maps to a status code and a machine-readable type tag, see
/// [`BodyError::status`] and [`BodyError::type_tag`].
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("invalid media type: {media_type}")]
    MediaTypeInvalid { media_type: String },

    #[error("{message}")]
    MediaTypeUnsupported { media_type: String, message: String },

    #[error("{message}")]
    CharsetUnsupported { charset: Option<String>, media_type: String, message: String },

    #[error("{message}")]
    EncodingUnsupported { content_encoding: String, message: String },

    #[error("{message}")]
    DecompressionFailed { content_encoding: String, message: String },

    #[error("request aborted")]
    Aborted { received: u64, expected: Option<u64> },

    #[error("incorrect header check")]
    HeaderCheck { content_encoding: String },

    #[error("unexpected end of file")]
    EndOfFile { content_encoding: String },

    #[error("request size did not match content length")]
    SizeInvalid { expected: u64, received: u64 },

    #[error("request entity too large")]
    TooLarge { limit: u64, length: Option<u64>, received: u64 },

    #[error("content length is required")]
    ContentLengthMissing,

    #[error("{message}")]
    ParseFailed { status: StatusCode, kind: String, message: String, body: String },

    #[error("{message}")]
    VerifyFailed { status: StatusCode, kind: String, message: String, body: String },

    #[error("stream error: {source}")]
    Stream { source: BoxError },
}

impl BodyError {
    pub fn media_type_invalid<S: ToString>(media_type: S) -> Self {
        Self::MediaTypeInvalid { media_type: media_type.to_string() }
    }

    pub fn too_large(limit: u64, length: Option<u64>, received: u64) -> Self {
        Self::TooLarge { limit, length, received }
    }

    pub fn stream<E: Into<BoxError>>(e: E) -> Self {
        Self::Stream { source: e.into() }
    }

    /// Builds a parse failure, keeping the status and type the hook attached.
    pub(crate) fn parse_failed(hook: HookError, body: String) -> Self {
        Self::ParseFailed {
            status: hook.status.unwrap_or(StatusCode::BAD_REQUEST),
            kind: hook.kind.unwrap_or_else(|| "entity.parse.failed".to_string()),
            message: hook.message,
            body,
        }
    }

    /// Builds a verify failure, keeping the status and type the hook attached.
    pub(crate) fn verify_failed(hook: HookError, body: String) -> Self {
        Self::VerifyFailed {
            status: hook.status.unwrap_or(StatusCode::FORBIDDEN),
            kind: hook.kind.unwrap_or_else(|| "entity.verify.failed".to_string()),
            message: hook.message,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MediaTypeInvalid { .. }
            | Self::Aborted { .. }
            | Self::HeaderCheck { .. }
            | Self::EndOfFile { .. }
            | Self::SizeInvalid { .. } => StatusCode::BAD_REQUEST,
            Self::MediaTypeUnsupported { .. }
            | Self::CharsetUnsupported { .. }
            | Self::EncodingUnsupported { .. }
            | Self::DecompressionFailed { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ContentLengthMissing => StatusCode::LENGTH_REQUIRED,
            Self::ParseFailed { status, .. } | Self::VerifyFailed { status, .. } => *status,
            Self::Stream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            Self::MediaTypeInvalid { .. } => "mediaType.invalid",
            Self::MediaTypeUnsupported { .. } => "mediaType.unsupported",
            Self::CharsetUnsupported { .. } => "charset.unsupported",
            Self::EncodingUnsupported { .. } => "encoding.unsupported",
            Self::DecompressionFailed { .. } => "decompression.failed",
            Self::Aborted { .. } => "request.aborted",
            Self::HeaderCheck { .. } => "header.check",
            Self::EndOfFile { .. } => "end.of.file",
            Self::SizeInvalid { .. } => "request.size.invalid",
            Self::TooLarge { .. } => "entity.too.large",
            Self::ContentLengthMissing => "contentLength.missing",
            Self::ParseFailed { kind, .. } | Self::VerifyFailed { kind, .. } => kind.as_str(),
            Self::Stream { .. } => "stream.failed",
        }
    }

    /// Error code for connection level failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Aborted { .. } => Some("ECONNABORTED"),
            _ => None,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        match self {
            Self::TooLarge { limit, .. } => Some(*limit),
            _ => None,
        }
    }

    pub fn received(&self) -> Option<u64> {
        match self {
            Self::TooLarge { received, .. } | Self::SizeInvalid { received, .. } | Self::Aborted { received, .. } => {
                Some(*received)
            }
            _ => None,
        }
    }

    pub fn content_encoding(&self) -> Option<&str> {
        match self {
            Self::EncodingUnsupported { content_encoding, .. }
            | Self::DecompressionFailed { content_encoding, .. }
            | Self::HeaderCheck { content_encoding }
            | Self::EndOfFile { content_encoding } => Some(content_encoding.as_str()),
            _ => None,
        }
    }

    pub fn charset(&self) -> Option<&str> {
        match self {
            Self::CharsetUnsupported { charset, .. } => charset.as_deref(),
            _ => None,
        }
    }

    pub fn media_type(&self) -> Option<&str> {
        match self {
            Self::MediaTypeInvalid { media_type }
            | Self::MediaTypeUnsupported { media_type, .. }
            | Self::CharsetUnsupported { media_type, .. } => Some(media_type.as_str()),
            _ => None,
        }
    }

    /// The offending payload of a parse or verify failure.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::ParseFailed { body, .. } | Self::VerifyFailed { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }
}

/// Failure reported by a parser or verify hook.
///
/// The hook may pick its own status and type tag, otherwise the engine falls back to
/// `400 entity.parse.failed` for parsers and `403 entity.verify.failed` for verifiers.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
    status: Option<StatusCode>,
    kind: Option<String>,
}

impl HookError {
    pub fn new<S: ToString>(message: S) -> Self {
        Self { message: message.to_string(), status: None, kind: None }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type<S: ToString>(mut self, kind: S) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while a [`BodyParser`](crate::BodyParser) is being built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid media type identifier '{identifier}'")]
    InvalidMediaType { identifier: String },

    #[error("invalid default content type '{content_type}'")]
    InvalidDefaultContentType { content_type: String },

    #[error("invalid limit '{limit}'")]
    InvalidLimit { limit: String },

    #[error("parser configuration needs at least one matcher")]
    EmptyMatcher,

    #[error("encoding supplied more than one time: {}", aliases.join(", "))]
    DuplicateEncoding { aliases: Vec<String> },

    #[error("default encoding '{default_encoding}' is set while encodings are disabled")]
    ContradictoryEncoding { default_encoding: String },

    #[error("the following decompressors are not available: {}", names.join(", "))]
    MissingDecompressors { names: Vec<String> },

    #[error("the following encodings are not available: {}", names.join(", "))]
    MissingEncodings { names: Vec<String> },
}

/// Failure raised by a [`Decompress`](crate::inflate::Decompress) stream.
#[derive(Debug, Error)]
pub enum DecompressError {
    /// the compressed data is malformed
    #[error("corrupt compressed data: {source}")]
    Corrupt { source: io::Error },

    /// the compressed data ended before the stream was complete
    #[error("truncated compressed data: {source}")]
    Truncated { source: io::Error },

    #[error("decompression error: {source}")]
    Other { source: BoxError },
}

impl DecompressError {
    pub fn corrupt<E: Into<io::Error>>(e: E) -> Self {
        Self::Corrupt { source: e.into() }
    }

    pub fn truncated<E: Into<io::Error>>(e: E) -> Self {
        Self::Truncated { source: e.into() }
    }

    pub fn other<E: Into<BoxError>>(e: E) -> Self {
        Self::Other { source: e.into() }
    }
}
