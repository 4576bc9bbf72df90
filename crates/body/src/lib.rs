//! Request body parsing for micro web servers
//!
//! This crate reads an HTTP request body and turns it into a [`BodyValue`]. A single
//! [`BodyParser`] holds a list of parser configurations: the request media type selects the
//! configuration, which decides the size limit, the accepted content encodings and charsets,
//! and how the decoded text is parsed.
//!
//! # Features
//!
//! - JSON, URL-encoded, plain text and raw bytes out of the box
//! - gzip, deflate and brotli decompression, custom decompressors by name
//! - streaming charset decoding, custom charset decoders with alias names
//! - size limits enforced on the decompressed body while it is read
//! - parser and verify hooks per media type
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use http::Request;
//! use http_body_util::Full;
//! use micro_body::BodyValue;
//!
//! # async fn parse_user() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = micro_body::json().limit("100kb").build()?;
//!
//! let request = Request::post("/users")
//!     .header("content-type", "application/json")
//!     .header("content-length", "15")
//!     .body(Full::new(Bytes::from_static(br#"{"user":"tobi"}"#)))?;
//!
//! let request = parser.apply(request).await?;
//! assert!(matches!(request.body(), Some(BodyValue::Structured(_))));
//! # Ok(())
//! # }
//! ```

mod engine;
mod limit;
mod media_type;
mod parser;
mod value;

pub mod charset;
pub mod config;
pub mod error;
pub mod inflate;

pub use config::{DefaultMediaType, ParserConfig, VerifyContext};
pub use engine::{Completion, DecodeEngine};
pub use error::{BodyError, ConfigError, DecompressError, HookError};
pub use limit::Limit;
pub use media_type::{MediaType, MediaTypeMatcher};
pub use parser::{BodyParser, BodyParserBuilder, Dispatch};
pub use value::BodyValue;

/// A parser accepting `application/json` only.
pub fn json() -> BodyParserBuilder {
    BodyParser::builder().parser(DefaultMediaType::Json)
}

/// A parser accepting `application/x-www-form-urlencoded` only.
pub fn urlencoded() -> BodyParserBuilder {
    BodyParser::builder().parser(DefaultMediaType::UrlEncoded)
}

/// A parser accepting `text/plain` only.
pub fn text() -> BodyParserBuilder {
    BodyParser::builder().parser(DefaultMediaType::Text)
}

/// A parser accepting `application/octet-stream` only.
pub fn raw() -> BodyParserBuilder {
    BodyParser::builder().parser(DefaultMediaType::OctetStream)
}
