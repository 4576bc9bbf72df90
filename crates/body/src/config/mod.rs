//! Parser configuration.
//!
//! Users describe which bodies they accept with [`ParserConfig`]s, or by naming one of the
//! [`DefaultMediaType`]s. At build time [`join_parsers`] merges these declarations with the
//! [`GlobalOptions`] and the built-in defaults into a list of [`ResolvedParser`]s, which is
//! read-only from then on.
//!
//! Overridable fields are tri-state, see [`Setting`]: left unset they inherit the default,
//! explicitly removed they drop it, and set they replace it.

use crate::error::HookError;
use crate::limit::Limit;
use crate::media_type::{MediaType, MediaTypeMatcher};
use crate::value::BodyValue;
use http::request::Parts;
use std::fmt;
use std::sync::Arc;

mod defaults;
mod join;

pub use defaults::DefaultMediaType;
pub use join::join_parsers;

pub type ParserFn = Arc<dyn Fn(&BodyValue) -> Result<BodyValue, HookError> + Send + Sync>;
pub type VerifyFn = Arc<dyn Fn(&VerifyContext<'_>) -> Result<(), HookError> + Send + Sync>;

/// What a verify hook gets to see of a request.
#[derive(Debug)]
pub struct VerifyContext<'a> {
    pub request: &'a Parts,
    /// the body bytes after decompression, before charset decoding
    pub raw: &'a [u8],
    pub body: &'a BodyValue,
    pub encoding: Option<&'a str>,
}

/// A tri-state configuration field.
#[derive(Clone, Default)]
pub enum Setting<T> {
    /// use whatever the default provides
    #[default]
    Inherit,
    /// drop the default
    Remove,
    Set(T),
}

impl<T> Setting<T> {
    pub fn resolve(self, inherited: Option<T>) -> Option<T> {
        match self {
            Setting::Inherit => inherited,
            Setting::Remove => None,
            Setting::Set(value) => Some(value),
        }
    }

    pub fn is_inherit(&self) -> bool {
        matches!(self, Setting::Inherit)
    }
}

impl<T> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Inherit => f.write_str("Inherit"),
            Setting::Remove => f.write_str("Remove"),
            Setting::Set(_) => f.write_str("Set(..)"),
        }
    }
}

/// Which content encodings a configuration accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inflate {
    /// every available decompressor, `identity` included
    All,
    Only(Vec<String>),
}

impl Default for Inflate {
    fn default() -> Self {
        Inflate::Only(vec!["identity".to_string()])
    }
}

impl From<bool> for Inflate {
    fn from(all: bool) -> Self {
        if all { Inflate::All } else { Inflate::default() }
    }
}

impl From<&str> for Inflate {
    fn from(name: &str) -> Self {
        Inflate::Only(vec![name.to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for Inflate {
    fn from(names: [&str; N]) -> Self {
        Inflate::Only(names.iter().map(|name| (*name).to_string()).collect())
    }
}

impl From<Vec<String>> for Inflate {
    fn from(names: Vec<String>) -> Self {
        Inflate::Only(names)
    }
}

/// Which charsets a configuration accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encodings {
    All,
    Only(Vec<String>),
}

impl<const N: usize> From<[&str; N]> for Encodings {
    fn from(names: [&str; N]) -> Self {
        Encodings::Only(names.iter().map(|name| (*name).to_string()).collect())
    }
}

impl From<Vec<String>> for Encodings {
    fn from(names: Vec<String>) -> Self {
        Encodings::Only(names)
    }
}

/// How a matcher is declared by the user, parsed at build time.
#[derive(Clone)]
pub enum Matcher {
    Type(String),
    Predicate(MediaTypeMatcher),
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Type(identifier) => f.debug_tuple("Type").field(identifier).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// A user declared parser configuration.
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    pub(crate) matcher: Vec<Matcher>,
    pub(crate) limit: Option<Limit>,
    pub(crate) inflate: Option<Inflate>,
    pub(crate) require_content_length: Option<bool>,
    pub(crate) parser: Setting<ParserFn>,
    pub(crate) encodings: Setting<Encodings>,
    pub(crate) default_encoding: Setting<String>,
    pub(crate) empty_response: Setting<BodyValue>,
    pub(crate) verify: Setting<VerifyFn>,
}

impl ParserConfig {
    /// A configuration matching the `type/subtype` identifier, wildcards allowed.
    pub fn for_type<S: Into<String>>(identifier: S) -> Self {
        Self { matcher: vec![Matcher::Type(identifier.into())], ..Self::default() }
    }

    /// A configuration matching with a predicate over the request media type.
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&MediaType) -> bool + Send + Sync + 'static,
    {
        Self { matcher: vec![Matcher::Predicate(MediaTypeMatcher::predicate(predicate))], ..Self::default() }
    }

    pub fn or_type<S: Into<String>>(mut self, identifier: S) -> Self {
        self.matcher.push(Matcher::Type(identifier.into()));
        self
    }

    pub fn or_matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&MediaType) -> bool + Send + Sync + 'static,
    {
        self.matcher.push(Matcher::Predicate(MediaTypeMatcher::predicate(predicate)));
        self
    }

    pub fn limit<L: Into<Limit>>(mut self, limit: L) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn inflate<I: Into<Inflate>>(mut self, inflate: I) -> Self {
        self.inflate = Some(inflate.into());
        self
    }

    pub fn require_content_length(mut self, required: bool) -> Self {
        self.require_content_length = Some(required);
        self
    }

    pub fn parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&BodyValue) -> Result<BodyValue, HookError> + Send + Sync + 'static,
    {
        self.parser = Setting::Set(Arc::new(parser));
        self
    }

    /// Drops the default parser, the decoded body is passed through unparsed.
    pub fn without_parser(mut self) -> Self {
        self.parser = Setting::Remove;
        self
    }

    pub fn encodings<E: Into<Encodings>>(mut self, encodings: E) -> Self {
        self.encodings = Setting::Set(encodings.into());
        self
    }

    /// Accepts every available charset.
    pub fn all_encodings(mut self) -> Self {
        self.encodings = Setting::Set(Encodings::All);
        self
    }

    /// Disables charset decoding, the body stays raw bytes.
    pub fn without_encodings(mut self) -> Self {
        self.encodings = Setting::Remove;
        self
    }

    pub fn default_encoding<S: Into<String>>(mut self, encoding: S) -> Self {
        self.default_encoding = Setting::Set(encoding.into());
        self
    }

    pub fn without_default_encoding(mut self) -> Self {
        self.default_encoding = Setting::Remove;
        self
    }

    pub fn empty_response<V: Into<BodyValue>>(mut self, value: V) -> Self {
        self.empty_response = Setting::Set(value.into());
        self
    }

    pub fn without_empty_response(mut self) -> Self {
        self.empty_response = Setting::Remove;
        self
    }

    pub fn verify<F>(mut self, verify: F) -> Self
    where
        F: Fn(&VerifyContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.verify = Setting::Set(Arc::new(verify));
        self
    }

    /// The default media type this configuration overlays, if its only matcher names one.
    pub(crate) fn default_media_type(&self) -> Option<DefaultMediaType> {
        match self.matcher.as_slice() {
            [Matcher::Type(identifier)] => identifier.parse().ok(),
            _ => None,
        }
    }
}

/// One entry of the parser list, either a default media type or a full configuration.
#[derive(Debug, Clone)]
pub enum ParserEntry {
    Default(DefaultMediaType),
    Config(ParserConfig),
}

impl From<DefaultMediaType> for ParserEntry {
    fn from(default: DefaultMediaType) -> Self {
        ParserEntry::Default(default)
    }
}

impl From<ParserConfig> for ParserEntry {
    fn from(config: ParserConfig) -> Self {
        ParserEntry::Config(config)
    }
}

/// Options shared by every parser configuration.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub limit: Limit,
    pub inflate: Inflate,
    pub require_content_length: bool,
    /// used when a request comes without `Content-Type`
    pub default_content_type: Option<String>,
    /// the parameter ceiling of the URL-encoded parser
    pub parameter_limit: usize,
    /// whether the JSON parser only accepts objects and arrays
    pub strict: bool,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            limit: Limit::default(),
            inflate: Inflate::default(),
            require_content_length: false,
            default_content_type: None,
            parameter_limit: 1000,
            strict: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InflatePolicy {
    All,
    Only(Vec<String>),
}

impl InflatePolicy {
    pub fn names(&self) -> &[String] {
        match self {
            InflatePolicy::All => &[],
            InflatePolicy::Only(names) => names,
        }
    }
}

/// Charset policy of a resolved configuration, an `Only` list is closed over aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingPolicy {
    All,
    Only(Vec<String>),
}

/// A fully resolved parser configuration.
#[derive(Clone)]
pub struct ResolvedParser {
    pub(crate) matcher: Vec<MediaTypeMatcher>,
    pub(crate) inflate: InflatePolicy,
    pub(crate) limit: Option<u64>,
    pub(crate) require_content_length: bool,
    pub(crate) parser: Option<ParserFn>,
    pub(crate) encodings: Option<EncodingPolicy>,
    pub(crate) default_encoding: Option<String>,
    pub(crate) empty_response: Option<BodyValue>,
    pub(crate) verify: Option<VerifyFn>,
}

impl ResolvedParser {
    pub fn matcher(&self) -> &[MediaTypeMatcher] {
        &self.matcher
    }

    pub fn inflate(&self) -> &InflatePolicy {
        &self.inflate
    }

    /// The size limit in bytes, `None` when unbounded.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn require_content_length(&self) -> bool {
        self.require_content_length
    }

    pub fn has_parser(&self) -> bool {
        self.parser.is_some()
    }

    pub fn encodings(&self) -> Option<&EncodingPolicy> {
        self.encodings.as_ref()
    }

    pub fn default_encoding(&self) -> Option<&str> {
        self.default_encoding.as_deref()
    }

    pub fn empty_response(&self) -> Option<&BodyValue> {
        self.empty_response.as_ref()
    }

    pub fn has_verify(&self) -> bool {
        self.verify.is_some()
    }

    pub fn matches(&self, media_type: &MediaType) -> bool {
        crate::media_type::match_any(&self.matcher, media_type)
    }

    pub(crate) fn accepts_content_encoding(&self, content_encoding: &str, available: &[String]) -> bool {
        match &self.inflate {
            InflatePolicy::All => available.iter().any(|name| name == content_encoding),
            InflatePolicy::Only(names) => names.iter().any(|name| name == content_encoding),
        }
    }
}

impl fmt::Debug for ResolvedParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedParser")
            .field("matcher", &self.matcher)
            .field("inflate", &self.inflate)
            .field("limit", &self.limit)
            .field("require_content_length", &self.require_content_length)
            .field("parser", &self.parser.is_some())
            .field("encodings", &self.encodings)
            .field("default_encoding", &self.default_encoding)
            .field("empty_response", &self.empty_response)
            .field("verify", &self.verify.is_some())
            .finish()
    }
}
