//! Media type matching.
//!
//! A parser configuration declares which media types it accepts with a list of
//! [`MediaTypeMatcher`]s. A matcher is either a template such as `application/*`, parsed
//! once when the configuration is built, or an arbitrary predicate.

use crate::error::ConfigError;
use std::fmt;
use std::sync::Arc;

/// A concrete `type/subtype` pair taken from a request's `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    type_: String,
    subtype: String,
}

impl MediaType {
    pub fn new<T: AsRef<str>, S: AsRef<str>>(type_: T, subtype: S) -> Self {
        Self { type_: type_.as_ref().to_ascii_lowercase(), subtype: subtype.as_ref().to_ascii_lowercase() }
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }
}

impl From<&mime::Mime> for MediaType {
    fn from(mime: &mime::Mime) -> Self {
        // keep structured syntax suffixes, `application/vnd.api+json` stays one subtype
        let subtype = match mime.suffix() {
            Some(suffix) => format!("{}+{}", mime.subtype(), suffix),
            None => mime.subtype().to_string(),
        };
        MediaType::new(mime.type_().as_str(), subtype)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Any,
    Exact(String),
}

impl Segment {
    fn parse(segment: &str) -> Option<Self> {
        match segment.trim() {
            "" => None,
            "*" => Some(Segment::Any),
            s => Some(Segment::Exact(s.to_ascii_lowercase())),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Segment::Any => true,
            Segment::Exact(expected) => expected == value,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Any => f.write_str("*"),
            Segment::Exact(s) => f.write_str(s),
        }
    }
}

/// A `type/subtype` template where either side may be the `*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTypeTemplate {
    type_: Segment,
    subtype: Segment,
}

impl MediaTypeTemplate {
    /// Parses an identifier such as `application/json` or `text/*`.
    pub fn parse(identifier: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidMediaType { identifier: identifier.to_string() };

        let mut parts = identifier.split('/');
        let (Some(type_), Some(subtype), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let type_ = Segment::parse(type_).ok_or_else(invalid)?;
        let subtype = Segment::parse(subtype).ok_or_else(invalid)?;
        Ok(Self { type_, subtype })
    }

    pub fn matches(&self, media_type: &MediaType) -> bool {
        self.type_.matches(media_type.type_()) && self.subtype.matches(media_type.subtype())
    }
}

impl fmt::Display for MediaTypeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

pub type MediaTypePredicate = Arc<dyn Fn(&MediaType) -> bool + Send + Sync>;

/// Decides whether a configuration accepts a media type.
#[derive(Clone)]
pub enum MediaTypeMatcher {
    Template(MediaTypeTemplate),
    Predicate(MediaTypePredicate),
}

impl MediaTypeMatcher {
    pub fn parse(identifier: &str) -> Result<Self, ConfigError> {
        MediaTypeTemplate::parse(identifier).map(MediaTypeMatcher::Template)
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&MediaType) -> bool + Send + Sync + 'static,
    {
        MediaTypeMatcher::Predicate(Arc::new(f))
    }

    /// A panicking predicate is not caught here, it unwinds into the caller.
    pub fn matches(&self, media_type: &MediaType) -> bool {
        match self {
            MediaTypeMatcher::Template(template) => template.matches(media_type),
            MediaTypeMatcher::Predicate(predicate) => predicate(media_type),
        }
    }
}

impl fmt::Debug for MediaTypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaTypeMatcher::Template(template) => f.debug_tuple("Template").field(&template.to_string()).finish(),
            MediaTypeMatcher::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// Returns true if any of the matchers accepts the media type.
pub fn match_any(matchers: &[MediaTypeMatcher], media_type: &MediaType) -> bool {
    matchers.iter().any(|matcher| matcher.matches(media_type))
}
