use crate::config::{GlobalOptions, ParserFn};
use crate::error::HookError;
use crate::value::BodyValue;
use bytes::Bytes;
use http::StatusCode;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The media types with baked-in parsing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultMediaType {
    /// `application/x-www-form-urlencoded`, parsed into an object
    UrlEncoded,
    /// `application/json`, parsed into a JSON value
    Json,
    /// `text/plain`, decoded but not parsed
    Text,
    /// `application/octet-stream`, kept as raw bytes
    OctetStream,
}

impl DefaultMediaType {
    /// Every default, in the order they are registered when nothing is configured.
    pub const ALL: [DefaultMediaType; 4] =
        [DefaultMediaType::UrlEncoded, DefaultMediaType::Json, DefaultMediaType::Text, DefaultMediaType::OctetStream];

    pub fn identifier(self) -> &'static str {
        match self {
            DefaultMediaType::UrlEncoded => "application/x-www-form-urlencoded",
            DefaultMediaType::Json => "application/json",
            DefaultMediaType::Text => "text/plain",
            DefaultMediaType::OctetStream => "application/octet-stream",
        }
    }

    pub(crate) fn profile(self, options: &GlobalOptions) -> DefaultProfile {
        let utf8 = Some("utf-8".to_string());
        match self {
            DefaultMediaType::UrlEncoded => DefaultProfile {
                parser: Some(urlencoded_parser(options.parameter_limit)),
                default_encoding: utf8,
                empty_response: Some(BodyValue::empty_object()),
            },
            DefaultMediaType::Json => DefaultProfile {
                parser: Some(json_parser(options.strict)),
                default_encoding: utf8,
                empty_response: Some(BodyValue::empty_object()),
            },
            DefaultMediaType::Text => DefaultProfile {
                parser: None,
                default_encoding: utf8,
                empty_response: Some(BodyValue::Text(String::new())),
            },
            DefaultMediaType::OctetStream => DefaultProfile {
                parser: None,
                default_encoding: None,
                empty_response: Some(BodyValue::Bytes(Bytes::new())),
            },
        }
    }
}

impl FromStr for DefaultMediaType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DefaultMediaType::ALL.into_iter().find(|default| default.identifier().eq_ignore_ascii_case(s)).ok_or(())
    }
}

impl fmt::Display for DefaultMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// What a default media type contributes to a configuration overlaying it.
pub(crate) struct DefaultProfile {
    pub(crate) parser: Option<ParserFn>,
    pub(crate) default_encoding: Option<String>,
    pub(crate) empty_response: Option<BodyValue>,
}

fn body_text(value: &BodyValue) -> Result<&str, HookError> {
    match value {
        BodyValue::Text(text) => Ok(text.as_str()),
        BodyValue::Bytes(bytes) => std::str::from_utf8(bytes).map_err(HookError::new),
        BodyValue::Structured(_) => Err(HookError::new("body is already parsed")),
    }
}

pub(crate) fn json_parser(strict: bool) -> ParserFn {
    Arc::new(move |value: &BodyValue| {
        let text = body_text(value)?;

        if strict {
            let first = text.char_indices().find(|(_, c)| !matches!(c, ' ' | '\t' | '\n' | '\r'));
            match first {
                Some((_, '{' | '[')) => {}
                Some((position, token)) => {
                    return Err(HookError::new(format!("Unexpected token {token} in JSON at position {position}")));
                }
                None => return Err(HookError::new("Unexpected end of JSON input")),
            }
        }

        let parsed: Value = serde_json::from_str(text).map_err(HookError::new)?;
        if let Value::Object(map) = &parsed {
            if map.contains_key("__proto__") {
                return Err(HookError::new("`__proto__` key not allowed"));
            }
        }
        Ok(BodyValue::Structured(parsed))
    })
}

pub(crate) fn urlencoded_parser(parameter_limit: usize) -> ParserFn {
    Arc::new(move |value: &BodyValue| {
        let text = body_text(value)?;

        let count = text.split('&').filter(|pair| !pair.is_empty()).count();
        if count > parameter_limit {
            return Err(HookError::new("too many parameters")
                .with_status(StatusCode::PAYLOAD_TOO_LARGE)
                .with_type("parameters.too.many"));
        }

        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(text).map_err(HookError::new)?;
        let mut map = Map::new();
        for (key, value) in pairs {
            match map.get_mut(&key) {
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
                None => {
                    map.insert(key, Value::String(value));
                }
            }
        }
        Ok(BodyValue::Structured(Value::Object(map)))
    })
}
