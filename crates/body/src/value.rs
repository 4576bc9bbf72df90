use bytes::Bytes;
use serde::de::DeserializeOwned;

/// A decoded or parsed request body.
///
/// Charset decoding yields [`BodyValue::Text`], bodies without a charset stay
/// [`BodyValue::Bytes`], and the built-in JSON and URL-encoded parsers produce
/// [`BodyValue::Structured`].
#[derive(Debug, Clone, PartialEq)]
pub enum BodyValue {
    Structured(serde_json::Value),
    Text(String),
    Bytes(Bytes),
}

impl BodyValue {
    /// An empty JSON object, the empty value of the JSON and URL-encoded parsers.
    pub fn empty_object() -> Self {
        BodyValue::Structured(serde_json::Value::Object(serde_json::Map::new()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BodyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            BodyValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            BodyValue::Structured(value) => Some(value),
            _ => None,
        }
    }

    /// Converts a structured body into a typed value.
    ///
    /// Text bodies are read as JSON documents.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            BodyValue::Structured(value) => T::deserialize(value),
            BodyValue::Text(text) => serde_json::from_str(text),
            BodyValue::Bytes(bytes) => serde_json::from_slice(bytes),
        }
    }

    /// Renders the value for error details.
    pub fn to_detail_string(&self) -> String {
        match self {
            BodyValue::Structured(value) => value.to_string(),
            BodyValue::Text(text) => text.clone(),
            BodyValue::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl From<serde_json::Value> for BodyValue {
    fn from(value: serde_json::Value) -> Self {
        BodyValue::Structured(value)
    }
}

impl From<String> for BodyValue {
    fn from(text: String) -> Self {
        BodyValue::Text(text)
    }
}

impl From<&str> for BodyValue {
    fn from(text: &str) -> Self {
        BodyValue::Text(text.to_string())
    }
}

impl From<Bytes> for BodyValue {
    fn from(bytes: Bytes) -> Self {
        BodyValue::Bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, Debug, PartialEq)]
    struct User {
        user: String,
    }

    #[test]
    fn test_deserialize() {
        let value = BodyValue::from(json!({"user": "tobi"}));
        assert_eq!(value.deserialize::<User>().unwrap(), User { user: "tobi".to_string() });

        let value = BodyValue::from(r#"{"user":"loki"}"#);
        assert_eq!(value.deserialize::<User>().unwrap(), User { user: "loki".to_string() });
    }

    #[test]
    fn test_detail_string() {
        assert_eq!(BodyValue::from(json!({"a": 1})).to_detail_string(), r#"{"a":1}"#);
        assert_eq!(BodyValue::Bytes(Bytes::from_static(b"raw")).to_detail_string(), "raw");
        assert_eq!(BodyValue::empty_object().to_detail_string(), "{}");
    }
}
