//! Body size limits.
//!
//! Limits are given either as a byte count, as a byte-notation string such as `"20kb"` or
//! `"1.5MB"`, or as [`Limit::Unbounded`]. Units are base 1024 and case-insensitive.

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub enum Limit {
    Bytes(u64),
    Text(String),
    Unbounded,
}

impl Limit {
    /// Resolves the limit into a byte count, `None` meaning no limit.
    pub fn resolve(&self) -> Result<Option<u64>, ConfigError> {
        match self {
            Limit::Bytes(bytes) => Ok(Some(*bytes)),
            Limit::Unbounded => Ok(None),
            Limit::Text(text) => parse_bytes(text)
                .map(Some)
                .ok_or_else(|| ConfigError::InvalidLimit { limit: text.clone() }),
        }
    }
}

impl Default for Limit {
    fn default() -> Self {
        Limit::Text("20kb".to_string())
    }
}

impl From<u64> for Limit {
    fn from(bytes: u64) -> Self {
        Limit::Bytes(bytes)
    }
}

impl From<&str> for Limit {
    fn from(text: &str) -> Self {
        Limit::Text(text.to_string())
    }
}

impl From<String> for Limit {
    fn from(text: String) -> Self {
        Limit::Text(text)
    }
}

/// Parses byte notation like `"1kb"`, `"20 MB"` or `"100"` into a byte count.
pub fn parse_bytes(text: &str) -> Option<u64> {
    let text = text.trim().to_ascii_lowercase();
    let split = text.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(text.len());
    let (number, unit) = text.split_at(split);

    let number: f64 = number.parse().ok()?;
    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1 << 10,
        "mb" => 1 << 20,
        "gb" => 1 << 30,
        "tb" => 1 << 40,
        "pb" => 1 << 50,
        _ => return None,
    };

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "byte notation is floored"
    )]
    let bytes = (number * multiplier as f64).floor() as u64;
    Some(bytes)
}
