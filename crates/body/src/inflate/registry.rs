use crate::config::{InflatePolicy, ResolvedParser};
use crate::error::{ConfigError, DecompressError};
use crate::inflate::decoder::Decoder;
use crate::inflate::{Decompress, DecompressorFactory};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const IDENTITY: &str = "identity";

/// Decompressors by content-encoding name.
///
/// Unless a parser configuration accepts every encoding, only the decompressors some
/// configuration names are kept. `identity` is listed when a configuration accepts every
/// encoding or names it.
pub struct DecompressorRegistry {
    factories: Vec<(String, DecompressorFactory)>,
    available: Vec<String>,
}

impl DecompressorRegistry {
    pub fn build(
        parsers: &[ResolvedParser],
        custom: Vec<(String, DecompressorFactory)>,
    ) -> Result<Self, ConfigError> {
        let mut factories: Vec<(String, DecompressorFactory)> = vec![
            (String::from("deflate"), builtin(Decoder::deflate)),
            (String::from("gzip"), builtin(Decoder::gzip)),
            (String::from("br"), builtin(Decoder::br)),
        ];
        for (name, factory) in custom {
            let name = name.trim().to_ascii_lowercase();
            match factories.iter_mut().find(|(existing, _)| *existing == name) {
                Some(entry) => entry.1 = factory,
                None => factories.push((name, factory)),
            }
        }

        let allow_all = parsers.iter().any(|parser| parser.inflate == InflatePolicy::All);
        let mut referenced: Vec<&str> = Vec::new();
        for name in parsers.iter().flat_map(|parser| parser.inflate.names()) {
            if !referenced.contains(&name.as_str()) {
                referenced.push(name);
            }
        }

        if !allow_all {
            factories.retain(|(name, _)| referenced.contains(&name.as_str()));
        }

        let mut available: Vec<String> = factories.iter().map(|(name, _)| name.clone()).collect();
        if (allow_all || referenced.contains(&IDENTITY)) && !available.iter().any(|name| name == IDENTITY) {
            available.push(IDENTITY.to_string());
        }

        let missing: Vec<String> = referenced
            .iter()
            .filter(|name| !available.iter().any(|available| available == **name))
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingDecompressors { names: missing });
        }

        debug!(?available, "decompressor registry built");
        Ok(Self { factories, available })
    }

    pub fn available_names(&self) -> &[String] {
        &self.available
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.available.iter().any(|available| available == name)
    }

    /// Creates a fresh decompressor for `name`, `None` if nothing is registered under it.
    ///
    /// `identity` has no decompressor, callers pass such bodies through unchanged.
    pub fn open(&self, name: &str) -> Option<Result<Box<dyn Decompress>, DecompressError>> {
        self.factories.iter().find(|(registered, _)| registered == name).map(|(_, factory)| factory())
    }
}

impl fmt::Debug for DecompressorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecompressorRegistry").field("available", &self.available).finish()
    }
}

fn builtin(create: fn() -> Decoder) -> DecompressorFactory {
    Arc::new(move || Ok(Box::new(create()) as Box<dyn Decompress>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalOptions, Inflate, ParserConfig, ParserEntry, join_parsers};
    use crate::charset::EncodingVariations;

    fn parsers(entries: Vec<ParserEntry>, inflate: Inflate) -> Vec<ResolvedParser> {
        let options = GlobalOptions { inflate, ..GlobalOptions::default() };
        join_parsers(entries, &options, &EncodingVariations::default()).unwrap()
    }

    #[test]
    fn test_default_is_identity_only() {
        let registry = DecompressorRegistry::build(&parsers(vec![], Inflate::default()), vec![]).unwrap();
        assert_eq!(registry.available_names(), &["identity"]);
        assert!(registry.open("gzip").is_none());
    }

    #[test]
    fn test_inflate_all() {
        let registry = DecompressorRegistry::build(&parsers(vec![], Inflate::All), vec![]).unwrap();
        assert_eq!(registry.available_names(), &["deflate", "gzip", "br", "identity"]);
        assert!(registry.open("br").unwrap().is_ok());
        assert!(registry.open("identity").is_none());
    }

    #[test]
    fn test_unreferenced_builtins_are_pruned() {
        let entries = vec![ParserConfig::for_type("application/json").inflate(["gzip"]).into()];
        let registry = DecompressorRegistry::build(&parsers(entries, Inflate::default()), vec![]).unwrap();
        assert_eq!(registry.available_names(), &["gzip"]);
        assert!(!registry.is_available("identity"));
        assert!(!registry.is_available("deflate"));
    }

    #[test]
    fn test_missing_decompressor() {
        let entries = vec![ParserConfig::for_type("text/plain").inflate(["gzip", "zstd", "lz4"]).into()];
        match DecompressorRegistry::build(&parsers(entries, Inflate::default()), vec![]) {
            Err(ConfigError::MissingDecompressors { names }) => assert_eq!(names, vec!["zstd", "lz4"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_custom_decompressor() {
        let entries = vec![ParserConfig::for_type("text/plain").inflate(["x-gzip", "identity"]).into()];
        let custom: Vec<(String, DecompressorFactory)> = vec![("X-GZIP".to_string(), builtin(Decoder::gzip))];
        let registry = DecompressorRegistry::build(&parsers(entries, Inflate::default()), custom).unwrap();
        assert_eq!(registry.available_names(), &["x-gzip", "identity"]);
        assert!(registry.open("x-gzip").unwrap().is_ok());
    }
}
