use crate::charset::native::{NATIVE_CHARSETS, native_encoder};
use crate::charset::{BufferEncoder, EncodingVariations};
use crate::config::{EncodingPolicy, ResolvedParser};
use crate::error::ConfigError;
use std::collections::HashMap;
use tracing::debug;

/// Index of a decoder inside a [`CharsetRegistry`].
///
/// Every alias of an equivalence group resolves to the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderHandle(usize);

/// Charset decoders by name.
///
/// Decoders live in an arena, names map to handles into it. The registry is built once from
/// the resolved parser list and is read-only afterwards.
#[derive(Debug)]
pub struct CharsetRegistry {
    decoders: Vec<BufferEncoder>,
    index: HashMap<String, DecoderHandle>,
    names: Vec<String>,
    available: Vec<String>,
}

impl CharsetRegistry {
    /// Registers the built-in decoders not replaced by user encoders, then the user encoders.
    ///
    /// Fails when an alias is declared by two user encoders, or when a parser references a
    /// charset nothing decodes.
    pub fn build(
        parsers: &[ResolvedParser],
        variations: &EncodingVariations,
        encoders: Vec<BufferEncoder>,
    ) -> Result<Self, ConfigError> {
        let mut registry =
            Self { decoders: Vec::new(), index: HashMap::new(), names: Vec::new(), available: Vec::new() };

        for name in NATIVE_CHARSETS {
            let suppressed = variations.suppressed().iter().any(|suppressed| suppressed == *name);
            if suppressed || registry.index.contains_key(*name) {
                continue;
            }
            let aliases = match variations.group(name) {
                Some(group) => group.to_vec(),
                None => vec![(*name).to_string()],
            };
            if let Some(encoder) = native_encoder(name, &aliases) {
                registry.insert(encoder);
            }
        }

        let mut duplicates: Vec<String> = Vec::new();
        let natives = registry.names.len();
        for encoder in encoders {
            for alias in encoder.aliases() {
                let taken = registry.names[natives..].contains(alias);
                if taken && !duplicates.contains(alias) {
                    duplicates.push(alias.clone());
                }
            }
            registry.insert(encoder);
        }
        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateEncoding { aliases: duplicates });
        }

        let mut referenced: Vec<String> = Vec::new();
        for parser in parsers {
            let names = match &parser.encodings {
                Some(EncodingPolicy::Only(names)) => names.clone(),
                _ => Vec::new(),
            };
            let defaults = parser.default_encoding.iter().flat_map(|default| variations.normalize([default]));
            for name in names.into_iter().chain(defaults) {
                if !referenced.contains(&name) {
                    referenced.push(name);
                }
            }
        }

        let missing: Vec<String> =
            referenced.iter().filter(|name| !registry.index.contains_key(name.as_str())).cloned().collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEncodings { names: missing });
        }

        let allow_all = parsers.iter().any(|parser| matches!(parser.encodings, Some(EncodingPolicy::All)));
        registry.available = if allow_all { registry.names.clone() } else { referenced };

        debug!(
            available = ?registry.available,
            decoders = registry.decoders.len(),
            "charset registry built"
        );
        Ok(registry)
    }

    fn insert(&mut self, encoder: BufferEncoder) {
        let handle = DecoderHandle(self.decoders.len());
        for alias in encoder.aliases() {
            if self.index.insert(alias.clone(), handle).is_none() {
                self.names.push(alias.clone());
            }
        }
        self.decoders.push(encoder);
    }

    pub fn handle(&self, name: &str) -> Option<DecoderHandle> {
        self.index.get(name).copied()
    }

    pub fn encoder(&self, handle: DecoderHandle) -> &BufferEncoder {
        &self.decoders[handle.0]
    }

    /// The decoder registered under `name`, case-insensitive.
    pub fn decoder(&self, name: &str) -> Option<&BufferEncoder> {
        self.handle(&name.to_ascii_lowercase()).map(|handle| self.encoder(handle))
    }

    /// Charset names requests may use.
    ///
    /// When some parser configuration accepts every charset, this is every registered name,
    /// natives and custom decoders alike. Otherwise it is only the names that configurations
    /// reference, through their encodings or default encoding, with their aliases.
    pub fn available_names(&self) -> &[String] {
        &self.available
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.available.iter().any(|available| available == name)
    }
}
