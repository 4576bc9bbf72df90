use crate::charset::BufferEncoder;
use crate::charset::native::{NATIVE_CHARSETS, NATIVE_VARIATIONS};
use crate::error::ConfigError;
use std::collections::HashMap;

/// Symmetric alias table for charset names.
///
/// Every alias belongs to at most one group, and every alias of a group maps to the same
/// group. Names that are in no group are their own single alias.
#[derive(Debug, Clone, Default)]
pub struct EncodingVariations {
    groups: Vec<Vec<String>>,
    index: HashMap<String, usize>,
    suppressed: Vec<String>,
}

impl EncodingVariations {
    /// Builds the alias table from the built-in groups and the user supplied encoders.
    ///
    /// User aliases take the names they declare away from the built-in groups, so that
    /// `utf8` declared by a user encoder no longer means the built-in `utf-8`. A name declared
    /// by two user encoders is an error.
    pub fn resolve(encoders: &[BufferEncoder]) -> Result<Self, ConfigError> {
        let mut declared: Vec<&str> = Vec::new();
        let mut duplicates: Vec<String> = Vec::new();
        for alias in encoders.iter().flat_map(|encoder| encoder.aliases()) {
            if declared.contains(&alias.as_str()) {
                if !duplicates.contains(alias) {
                    duplicates.push(alias.clone());
                }
            } else {
                declared.push(alias.as_str());
            }
        }
        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateEncoding { aliases: duplicates });
        }

        let mut groups: Vec<Vec<String>> = NATIVE_VARIATIONS
            .iter()
            .map(|group| {
                group
                    .iter()
                    .filter(|name| !declared.contains(*name))
                    .map(|name| (*name).to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|group| group.len() >= 2)
            .collect();

        groups.extend(
            encoders
                .iter()
                .filter(|encoder| encoder.aliases().len() >= 2)
                .map(|encoder| encoder.aliases().to_vec()),
        );

        let mut index = HashMap::new();
        for (i, group) in groups.iter().enumerate() {
            for alias in group {
                index.insert(alias.clone(), i);
            }
        }

        let suppressed =
            NATIVE_CHARSETS.iter().filter(|name| declared.contains(*name)).map(|name| (*name).to_string()).collect();

        Ok(Self { groups, index, suppressed })
    }

    /// The alias group of `name`, `None` if the name has no aliases.
    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.index.get(name).map(|&i| self.groups[i].as_slice())
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Built-in charset names replaced by user encoders.
    pub fn suppressed(&self) -> &[String] {
        &self.suppressed
    }

    /// Lower-cases the names and expands each into its full alias group.
    ///
    /// The result keeps first-seen order and has no duplicates.
    pub fn normalize<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim().to_ascii_lowercase();
            let expanded = match self.group(&name) {
                Some(group) => group.to_vec(),
                None => vec![name],
            };
            for alias in expanded {
                if !normalized.contains(&alias) {
                    normalized.push(alias);
                }
            }
        }
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::native::Latin1Decoder;

    fn whole(aliases: &[&str]) -> BufferEncoder {
        BufferEncoder::whole(aliases.iter(), |bytes| Ok(String::from_utf8_lossy(bytes).into_owned()))
    }

    #[test]
    fn test_builtin_groups() {
        let variations = EncodingVariations::resolve(&[]).unwrap();
        assert_eq!(variations.group("utf8").unwrap(), &["utf8", "utf-8"]);
        assert_eq!(variations.group("ucs-2").unwrap(), &["ucs2", "ucs-2"]);
        assert!(variations.group("latin1").is_none());
        assert!(variations.suppressed().is_empty());
    }

    #[test]
    fn test_normalize() {
        let variations = EncodingVariations::resolve(&[]).unwrap();
        assert_eq!(variations.normalize(["UTF-8", "latin1", "utf8"]), vec!["utf8", "utf-8", "latin1"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let encoders = [whole(&["x-custom", "x-custom-alias"])];
        let variations = EncodingVariations::resolve(&encoders).unwrap();
        for names in [vec!["utf-8"], vec!["x-custom-alias", "ucs2", "hex"], vec![]] {
            let once = variations.normalize(names);
            assert_eq!(variations.normalize(&once), once);
        }
    }

    #[test]
    fn test_user_alias_shrinks_builtin_group() {
        let encoders = [BufferEncoder::streaming(["utf8", "my-utf8"], || Latin1Decoder)];
        let variations = EncodingVariations::resolve(&encoders).unwrap();

        assert_eq!(variations.group("utf8").unwrap(), &["utf8", "my-utf8"]);
        // the built-in group shrank below two names and is gone
        assert!(variations.group("utf-8").is_none());
        assert_eq!(variations.suppressed(), &["utf8"]);
        assert_eq!(variations.normalize(["my-utf8"]), vec!["utf8", "my-utf8"]);
    }

    #[test]
    fn test_single_alias_user_encoder_has_no_group() {
        let encoders = [whole(&["ucs2"])];
        let variations = EncodingVariations::resolve(&encoders).unwrap();
        assert!(variations.group("ucs2").is_none());
        assert!(variations.group("ucs-2").is_none());
        assert_eq!(variations.groups().len(), 1);
    }

    #[test]
    fn test_duplicate_alias() {
        let encoders = [whole(&["a", "b"]), whole(&["b", "c"]), whole(&["c"])];
        match EncodingVariations::resolve(&encoders) {
            Err(ConfigError::DuplicateEncoding { aliases }) => assert_eq!(aliases, vec!["b", "c"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
