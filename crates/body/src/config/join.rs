use crate::charset::EncodingVariations;
use crate::config::defaults::DefaultProfile;
use crate::config::{
    DefaultMediaType, EncodingPolicy, Encodings, GlobalOptions, Inflate, InflatePolicy, Matcher, ParserConfig,
    ParserEntry, ResolvedParser, Setting,
};
use crate::error::ConfigError;
use crate::media_type::MediaTypeMatcher;
use tracing::trace;

/// Merges the declared parser entries with the global options and built-in defaults.
///
/// An empty entry list means every [`DefaultMediaType`], in its fixed order. The output keeps
/// the declaration order of the entries.
pub fn join_parsers(
    entries: Vec<ParserEntry>,
    options: &GlobalOptions,
    variations: &EncodingVariations,
) -> Result<Vec<ResolvedParser>, ConfigError> {
    let entries = if entries.is_empty() {
        DefaultMediaType::ALL.into_iter().map(ParserEntry::Default).collect()
    } else {
        entries
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            ParserEntry::Default(default) => {
                resolve(ParserConfig::for_type(default.identifier()), Some(default), options, variations)
            }
            ParserEntry::Config(config) => {
                let default = config.default_media_type();
                resolve(config, default, options, variations)
            }
        })
        .collect()
}

fn resolve(
    config: ParserConfig,
    default: Option<DefaultMediaType>,
    options: &GlobalOptions,
    variations: &EncodingVariations,
) -> Result<ResolvedParser, ConfigError> {
    let profile = default.map(|default| default.profile(options));
    let DefaultProfile { parser, default_encoding, empty_response } =
        profile.unwrap_or(DefaultProfile { parser: None, default_encoding: None, empty_response: None });

    if config.matcher.is_empty() {
        return Err(ConfigError::EmptyMatcher);
    }
    let matcher = config
        .matcher
        .into_iter()
        .map(|matcher| match matcher {
            Matcher::Type(identifier) => MediaTypeMatcher::parse(&identifier),
            Matcher::Predicate(predicate) => Ok(predicate),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let limit = config.limit.as_ref().unwrap_or(&options.limit).resolve()?;
    let inflate = match config.inflate.unwrap_or_else(|| options.inflate.clone()) {
        Inflate::All => InflatePolicy::All,
        Inflate::Only(names) => InflatePolicy::Only(lowercase(names)),
    };

    let (encodings, default_encoding) =
        resolve_encodings(config.encodings, config.default_encoding, default_encoding, variations)?;

    let resolved = ResolvedParser {
        matcher,
        inflate,
        limit,
        require_content_length: config.require_content_length.unwrap_or(options.require_content_length),
        parser: config.parser.resolve(parser),
        encodings,
        default_encoding,
        empty_response: config.empty_response.resolve(empty_response),
        verify: config.verify.resolve(None),
    };
    trace!(parser = ?resolved, "resolved parser configuration");
    Ok(resolved)
}

/// Resolves the charset policy of one configuration.
///
/// - all encodings: kept, with the default encoding carried over
/// - a list: the default encoding joins the list, and the union is expanded over aliases
/// - unset: an explicit default encoding becomes a one-element list, a default inherited from
///   a default media type allows every encoding, otherwise there is no constraint
/// - removed: no constraint, a default encoding alongside is a contradiction
pub(crate) fn resolve_encodings(
    encodings: Setting<Encodings>,
    default_encoding: Setting<String>,
    inherited_default: Option<String>,
    variations: &EncodingVariations,
) -> Result<(Option<EncodingPolicy>, Option<String>), ConfigError> {
    let (explicit_default, inherited_default) = match default_encoding {
        Setting::Set(encoding) => (Some(encoding.trim().to_ascii_lowercase()), None),
        Setting::Remove => (None, None),
        Setting::Inherit => (None, inherited_default),
    };

    match encodings {
        Setting::Set(Encodings::All) => {
            Ok((Some(EncodingPolicy::All), explicit_default.or(inherited_default)))
        }
        Setting::Set(Encodings::Only(names)) => {
            let default = explicit_default.or(inherited_default);
            let names = variations.normalize(names.iter().map(String::as_str).chain(default.as_deref()));
            Ok((Some(EncodingPolicy::Only(names)), default))
        }
        Setting::Remove => match explicit_default {
            Some(default_encoding) => Err(ConfigError::ContradictoryEncoding { default_encoding }),
            None => Ok((None, None)),
        },
        Setting::Inherit => match (explicit_default, inherited_default) {
            (Some(default), _) => Ok((Some(EncodingPolicy::Only(variations.normalize([&default]))), Some(default))),
            (None, Some(default)) => Ok((Some(EncodingPolicy::All), Some(default))),
            (None, None) => Ok((None, None)),
        },
    }
}

fn lowercase(names: Vec<String>) -> Vec<String> {
    names.into_iter().map(|name| name.trim().to_ascii_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::BufferEncoder;
    use crate::limit::Limit;
    use crate::media_type::MediaType;
    use crate::value::BodyValue;

    fn join(entries: Vec<ParserEntry>) -> Result<Vec<ResolvedParser>, ConfigError> {
        join_parsers(entries, &GlobalOptions::default(), &EncodingVariations::default())
    }

    #[test]
    fn test_defaults() {
        let parsers = join(vec![]).unwrap();
        assert_eq!(parsers.len(), 4);

        let order: Vec<bool> = DefaultMediaType::ALL
            .iter()
            .zip(&parsers)
            .map(|(default, parser)| {
                let (type_, subtype) = default.identifier().split_once('/').unwrap();
                parser.matches(&MediaType::new(type_, subtype))
            })
            .collect();
        assert_eq!(order, vec![true; 4]);

        for parser in &parsers {
            assert_eq!(parser.limit(), Some(20480));
            assert_eq!(parser.inflate(), &InflatePolicy::Only(vec!["identity".to_string()]));
            assert!(!parser.require_content_length());
        }

        assert_eq!(parsers[0].empty_response(), Some(&BodyValue::empty_object()));
        assert_eq!(parsers[1].empty_response(), Some(&BodyValue::empty_object()));
        assert_eq!(parsers[2].empty_response(), Some(&BodyValue::Text(String::new())));
        assert_eq!(parsers[3].empty_response(), Some(&BodyValue::Bytes(bytes::Bytes::new())));

        assert_eq!(parsers[1].encodings(), Some(&EncodingPolicy::All));
        assert_eq!(parsers[1].default_encoding(), Some("utf-8"));
        assert_eq!(parsers[3].encodings(), None);
        assert_eq!(parsers[3].default_encoding(), None);
    }

    #[test]
    fn test_default_entry_by_name() {
        let parsers = join(vec![DefaultMediaType::Json.into()]).unwrap();
        assert_eq!(parsers.len(), 1);
        assert!(parsers[0].has_parser());
        assert!(parsers[0].matches(&MediaType::new("application", "json")));
        assert!(!parsers[0].matches(&MediaType::new("text", "plain")));
    }

    #[test]
    fn test_overlay_removes_parser() {
        let config = ParserConfig::for_type("application/x-www-form-urlencoded").without_parser();
        let parsers = join(vec![config.into()]).unwrap();

        let parser = &parsers[0];
        assert!(!parser.has_parser());
        assert_eq!(parser.empty_response(), Some(&BodyValue::empty_object()));
        assert_eq!(parser.encodings(), Some(&EncodingPolicy::All));
        assert_eq!(parser.default_encoding(), Some("utf-8"));
        assert_eq!(parser.limit(), Some(20480));
    }

    #[test]
    fn test_overlay_removes_empty_response() {
        let config = ParserConfig::for_type("text/plain").without_empty_response().limit("1mb");
        let parsers = join(vec![config.into()]).unwrap();
        assert_eq!(parsers[0].empty_response(), None);
        assert_eq!(parsers[0].limit(), Some(1024 * 1024));
    }

    #[test]
    fn test_custom_matcher_uses_global_defaults_only() {
        let config = ParserConfig::for_type("application/*").or_matching(|media_type| media_type.type_() == "text");
        let parsers = join(vec![config.into()]).unwrap();

        let parser = &parsers[0];
        assert!(!parser.has_parser());
        assert_eq!(parser.empty_response(), None);
        assert_eq!(parser.encodings(), None);
        assert!(parser.matches(&MediaType::new("text", "html")));
        assert!(parser.matches(&MediaType::new("application", "xml")));
        assert!(!parser.matches(&MediaType::new("image", "png")));
    }

    #[test]
    fn test_limit_and_inflate_normalization() {
        let config = ParserConfig::for_type("text/plain").limit(Limit::Unbounded).inflate("GZIP");
        let parsers = join(vec![config.into()]).unwrap();
        assert_eq!(parsers[0].limit(), None);
        assert_eq!(parsers[0].inflate(), &InflatePolicy::Only(vec!["gzip".to_string()]));

        let config = ParserConfig::for_type("text/plain").limit(0).inflate(true);
        let parsers = join(vec![config.into()]).unwrap();
        assert_eq!(parsers[0].limit(), Some(0));
        assert_eq!(parsers[0].inflate(), &InflatePolicy::All);
    }

    #[test]
    fn test_invalid_configuration() {
        let invalid_type = ParserConfig::for_type("json");
        assert!(matches!(join(vec![invalid_type.into()]), Err(ConfigError::InvalidMediaType { .. })));

        let invalid_limit = ParserConfig::for_type("text/plain").limit("many");
        assert!(matches!(join(vec![invalid_limit.into()]), Err(ConfigError::InvalidLimit { .. })));

        let contradiction = ParserConfig::for_type("text/csv").without_encodings().default_encoding("utf-8");
        assert!(matches!(join(vec![contradiction.into()]), Err(ConfigError::ContradictoryEncoding { .. })));
    }

    #[test]
    fn test_resolve_encodings() {
        let variations = EncodingVariations::default();
        let builtin = EncodingVariations::resolve(&[]).unwrap();

        let (policy, default) =
            resolve_encodings(Setting::Set(Encodings::All), Setting::Inherit, Some("utf-8".to_string()), &variations)
                .unwrap();
        assert_eq!(policy, Some(EncodingPolicy::All));
        assert_eq!(default.as_deref(), Some("utf-8"));

        let only = Setting::Set(["latin1"].into());
        let (policy, default) = resolve_encodings(only, Setting::Set("UTF8".to_string()), None, &builtin).unwrap();
        assert_eq!(policy, Some(EncodingPolicy::Only(vec!["latin1".into(), "utf8".into(), "utf-8".into()])));
        assert_eq!(default.as_deref(), Some("utf8"));

        let (policy, default) =
            resolve_encodings(Setting::Inherit, Setting::Set("ucs-2".to_string()), None, &builtin).unwrap();
        assert_eq!(policy, Some(EncodingPolicy::Only(vec!["ucs2".into(), "ucs-2".into()])));
        assert_eq!(default.as_deref(), Some("ucs-2"));

        let (policy, default) =
            resolve_encodings(Setting::Inherit, Setting::Remove, Some("utf-8".to_string()), &builtin).unwrap();
        assert_eq!(policy, None);
        assert_eq!(default, None);

        let (policy, default) =
            resolve_encodings(Setting::Remove, Setting::Inherit, Some("utf-8".to_string()), &builtin).unwrap();
        assert_eq!(policy, None);
        assert_eq!(default, None);
    }

    #[test]
    fn test_user_alias_group_expansion() {
        let encoders =
            [BufferEncoder::whole(["x-mac", "x-mac-roman"], |bytes| Ok(String::from_utf8_lossy(bytes).into_owned()))];
        let variations = EncodingVariations::resolve(&encoders).unwrap();
        let config = ParserConfig::for_type("text/*").encodings(["X-MAC"]);
        let parsers = join_parsers(vec![config.into()], &GlobalOptions::default(), &variations).unwrap();
        assert_eq!(parsers[0].encodings(), Some(&EncodingPolicy::Only(vec!["x-mac".into(), "x-mac-roman".into()])));
    }
}
