//! User-supplied configuration properties.
//!
//! Configuration is a flat set of `key=value` strings, usually passed on the
//! command line as `-Dkey=value`. A key may be present with an empty value;
//! accessors distinguish "present" from "set" (present and non-empty).

use std::collections::BTreeMap;
use std::str::FromStr;

pub const VERSION_OVERRIDE: &str = "versionOverride";
pub const VERSION_SUFFIX_OVERRIDE: &str = "versionSuffixOverride";
pub const VERSION_BASE_OVERRIDE: &str = "versionBaseOverride";
pub const VERSIONING_STRATEGY: &str = "versioningStrategy";
pub const VERSION_INCREMENTAL_SUFFIX: &str = "versionIncrementalSuffix";
pub const VERSION_INCREMENTAL_SUFFIX_PADDING: &str = "versionIncrementalSuffixPadding";
pub const PACKAGE_SCOPE: &str = "packageScope";
pub const DEPENDENCY_OVERRIDE_PREFIX: &str = "dependencyOverride.";
pub const DEV_DEPENDENCY_OVERRIDE_PREFIX: &str = "devDependencyOverride.";
pub const REST_URL: &str = "restURL";
pub const REST_MODE: &str = "restMode";
pub const REPOSITORY_GROUP: &str = "repositoryGroup";
pub const REST_INCLUDE_ALL: &str = "restIncludeAll";
pub const REST_CONNECTION_TIMEOUT: &str = "restConnectionTimeout";
pub const REST_SOCKET_TIMEOUT: &str = "restSocketTimeout";
pub const MANIPULATION_DISABLE: &str = "manipulation.disable";
pub const PRE_SCRIPT: &str = "preScript";
pub const POST_SCRIPT: &str = "postScript";

/// Flat key/value configuration for a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProps {
    props: BTreeMap<String, String>,
}

impl UserProps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` definitions. A definition without `=` is stored
    /// with an empty value.
    pub fn from_definitions<I, S>(definitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut props = Self::new();
        for definition in definitions {
            let definition = definition.as_ref();
            match definition.split_once('=') {
                Some((key, value)) => props.insert(key.trim(), value),
                None => props.insert(definition.trim(), ""),
            }
        }
        props
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.props.insert(key.into(), value.into());
    }

    /// Raw value, including empty ones.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    /// Value only when present and non-empty.
    pub fn get_set(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get_set(key).is_some()
    }

    /// Boolean switch: `true` when the value is `true` (any case) or the key
    /// is present with an empty value.
    pub fn is_enabled(&self, key: &str) -> bool {
        match self.get(key) {
            Some(value) => value.is_empty() || value.eq_ignore_ascii_case("true"),
            None => false,
        }
    }

    /// Parses a value, falling back to `default` with a warning when the
    /// value is missing or malformed.
    pub fn parse_or<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
    {
        let Some(raw) = self.get_set(key) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!(
                    "Invalid value '{}' provided in {}. Using {}.",
                    raw,
                    key,
                    default
                );
                default
            }
        }
    }

    /// All entries whose key starts with `prefix`, with the prefix stripped.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.props
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|name| (name, v.as_str())))
            .filter(|(name, _)| !name.is_empty())
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserProps {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}
