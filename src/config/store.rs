//! # Dot-path addressed configuration store.
//!
//! [`Configuration`] owns the root table of the tree and resolves paths such as
//! `agent.monitors.vitals.interval` one segment at a time.
//!
//! ## Rules
//! - A path that does not resolve is **absent** (`Ok(None)` / `false`), never an error.
//! - A present value of the wrong kind is a [`ConfigError::TypeMismatch`].
//! - The agent only reads; [`Configuration::set`] and [`Configuration::save`]
//!   exist for the authoring tool.

use std::fs;
use std::path::Path;

use crate::config::value::{ConfigValue, Table};
use crate::error::ConfigError;

/// Hierarchical key/value configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    root: Table,
}

impl Configuration {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a TOML document from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: toml::Table = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_table(doc)
    }

    /// Parses a TOML document held in memory.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let doc: toml::Table = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        Self::from_toml_table(doc)
    }

    fn from_toml_table(doc: toml::Table) -> Result<Self, ConfigError> {
        match ConfigValue::from_toml("", toml::Value::Table(doc))? {
            ConfigValue::Table(root) => Ok(Self { root }),
            // from_toml maps a table to a table
            _ => Ok(Self::default()),
        }
    }

    /// Resolves `key` to its node, if present.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut node = self.root.get(first)?;
        for part in parts {
            node = node.as_table()?.get(part)?;
        }
        Some(node)
    }

    /// True iff `key` resolves to a present value (scalar or table).
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_str(&self, key: &str) -> Result<Option<String>, ConfigError> {
        self.coerce(key, "string", ConfigValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        self.coerce(key, "integer", ConfigValue::as_int)
    }

    pub fn get_float(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.coerce(key, "float", ConfigValue::as_float)
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.coerce(key, "boolean", ConfigValue::as_bool)
    }

    fn coerce<T>(
        &self,
        key: &str,
        expected: &'static str,
        f: impl FnOnce(&ConfigValue) -> Option<T>,
    ) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => f(value).map(Some).ok_or_else(|| ConfigError::TypeMismatch {
                key: key.to_string(),
                expected,
            }),
        }
    }

    /// Sets `key` to `value`, creating intermediate tables on demand.
    ///
    /// An existing leaf is overwritten. A scalar standing where an intermediate
    /// table is needed is replaced by a table.
    ///
    /// ```
    /// use iq_agent::{ConfigValue, Configuration};
    ///
    /// let mut cfg = Configuration::new();
    /// cfg.set("a.b.c", 1i64).unwrap();
    /// assert_eq!(cfg.get_int("a.b.c").unwrap(), Some(1));
    /// assert!(matches!(cfg.get("a.b"), Some(ConfigValue::Table(_))));
    /// ```
    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) -> Result<(), ConfigError> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::InvalidPath {
                key: key.to_string(),
            });
        }
        let (leaf, parents) = match parts.split_last() {
            Some(split) => split,
            None => {
                return Err(ConfigError::InvalidPath {
                    key: key.to_string(),
                });
            }
        };

        let mut table = &mut self.root;
        for part in parents {
            let node = table
                .entry((*part).to_string())
                .or_insert_with(|| ConfigValue::Table(Table::new()));
            if !matches!(node, ConfigValue::Table(_)) {
                *node = ConfigValue::Table(Table::new());
            }
            table = match node {
                ConfigValue::Table(t) => t,
                _ => {
                    return Err(ConfigError::InvalidPath {
                        key: key.to_string(),
                    });
                }
            };
        }
        table.insert((*leaf).to_string(), value.into());
        Ok(())
    }

    /// Renders the tree as a TOML document.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let doc: toml::Table = self
            .root
            .iter()
            .map(|(name, child)| (name.clone(), child.to_toml()))
            .collect();
        Ok(toml::to_string_pretty(&doc)?)
    }

    /// Writes the tree to `path` as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = self.to_toml_string()?;
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[agent]
access_token = "token"

[agent.monitors.vitals]
url = "https://svc/vitals"
enabled = true
interval = 60
timeout = "300"
"#;

    #[test]
    fn lookups_resolve_dot_paths() {
        let cfg = Configuration::from_toml_str(SAMPLE).unwrap();
        assert!(cfg.has("agent.monitors.vitals.url"));
        assert!(cfg.has("agent.monitors"));
        assert_eq!(cfg.get_int("agent.monitors.vitals.interval").unwrap(), Some(60));
        assert_eq!(cfg.get_int("agent.monitors.vitals.timeout").unwrap(), Some(300));
        assert_eq!(cfg.get_bool("agent.monitors.vitals.enabled").unwrap(), Some(true));
    }

    #[test]
    fn absent_paths_are_not_errors() {
        let cfg = Configuration::from_toml_str(SAMPLE).unwrap();
        assert!(!cfg.has("agent.monitors.journald.url"));
        assert_eq!(cfg.get_str("agent.monitors.journald.url").unwrap(), None);
        assert_eq!(cfg.get_int("nope").unwrap(), None);
        // descending through a scalar
        assert_eq!(cfg.get_str("agent.access_token.inner").unwrap(), None);
        assert!(!cfg.has(""));
    }

    #[test]
    fn wrong_kind_is_a_type_mismatch() {
        let cfg = Configuration::from_toml_str(SAMPLE).unwrap();
        let err = cfg.get_int("agent.monitors.vitals.url").unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { expected: "integer", .. }));
        let err = cfg.get_str("agent.monitors").unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { expected: "string", .. }));
    }

    #[test]
    fn set_builds_nested_tables_and_overwrites_leaf() {
        let mut cfg = Configuration::new();
        cfg.set("a.b.c", "first").unwrap();
        cfg.set("a.b.d", 2i64).unwrap();
        cfg.set("a.b.c", "second").unwrap();

        assert_eq!(cfg.get_str("a.b.c").unwrap().as_deref(), Some("second"));
        assert_eq!(cfg.get_int("a.b.d").unwrap(), Some(2));
        let b = cfg.get("a.b").and_then(ConfigValue::as_table).unwrap();
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn set_replaces_scalar_parent() {
        let mut cfg = Configuration::new();
        cfg.set("a", 1i64).unwrap();
        cfg.set("a.b", true).unwrap();
        assert_eq!(cfg.get_bool("a.b").unwrap(), Some(true));
    }

    #[test]
    fn set_rejects_empty_segments() {
        let mut cfg = Configuration::new();
        assert!(matches!(cfg.set("", 1i64), Err(ConfigError::InvalidPath { .. })));
        assert!(matches!(cfg.set("a..b", 1i64), Err(ConfigError::InvalidPath { .. })));
    }

    #[test]
    fn serialization_preserves_the_tree() {
        let cfg = Configuration::from_toml_str(SAMPLE).unwrap();
        let text = cfg.to_toml_string().unwrap();
        let back = Configuration::from_toml_str(&text).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn malformed_documents_fail_to_parse() {
        let err = Configuration::from_toml_str("[agent\n").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }
}
