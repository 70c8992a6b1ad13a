//! # Tagged configuration values.
//!
//! [`ConfigValue`] is the node type of the configuration tree: a scalar
//! (string, integer, float, boolean) or a nested table. Coercions never panic;
//! they return `None` when the value cannot be read as the requested type and
//! the store turns that into [`ConfigError::TypeMismatch`](crate::ConfigError).
//!
//! ## Coercion rules
//! ```text
//! as_bool:  Boolean(b) → b | Integer(i) → i == 1 | String(s) → s ~ "true" or s == "1"
//! as_int:   Integer(i) → i | Float(f) → trunc(f) | Boolean(b) → 0/1 | String(s) → parse
//! as_float: Float(f) → f | Integer(i) → i as f64 | String(s) → parse
//! as_str:   String(s) → s | other scalars → Display
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;

/// Table node: ordered so that serialization is stable.
pub type Table = BTreeMap<String, ConfigValue>;

/// One node of the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Table(Table),
}

impl ConfigValue {
    /// Human-readable kind name (used in error messages).
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "string",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::Boolean(_) => "boolean",
            ConfigValue::Table(_) => "table",
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            ConfigValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            ConfigValue::Integer(i) => Some(*i == 1),
            ConfigValue::String(s) => Some(s.eq_ignore_ascii_case("true") || s == "1"),
            ConfigValue::Float(_) | ConfigValue::Table(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            ConfigValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            ConfigValue::Boolean(b) => Some(i64::from(*b)),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            ConfigValue::Boolean(_) | ConfigValue::Table(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<String> {
        match self {
            ConfigValue::Table(_) => None,
            ConfigValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Parses a command-line literal: `true`/`false`, integers and floats are
    /// typed, anything else stays a string.
    ///
    /// ```
    /// use iq_agent::ConfigValue;
    ///
    /// assert_eq!(ConfigValue::parse_literal("60"), ConfigValue::Integer(60));
    /// assert_eq!(ConfigValue::parse_literal("false"), ConfigValue::Boolean(false));
    /// assert_eq!(
    ///     ConfigValue::parse_literal("https://svc/vitals"),
    ///     ConfigValue::String("https://svc/vitals".into()),
    /// );
    /// ```
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "true" => return ConfigValue::Boolean(true),
            "false" => return ConfigValue::Boolean(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return ConfigValue::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return ConfigValue::Float(f);
            }
        }
        ConfigValue::String(raw.to_string())
    }

    /// Converts a parsed TOML value; `key` is the dot-path used in errors.
    pub(crate) fn from_toml(key: &str, value: toml::Value) -> Result<Self, ConfigError> {
        Ok(match value {
            toml::Value::String(s) => ConfigValue::String(s),
            toml::Value::Integer(i) => ConfigValue::Integer(i),
            toml::Value::Float(f) => ConfigValue::Float(f),
            toml::Value::Boolean(b) => ConfigValue::Boolean(b),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
            toml::Value::Array(_) => {
                return Err(ConfigError::Unsupported {
                    key: key.to_string(),
                    kind: "array",
                });
            }
            toml::Value::Table(table) => {
                let mut out = Table::new();
                for (name, child) in table {
                    let child_key = if key.is_empty() {
                        name.clone()
                    } else {
                        format!("{key}.{name}")
                    };
                    out.insert(name, ConfigValue::from_toml(&child_key, child)?);
                }
                ConfigValue::Table(out)
            }
        })
    }

    pub(crate) fn to_toml(&self) -> toml::Value {
        match self {
            ConfigValue::String(s) => toml::Value::String(s.clone()),
            ConfigValue::Integer(i) => toml::Value::Integer(*i),
            ConfigValue::Float(f) => toml::Value::Float(*f),
            ConfigValue::Boolean(b) => toml::Value::Boolean(*b),
            ConfigValue::Table(t) => toml::Value::Table(
                t.iter()
                    .map(|(name, child)| (name.clone(), child.to_toml()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Integer(i) => write!(f, "{i}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Boolean(b) => write!(f, "{b}"),
            ConfigValue::Table(_) => f.write_str("<table>"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<u64> for ConfigValue {
    fn from(i: u64) -> Self {
        ConfigValue::Integer(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_coercions() {
        assert_eq!(ConfigValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(ConfigValue::Integer(1).as_bool(), Some(true));
        assert_eq!(ConfigValue::Integer(2).as_bool(), Some(false));
        assert_eq!(ConfigValue::from("TRUE").as_bool(), Some(true));
        assert_eq!(ConfigValue::from("1").as_bool(), Some(true));
        assert_eq!(ConfigValue::from("yes").as_bool(), Some(false));
        assert_eq!(ConfigValue::Float(1.0).as_bool(), None);
        assert_eq!(ConfigValue::Table(Table::new()).as_bool(), None);
    }

    #[test]
    fn int_coercions() {
        assert_eq!(ConfigValue::Integer(60).as_int(), Some(60));
        assert_eq!(ConfigValue::Float(2.9).as_int(), Some(2));
        assert_eq!(ConfigValue::Boolean(true).as_int(), Some(1));
        assert_eq!(ConfigValue::from(" 300 ").as_int(), Some(300));
        assert_eq!(ConfigValue::from("sixty").as_int(), None);
        assert_eq!(ConfigValue::Float(f64::NAN).as_int(), None);
    }

    #[test]
    fn str_coercions() {
        assert_eq!(ConfigValue::Integer(3).as_str().as_deref(), Some("3"));
        assert_eq!(ConfigValue::Boolean(false).as_str().as_deref(), Some("false"));
        assert_eq!(ConfigValue::Table(Table::new()).as_str(), None);
    }

    #[test]
    fn toml_arrays_are_rejected_with_their_path() {
        let doc: toml::Table = toml::from_str("[agent]\nhosts = [1, 2]\n").unwrap();
        let err = ConfigValue::from_toml("", toml::Value::Table(doc)).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { ref key, .. } if key == "agent.hosts"));
    }
}
