//! # Run Configuration
//!
//! A run is configured by a [`Config`]: three selector fields naming the
//! scheme, writer and reader implementations, plus an open-ended bag of
//! string/integer settings ([`Additional`]) read by those implementations.
//!
//! ## Precedence
//!
//! [`Config::resolve`] layers sources from lowest to highest priority:
//!
//! 1. the empty document `{}` (built-in defaults),
//! 2. the JSON config file, when one is given,
//! 3. explicit scheme/writer/reader type overrides,
//! 4. explicit `key=value` string overrides, then integer overrides.
//!
//! Once resolved, the config is only handed out by shared reference.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "scheme_type": "streaming",
//!   "writer_type": "udp",
//!   "reader_type": "udp",
//!   "additional": {
//!     "streaming.messages_per_second": 5000,
//!     "udp.host": "10.0.0.7"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;

/// A single additional setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    String(String),
}

impl ConfigValue {
    fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Int(_) => "integer",
            ConfigValue::String(_) => "string",
        }
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

/// Open-ended string/integer settings with typed, defaulting accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Additional(BTreeMap<String, ConfigValue>);

impl Additional {
    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), ConfigValue::String(value.into()));
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.0.insert(key.into(), ConfigValue::Int(value));
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// String value for `key`, or `default` when the key is absent.
    pub fn get_string(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        match self.0.get(key) {
            None => Ok(default.to_string()),
            Some(ConfigValue::String(v)) => Ok(v.clone()),
            Some(other) => Err(type_error(key, "string", other)),
        }
    }

    /// Integer value for `key`, or `default` when the key is absent.
    pub fn get_int(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(ConfigValue::Int(v)) => Ok(*v),
            Some(other) => Err(type_error(key, "integer", other)),
        }
    }

    /// Non-negative integer value for `key`.
    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        let value = self.get_int(key, default as i64)?;
        usize::try_from(value).map_err(|_| ConfigError::Type {
            key: key.to_string(),
            expected: "non-negative integer",
            found: value.to_string(),
        })
    }

    /// Millisecond integer value for `key` as a [`Duration`].
    pub fn get_duration_ms(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let ms = self.get_usize(key, default.as_millis() as usize)?;
        Ok(Duration::from_millis(ms as u64))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }
}

fn type_error(key: &str, expected: &'static str, found: &ConfigValue) -> ConfigError {
    ConfigError::Type {
        key: key.to_string(),
        expected,
        found: format!("{} ({})", found, found.type_name()),
    }
}

fn default_scheme_type() -> String {
    crate::defaults::SCHEME_TYPE.to_string()
}

fn default_transport_type() -> String {
    crate::defaults::TRANSPORT_TYPE.to_string()
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_scheme_type")]
    scheme_type: String,
    #[serde(default = "default_transport_type")]
    writer_type: String,
    #[serde(default = "default_transport_type")]
    reader_type: String,
    #[serde(default)]
    additional: Additional,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme_type: default_scheme_type(),
            writer_type: default_transport_type(),
            reader_type: default_transport_type(),
            additional: Additional::default(),
        }
    }
}

/// Explicit overrides collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub scheme_type: Option<String>,
    pub writer_type: Option<String>,
    pub reader_type: Option<String>,
    /// `key=value` assignments stored as strings.
    pub strings: Vec<String>,
    /// `key=value` assignments whose value must parse as an integer.
    pub ints: Vec<String>,
}

impl Config {
    /// Parse a serialized config document.
    pub fn parse(document: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(document)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read(path.as_ref())?;
        debug!("Loaded config file {:?}", path.as_ref());
        Self::parse(&contents)
    }

    /// Build the run configuration from its layered sources.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = match &overrides.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::parse(b"{}")?,
        };

        if let Some(scheme_type) = non_empty(&overrides.scheme_type) {
            config.scheme_type = scheme_type.to_string();
        }
        if let Some(writer_type) = non_empty(&overrides.writer_type) {
            config.writer_type = writer_type.to_string();
        }
        if let Some(reader_type) = non_empty(&overrides.reader_type) {
            config.reader_type = reader_type.to_string();
        }

        for assignment in &overrides.strings {
            let (key, value) = parse_assignment(assignment)?;
            config.additional.set_string(key, value);
        }
        for assignment in &overrides.ints {
            let (key, value) = parse_assignment(assignment)?;
            let parsed = value.trim().parse::<i64>().map_err(|_| ConfigError::Type {
                key: key.to_string(),
                expected: "integer",
                found: format!("\"{}\"", value),
            })?;
            config.additional.set_int(key, parsed);
        }

        Ok(config)
    }

    /// Builder-style string setting, for programmatic construction.
    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional.set_string(key, value);
        self
    }

    /// Builder-style integer setting, for programmatic construction.
    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.additional.set_int(key, value);
        self
    }

    pub fn with_scheme_type(mut self, scheme_type: impl Into<String>) -> Self {
        self.scheme_type = scheme_type.into();
        self
    }

    pub fn with_writer_type(mut self, writer_type: impl Into<String>) -> Self {
        self.writer_type = writer_type.into();
        self
    }

    pub fn with_reader_type(mut self, reader_type: impl Into<String>) -> Self {
        self.reader_type = reader_type.into();
        self
    }

    pub fn scheme_type(&self) -> &str {
        &self.scheme_type
    }

    pub fn writer_type(&self) -> &str {
        &self.writer_type
    }

    pub fn reader_type(&self) -> &str {
        &self.reader_type
    }

    pub fn additional(&self) -> &Additional {
        &self.additional
    }

    pub fn get_string(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        self.additional.get_string(key, default)
    }

    pub fn get_int(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        self.additional.get_int(key, default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        self.additional.get_usize(key, default)
    }

    pub fn get_duration_ms(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.additional.get_duration_ms(key, default)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Split a `key=value` assignment. Exactly one `=` is accepted.
pub fn parse_assignment(assignment: &str) -> Result<(&str, &str), ConfigError> {
    let mut parts = assignment.split('=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) if !key.is_empty() => Ok((key, value)),
        _ => Err(ConfigError::Format(assignment.to_string())),
    }
}
