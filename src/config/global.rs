//! # Global config record shared with every channel.
//!
//! The record given to `BusBuilder::with_config` is stored as a JSON object and
//! exposed read-only through [`ChannelContext::config`](crate::ChannelContext::config).
//! Keys are kept exactly as supplied (`websocketHost`, `websocketPort`, ...).
//!
//! ## Example
//! ```rust
//! use serde::Deserialize;
//! use serde_json::json;
//! use tickbus::GlobalConfig;
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Websocket {
//!     websocket_host: String,
//!     websocket_port: u16,
//! }
//!
//! let cfg = GlobalConfig::from_value(json!({
//!     "websocketHost": "localhost",
//!     "websocketPort": 8080,
//! })).unwrap();
//!
//! assert_eq!(cfg.require::<u16>("websocketPort").unwrap(), 8080);
//! let ws: Websocket = cfg.deserialize().unwrap();
//! assert_eq!(ws.websocket_host, "localhost");
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ConfigError, json_type};

/// Immutable, cheaply cloneable config record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalConfig {
    record: Arc<Map<String, Value>>,
}

impl GlobalConfig {
    /// Builds a config from a JSON object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(record) => Ok(Self {
                record: Arc::new(record),
            }),
            other => Err(ConfigError::NotAnObject {
                found: json_type(&other),
            }),
        }
    }

    /// Parses a TOML document; its top-level table becomes the record.
    pub fn from_toml_str(doc: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(doc)?;
        let value = serde_json::to_value(table).map_err(|source| ConfigError::Invalid {
            key: "*".to_string(),
            source,
        })?;
        Self::from_value(value)
    }

    /// Reads and converts `key`; `Ok(None)` when absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.record
            .get(key)
            .map(|v| {
                T::deserialize(v).map_err(|source| ConfigError::Invalid {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Reads and converts `key`; [`ConfigError::Missing`] when absent.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.get(key)?.ok_or_else(|| ConfigError::Missing {
            key: key.to_string(),
        })
    }

    /// Typed view of the whole record.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        T::deserialize(&Value::Object(self.record.as_ref().clone())).map_err(|source| {
            ConfigError::Invalid {
                key: "*".to_string(),
                source,
            }
        })
    }

    /// Raw value of `key`.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.record.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.record.contains_key(key)
    }

    /// Keys in the record.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.record.keys().map(String::as_str)
    }

    /// Copy of the record as a JSON value.
    pub fn as_value(&self) -> Value {
        Value::Object(self.record.as_ref().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }
}
