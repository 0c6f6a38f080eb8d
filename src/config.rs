//! # Configuration
//!
//! [`ServiceConfig`] is loaded from the process environment by [`ServiceConfig::from_env`],
//! which collects the variables into a map and hands it to the pure
//! [`ServiceConfig::from_kv`].
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ENTITY_SERVICE_DB_NAME` | required |
//! | `ENTITY_SERVICE_URI` | `memory://localhost` |
//! | `ENTITY_SERVICE_REUSE_LOCAL_REPOSITORY` | `true` |
//! | `ENTITY_SERVICE_BROKER_BUFFER` | `64` |
//! | `ENTITY_SERVICE_REQUEST_TIMEOUT_MS` | none |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DB_NAME_KEY: &str = "ENTITY_SERVICE_DB_NAME";
pub const URI_KEY: &str = "ENTITY_SERVICE_URI";
pub const REUSE_LOCAL_REPOSITORY_KEY: &str = "ENTITY_SERVICE_REUSE_LOCAL_REPOSITORY";
pub const BROKER_BUFFER_KEY: &str = "ENTITY_SERVICE_BROKER_BUFFER";
pub const REQUEST_TIMEOUT_KEY: &str = "ENTITY_SERVICE_REQUEST_TIMEOUT_MS";

const ENV_PREFIX: &str = "ENTITY_SERVICE_";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

fn default_uri() -> String {
    "memory://localhost".to_string()
}

fn default_true() -> bool {
    true
}

fn default_broker_buffer() -> usize {
    64
}

/// Options of the entity service mixin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinOptions {
    pub db_name: String,
    #[serde(default = "default_uri")]
    pub uri: String,
    /// Resolve one repository when the service starts and reuse it for every request.
    #[serde(default = "default_true")]
    pub reuse_local_repository: bool,
}

impl MixinOptions {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            uri: default_uri(),
            reuse_local_repository: true,
        }
    }
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub mixin: MixinOptions,
    #[serde(default = "default_broker_buffer")]
    pub broker_buffer: usize,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let kv: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        Self::from_kv(&kv)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let db_name = non_empty(kv.get(DB_NAME_KEY)).ok_or(ConfigError::Missing(DB_NAME_KEY))?;
        let uri = non_empty(kv.get(URI_KEY)).unwrap_or_else(default_uri);
        let reuse_local_repository = match non_empty(kv.get(REUSE_LOCAL_REPOSITORY_KEY)) {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                key: REUSE_LOCAL_REPOSITORY_KEY,
                value: raw,
            })?,
        };
        let broker_buffer = match non_empty(kv.get(BROKER_BUFFER_KEY)) {
            None => default_broker_buffer(),
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: BROKER_BUFFER_KEY,
                    value: raw,
                })?,
        };
        let request_timeout_ms = match non_empty(kv.get(REQUEST_TIMEOUT_KEY)) {
            None => None,
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: REQUEST_TIMEOUT_KEY,
                value: raw.clone(),
            })?),
        };

        Ok(Self {
            mixin: MixinOptions {
                db_name,
                uri,
                reuse_local_repository,
            },
            broker_buffer,
            request_timeout_ms,
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply() {
        let config = ServiceConfig::from_kv(&kv(&[(DB_NAME_KEY, "blog")])).unwrap();
        assert_eq!(config.mixin, MixinOptions::new("blog"));
        assert_eq!(config.broker_buffer, 64);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn db_name_is_required() {
        assert_eq!(
            ServiceConfig::from_kv(&kv(&[(URI_KEY, "memory://x")])),
            Err(ConfigError::Missing(DB_NAME_KEY))
        );
    }

    #[test]
    fn parses_overrides() {
        let config = ServiceConfig::from_kv(&kv(&[
            (DB_NAME_KEY, "blog"),
            (REUSE_LOCAL_REPOSITORY_KEY, "false"),
            (BROKER_BUFFER_KEY, "8"),
            (REQUEST_TIMEOUT_KEY, "250"),
        ]))
        .unwrap();
        assert!(!config.mixin.reuse_local_repository);
        assert_eq!(config.broker_buffer, 8);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_bad_values() {
        let err = ServiceConfig::from_kv(&kv(&[(DB_NAME_KEY, "blog"), (BROKER_BUFFER_KEY, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: BROKER_BUFFER_KEY, .. }));
    }

    #[test]
    fn mixin_options_deserialize_with_defaults() {
        let options: MixinOptions = serde_json::from_str(r#"{"dbName": "blog"}"#).unwrap();
        assert_eq!(options, MixinOptions::new("blog"));
    }
}
