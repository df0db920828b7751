//! Resolver configuration.
//!
//! Values come from defaults, from configuration sources (environment
//! variables, in-memory maps), or, with the `config` feature, from JSON.

use std::collections::HashMap;
use std::env;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "EVENT_DI";

/// Configuration shared by the cache registry and the resolver.
///
/// # Examples
///
/// ```
/// use event_di::{CacheRegistry, ResolverConfig, SenderEvent};
///
/// let config = ResolverConfig {
///     global_cache_key: "shared".to_string(),
///     ..ResolverConfig::default()
/// };
/// let registry = CacheRegistry::with_config(config);
/// assert_eq!(registry.derive_cache_key(&SenderEvent::anonymous()).as_str(), "shared");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ResolverConfig {
    /// Cache key used when an event has neither user nor chat
    pub global_cache_key: String,
    /// Prefix for keys derived from the user id
    pub user_key_prefix: String,
    /// Prefix for keys derived from the chat id
    pub chat_key_prefix: String,
    /// Maximum provider nesting depth before resolution fails
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            global_cache_key: "global".to_string(),
            user_key_prefix: "user_".to_string(),
            chat_key_prefix: "chat_".to_string(),
            max_depth: 1024,
        }
    }
}

impl ResolverConfig {
    /// Loads from `EVENT_DI_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Loads from `<PREFIX>_*` environment variables over the defaults.
    pub fn from_env_with_prefix(prefix: &str) -> Self {
        Self::from_source(&EnvironmentConfigSource::with_prefix(prefix))
    }

    /// Loads from any source over the defaults.
    ///
    /// Unparseable values are ignored with a warning rather than failing
    /// startup.
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let mut config = Self::default();
        if let Some(v) = source.get("global_cache_key") {
            config.global_cache_key = v;
        }
        if let Some(v) = source.get("user_key_prefix") {
            config.user_key_prefix = v;
        }
        if let Some(v) = source.get("chat_key_prefix") {
            config.chat_key_prefix = v;
        }
        if let Some(v) = source.get("max_depth") {
            match v.parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_depth = depth,
                _ => tracing::warn!(value = %v, "ignoring invalid max_depth"),
            }
        }
        config
    }

    /// Parses a JSON document; missing fields take their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes to JSON.
    #[cfg(feature = "config")]
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<String>;
}

/// Environment variable configuration source
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    /// Prefix to filter environment variables
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    /// Reads unprefixed, upper-cased variable names.
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Reads `{PREFIX}_{KEY}` variables.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(self.env_key(key)).ok()
    }
}

/// In-memory configuration source
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, String>,
}

impl MapConfigSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
