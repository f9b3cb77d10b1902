//! Content repository configuration.
//!
//! All parameters are validated when the configuration is built, so a
//! `ContentRepositoryConfig` that exists is usable as is.

use crate::stream_name::StreamNamespace;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the event log namespace.
pub const NAMESPACE_ENV: &str = "CONTENTCORE_NAMESPACE";
/// Environment variable switching the content-stream cache on or off.
pub const CONTENT_STREAM_CACHE_ENV: &str = "CONTENTCORE_CONTENT_STREAM_CACHE";
/// Environment variable overriding the read-side catch-up batch size.
pub const CATCH_UP_BATCH_SIZE_ENV: &str = "CONTENTCORE_CATCH_UP_BATCH_SIZE";

/// Number of events a projection reads from the log per catch-up round.
///
/// Validated to be between 1 and 10 000.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10_000),
    default = 500,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct CatchUpBatchSize(usize);

/// Invalid configuration input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The namespace is blank, too long or contains `:`.
    #[error("Invalid event log namespace '{0}'")]
    InvalidNamespace(String),

    /// A boolean flag could not be parsed.
    #[error("Invalid value '{value}' for {name}; expected true/false, 1/0, yes/no or on/off")]
    InvalidFlag {
        /// The variable name
        name: &'static str,
        /// The rejected value
        value: String,
    },

    /// The catch-up batch size is not a number between 1 and 10 000.
    #[error("Invalid catch-up batch size '{0}'")]
    InvalidBatchSize(String),
}

/// Configuration of one content repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentRepositoryConfig {
    /// Prefix of every event log stream name
    pub namespace: StreamNamespace,
    /// Whether resolved content streams are memoized for the duration of an operation
    pub content_stream_cache: bool,
    /// How many events a projection reads per catch-up round
    pub catch_up_batch_size: CatchUpBatchSize,
}

impl Default for ContentRepositoryConfig {
    fn default() -> Self {
        Self {
            namespace: StreamNamespace::default(),
            content_stream_cache: true,
            catch_up_batch_size: CatchUpBatchSize::default(),
        }
    }
}

impl ContentRepositoryConfig {
    /// Builds a configuration from the process environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for any variable that is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for any variable that is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(namespace) = lookup(NAMESPACE_ENV) {
            config.namespace = StreamNamespace::try_new(namespace.clone())
                .map_err(|_| ConfigError::InvalidNamespace(namespace))?;
        }
        if let Some(flag) = lookup(CONTENT_STREAM_CACHE_ENV) {
            config.content_stream_cache = parse_flag(CONTENT_STREAM_CACHE_ENV, &flag)?;
        }
        if let Some(size) = lookup(CATCH_UP_BATCH_SIZE_ENV) {
            config.catch_up_batch_size = size
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| CatchUpBatchSize::try_new(n).ok())
                .ok_or(ConfigError::InvalidBatchSize(size))?;
        }
        Ok(config)
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: StreamNamespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Enables or disables the content-stream cache.
    #[must_use]
    pub const fn with_content_stream_cache(mut self, enabled: bool) -> Self {
        self.content_stream_cache = enabled;
        self
    }

    /// Sets the catch-up batch size.
    #[must_use]
    pub const fn with_catch_up_batch_size(mut self, size: CatchUpBatchSize) -> Self {
        self.catch_up_batch_size = size;
        self
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}
