//! Runtime configuration, read from environment variables.
//!
//! Every setting has a default, so an empty environment yields a working
//! development configuration. Values that are present but unparsable are
//! rejected instead of silently replaced.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use fraudwatch_ai::OllamaConfig;
use fraudwatch_ai::ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL};

use crate::jobs::{JobExecutorConfig, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Inference service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceSettings {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// History store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySettings {
    pub host: String,
    pub port: u16,
    pub namespace: String,
    pub set: String,
    pub timeout: Duration,
}

impl HistorySettings {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

/// Job queue and worker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub redis_url: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub result_ttl: Duration,
    pub lease: Duration,
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    /// Redis-backed history and queue when true; in-process stores otherwise.
    pub use_persistent_stores: bool,
    pub inference: InferenceSettings,
    pub history: HistorySettings,
    pub queue: QueueSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };

        let settings = Self {
            bind_addr: env.parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 5000)))?,
            use_persistent_stores: env.flag("USE_PERSISTENT_STORES", false)?,
            inference: InferenceSettings {
                base_url: env.string("OLLAMA_BASE_URL", DEFAULT_BASE_URL),
                model: env.string("MODEL_NAME", DEFAULT_MODEL),
                timeout: Duration::from_secs(env.parsed("INFERENCE_TIMEOUT_SECS", 120)?),
            },
            history: HistorySettings {
                host: env.string("HISTORY_STORE_HOST", "localhost"),
                port: env.parsed("HISTORY_STORE_PORT", 6379)?,
                namespace: env.string("HISTORY_NAMESPACE", "fraudns"),
                set: env.string("HISTORY_SET", "transactions"),
                timeout: Duration::from_millis(env.parsed("HISTORY_TIMEOUT_MS", 1000)?),
            },
            queue: QueueSettings {
                redis_url: env.string("REDIS_URL", "redis://localhost:6379/0"),
                max_attempts: env.positive("JOB_MAX_ATTEMPTS", 3)?,
                retry_delay: Duration::from_secs(env.parsed("JOB_RETRY_DELAY_SECS", 5)?),
                result_ttl: Duration::from_secs(env.positive("JOB_RESULT_TTL_SECS", 86_400)?),
                lease: Duration::from_secs(env.positive("JOB_LEASE_SECS", 300)?),
                concurrency: env.positive("WORKER_CONCURRENCY", 4)?,
            },
        };

        // A lease shorter than one inference call would requeue live attempts.
        if settings.queue.lease <= settings.inference.timeout {
            return Err(invalid(
                "JOB_LEASE_SECS",
                &settings.queue.lease.as_secs().to_string(),
                format!(
                    "must exceed INFERENCE_TIMEOUT_SECS ({})",
                    settings.inference.timeout.as_secs()
                ),
            ));
        }

        Ok(settings)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.queue.max_attempts, self.queue.retry_delay)
    }

    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig::new(&self.inference.base_url, &self.inference.model).with_timeout(self.inference.timeout)
    }

    pub fn executor_config(&self, name: &str) -> JobExecutorConfig {
        JobExecutorConfig::default()
            .with_name(name)
            .with_concurrency(self.queue.concurrency)
            .with_lease(self.queue.lease)
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    /// Trimmed value; blank counts as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, &raw, e.to_string())),
            None => Ok(default),
        }
    }

    fn positive<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let value = self.parsed(key, default)?;
        if value <= T::default() {
            return Err(invalid(key, &self.get(key).unwrap_or_default(), "must be greater than zero"));
        }
        Ok(value)
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(invalid(key, &raw, "expected true or false")),
            },
            None => Ok(default),
        }
    }
}
