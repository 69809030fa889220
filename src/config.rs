//! Configuration types.
//!
//! Everything is read once at startup and never changes afterwards.

use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{DEFAULT_OPENAI_BASE_URL, LlmBackend, LlmConfig};
use crate::pipeline::gateway::{DEFAULT_MODEL, GatewayConfig};

/// Default listen port.
const DEFAULT_PORT: u16 = 8000;

/// Default upload limit in megabytes.
const DEFAULT_MAX_FILE_SIZE_MB: usize = 5;

/// Default completion deadline.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    /// Largest accepted upload, in bytes.
    pub max_file_size_bytes: usize,
    pub port: u16,
    /// Deadline for each completion call (`None` = no deadline).
    pub completion_timeout: Option<Duration>,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> crate::error::Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let model = lookup("INBOX_CLASSIFIER_MODEL")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = lookup("OPENAI_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        let max_file_size_mb: usize = parse_var(
            &lookup,
            "INBOX_CLASSIFIER_MAX_FILE_SIZE_MB",
            DEFAULT_MAX_FILE_SIZE_MB,
        )?;
        if max_file_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_CLASSIFIER_MAX_FILE_SIZE_MB".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let port: u16 = parse_var(&lookup, "INBOX_CLASSIFIER_PORT", DEFAULT_PORT)?;

        let timeout_secs: u64 =
            parse_var(&lookup, "INBOX_CLASSIFIER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            llm: LlmConfig {
                backend: LlmBackend::OpenAi,
                api_key: secrecy::SecretString::from(api_key),
                model,
                base_url,
            },
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            port,
            completion_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    /// Gateway settings derived from this configuration.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            model_name: self.llm.model.clone(),
            completion_timeout: self.completion_timeout,
            ..GatewayConfig::default()
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
    }
}
