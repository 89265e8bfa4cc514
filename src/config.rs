//! Service configuration from environment variables (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TEMPLATE_PATH: &str = "KCP_LETTERPAD.docx";
pub const DEFAULT_FILE_PREFIX: &str = "KCP";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("unknown conversion backend '{0}' (expected soffice, command, builtin or none)")]
    UnknownBackend(String),
}

/// A PDF conversion backend, as named in `CONVERSION_BACKENDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Soffice,
    Command,
    Builtin,
    None,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "soffice" | "libreoffice" => Ok(BackendKind::Soffice),
            "command" => Ok(BackendKind::Command),
            "builtin" => Ok(BackendKind::Builtin),
            "none" => Ok(BackendKind::None),
            _ => Err(ConfigError::UnknownBackend(value.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionConfig {
    /// Tried in order; the first success wins.
    pub backends: Vec<BackendKind>,
    pub soffice_bin: String,
    /// Program and arguments of the `command` backend.
    pub command: Vec<String>,
    pub timeout: Duration,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            backends: vec![BackendKind::Soffice],
            soffice_bin: "soffice".to_string(),
            command: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub template_path: PathBuf,
    pub file_prefix: String,
    pub conversion: ConversionConfig,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            conversion: ConversionConfig::default(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                value: value.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };

        let timeout_secs = match get("CONVERSION_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        key: "CONVERSION_TIMEOUT_SECS",
                        value: value.clone(),
                        reason: "must be greater than zero".to_string(),
                    })
                }
                Ok(secs) => secs,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        key: "CONVERSION_TIMEOUT_SECS",
                        value: value.clone(),
                        reason: e.to_string(),
                    })
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        let backends = match get("CONVERSION_BACKENDS") {
            Some(value) => value
                .split(',')
                .filter(|name| !name.trim().is_empty())
                .map(BackendKind::from_str)
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.conversion.backends.clone(),
        };

        let command: Vec<String> = get("CONVERSION_COMMAND")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if backends.contains(&BackendKind::Command) && command.is_empty() {
            return Err(ConfigError::Missing("CONVERSION_COMMAND"));
        }

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            database_url: get("DATABASE_URL"),
            template_path: get("TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_path),
            file_prefix: get("ESTIMATE_FILE_PREFIX").unwrap_or(defaults.file_prefix),
            conversion: ConversionConfig {
                backends,
                soffice_bin: get("SOFFICE_BIN").unwrap_or(defaults.conversion.soffice_bin),
                command,
                timeout: Duration::from_secs(timeout_secs),
            },
            cors_allowed_origins,
        })
    }
}
