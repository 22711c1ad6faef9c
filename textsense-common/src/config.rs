//! Bootstrap configuration loading
//!
//! Configuration is static for the life of the process. Every field has a
//! compiled default, so a missing file never prevents startup.
//!
//! # Config File Resolution
//!
//! 1. Command-line argument (highest priority)
//! 2. `TEXTSENSE_CONFIG` environment variable
//! 3. `<user config dir>/textsense/config.toml`
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TEXTSENSE_CONFIG";

/// Environment variable carrying the Hugging Face access token
pub const HUB_TOKEN_ENV_VAR: &str = "HUGGINGFACE_HUB_TOKEN";

/// Default HTTP port for the text analysis service
pub const DEFAULT_PORT: u16 = 5780;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface to bind the HTTP server to
    pub bind_address: String,

    /// HTTP server port
    pub port: u16,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Request-time analysis limits
    pub analysis: AnalysisConfig,

    /// Model bootstrap behavior
    pub bootstrap: BootstrapConfig,

    /// Hugging Face inference endpoint settings
    pub hub: HubConfig,

    /// API authentication
    pub auth: AuthConfig,

    /// Per-category model overrides (categories not listed use built-in defaults)
    pub models: Vec<ModelConfig>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            logging: LoggingConfig::default(),
            analysis: AnalysisConfig::default(),
            bootstrap: BootstrapConfig::default(),
            hub: HubConfig::default(),
            auth: AuthConfig::default(),
            models: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Request-time analysis limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum accepted text length in characters
    pub max_text_length: usize,

    /// Overall deadline for one analysis request
    pub request_timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_text_length: 5000,
            request_timeout_ms: 30_000,
        }
    }
}

/// Model bootstrap behavior
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Treat any failed slot as a fatal startup error
    pub require_all_ready: bool,

    /// Per-slot load timeout in seconds (no timeout when absent)
    pub load_timeout_secs: Option<u64>,
}

/// Hugging Face inference endpoint settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Inference API base URL
    pub base_url: String,

    /// Access token (the environment variable takes precedence)
    pub token: Option<String>,

    /// Per-call HTTP timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".to_string(),
            token: None,
            http_timeout_secs: 120,
        }
    }
}

/// API authentication settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// `false` disables all token checking
    pub enabled: bool,

    /// Accepted bearer tokens, stored as SHA-256 digests
    pub tokens: Vec<TokenConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tokens: Vec::new(),
        }
    }
}

/// One accepted bearer token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Principal identifier the token authenticates as
    pub principal: String,

    /// Lowercase hex SHA-256 digest of the token
    pub sha256: String,
}

/// Model override for one analysis category
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Category name (sentiment, entities, emotion, intent)
    pub category: String,

    /// Hub model identifier
    pub model_id: String,

    /// Task kind (defaults to the category's usual task)
    #[serde(default)]
    pub task: Option<String>,

    /// Serialize invocations through a per-slot lock
    #[serde(default)]
    pub serialize_invocations: bool,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject values that cannot produce a working service
    pub fn validate(&self) -> Result<()> {
        if self.analysis.max_text_length == 0 {
            return Err(Error::Config(
                "analysis.max_text_length must be greater than 0".to_string(),
            ));
        }
        if self.analysis.request_timeout_ms == 0 {
            return Err(Error::Config(
                "analysis.request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.bootstrap.load_timeout_secs == Some(0) {
            return Err(Error::Config(
                "bootstrap.load_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the hub access token
    ///
    /// **Priority:** ENV → TOML. Blank values are ignored.
    pub fn resolve_hub_token(&self) -> Option<String> {
        let env_token = std::env::var(HUB_TOKEN_ENV_VAR)
            .ok()
            .filter(|t| is_valid_token(t));
        let toml_token = self.hub.token.clone().filter(|t| is_valid_token(t));

        match (env_token, toml_token) {
            (Some(env), Some(_)) => {
                warn!(
                    "Hub token found in both {} and TOML config. Using environment (highest priority).",
                    HUB_TOKEN_ENV_VAR
                );
                Some(env)
            }
            (Some(env), None) => {
                info!("Hub token loaded from environment variable");
                Some(env)
            }
            (None, Some(toml)) => {
                info!("Hub token loaded from TOML config");
                Some(toml)
            }
            (None, None) => None,
        }
    }
}

/// Validate token text (non-empty, non-whitespace)
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserConfig(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// File path backing this source, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::UserConfig(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

/// Config file resolver following the documented priority order
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Determine which config source applies
    ///
    /// Explicit paths (CLI, environment) are returned even if the file is
    /// missing so that `load` can report them. The user config file is only
    /// chosen when it exists.
    pub fn resolve(&self) -> ConfigSource {
        if let Some(path) = &self.cli_path {
            return ConfigSource::CommandLine(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return ConfigSource::UserConfig(path);
            }
        }

        ConfigSource::Defaults
    }

    /// Load the effective configuration
    ///
    /// A missing file falls back to defaults (callers report it through the
    /// returned source). A file that exists but cannot be parsed is an error.
    pub fn load(&self) -> Result<(TomlConfig, ConfigSource)> {
        let source = self.resolve();
        let config = match source.path() {
            Some(path) if path.exists() => TomlConfig::load(path)?,
            _ => TomlConfig::default(),
        };
        Ok((config, source))
    }
}

/// Platform user config location: `<config dir>/textsense/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("textsense").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = TomlConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.analysis.max_text_length, 5000);
        assert_eq!(config.analysis.request_timeout_ms, 30_000);
        assert!(!config.bootstrap.require_all_ready);
        assert!(config.auth.enabled);
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            port = 9000

            [analysis]
            max_text_length = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.analysis.max_text_length, 100);
        assert_eq!(config.analysis.request_timeout_ms, 30_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_model_overrides_parse() {
        let config = TomlConfig::from_toml_str(
            r#"
            [[models]]
            category = "sentiment"
            model_id = "org/custom-sst2"

            [[models]]
            category = "intent"
            model_id = "org/intent"
            task = "text-classification"
            serialize_invocations = true
            "#,
        )
        .unwrap();

        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0].task, None);
        assert!(!config.models[0].serialize_invocations);
        assert_eq!(config.models[1].task.as_deref(), Some("text-classification"));
        assert!(config.models[1].serialize_invocations);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = TomlConfig::from_toml_str("[analysis]\nmax_text_length = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = TomlConfig::from_toml_str("[bootstrap]\nload_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(TomlConfig::from_toml_str("port = \"not a number\"").is_err());
    }

    #[test]
    fn test_is_valid_token() {
        assert!(is_valid_token("hf_abc"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("   "));
    }
}
