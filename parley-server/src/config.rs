//! Configuration system for the Parley server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/parley/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::completion::LlmConfig;

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A value was present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    llm: LlmFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    state_file: Option<PathBuf>,
    admin_identity: Option<String>,
}

/// `[llm]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LlmFileConfig {
    backend_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    request_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Parley chat and task server")]
pub struct CliArgs {
    /// Address to bind the HTTP server to.
    #[arg(short, long, env = "PARLEY_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/parley/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where state is saved at shutdown and restored from at startup.
    #[arg(long, env = "PARLEY_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Identity allowed to authorize other callers.
    #[arg(long, env = "PARLEY_ADMIN")]
    pub admin_identity: Option<String>,

    /// Base URL of the text generation backend.
    #[arg(long, env = "PARLEY_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Model name sent to the backend.
    #[arg(long)]
    pub model: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "PARLEY_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Snapshot file used across restarts.
    pub state_file: PathBuf,
    /// Root of trust for authorization grants.
    pub admin_identity: String,
    /// Base URL of the generation backend.
    pub backend_url: String,
    /// Generation parameters shared by every call.
    pub llm: LlmConfig,
    /// Upper bound on a single backend call.
    pub request_timeout: Duration,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            state_file: PathBuf::from("parley-state.bin"),
            admin_identity: "parley-admin".to_string(),
            backend_url: "http://127.0.0.1:11434".to_string(),
            llm: LlmConfig::default(),
            request_timeout: Duration::from_secs(60),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read or
    /// parsed, or if a resolved value is out of range.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        let config = Self::resolve(cli, &file);
        config.validate()?;
        Ok(config)
    }

    /// Resolve a `ServerConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            state_file: cli
                .state_file
                .clone()
                .or_else(|| file.server.state_file.clone())
                .unwrap_or(defaults.state_file),
            admin_identity: cli
                .admin_identity
                .clone()
                .or_else(|| file.server.admin_identity.clone())
                .unwrap_or(defaults.admin_identity),
            backend_url: cli
                .backend_url
                .clone()
                .or_else(|| file.llm.backend_url.clone())
                .unwrap_or(defaults.backend_url),
            llm: LlmConfig {
                model: cli
                    .model
                    .clone()
                    .or_else(|| file.llm.model.clone())
                    .unwrap_or(defaults.llm.model),
                max_tokens: file.llm.max_tokens.unwrap_or(defaults.llm.max_tokens),
                temperature: file.llm.temperature.unwrap_or(defaults.llm.temperature),
                top_p: file.llm.top_p.unwrap_or(defaults.llm.top_p),
            },
            request_timeout: file
                .llm
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            log_level: cli.log_level.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_identity.is_empty() {
            return Err(ConfigError::Invalid("admin_identity must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside 0.0..=2.0",
                self.llm.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.llm.top_p) {
            return Err(ConfigError::Invalid(format!(
                "top_p {} outside 0.0..=1.0",
                self.llm.top_p
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("parley").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
