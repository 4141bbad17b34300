//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `SLOTFLOW_DB_PATH` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `SLOTFLOW_DB_PATH`: Database file path (required)
//! - `SLOTFLOW_DB_POOL_SIZE`: Connection pool size
//! - `SLOTFLOW_NOTIFICATIONS_ENDPOINT`: Base URL of the delivery provider
//! - `SLOTFLOW_NOTIFICATIONS_API_TOKEN`: Bearer token for the provider
//! - `SLOTFLOW_NOTIFICATIONS_TIMEOUT_SECS`: Per-request timeout
//! - `SLOTFLOW_NOTIFICATIONS_MAX_ATTEMPTS`: Attempts per provider call
//! - `SLOTFLOW_DEFAULT_SENDER_ID`: SMS/WhatsApp sender fallback
//! - `SLOTFLOW_DEFAULT_SENDER_NAME`: Email sender name fallback
//! - `SLOTFLOW_SELF_HOSTED`: Unlock plan-gated actions (true/false)
//!
//! ## File Locations
//! The loader probes `config.{json,toml}` and `slotflow.{json,toml}` in the
//! current working directory, its parent and grandparent, then the same
//! names next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use slotflow_domain::{
    Config, DatabaseConfig, DeploymentConfig, NotificationConfig, Result, SlotflowError,
};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["config.json", "config.toml", "slotflow.json", "slotflow.toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `SlotflowError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `SLOTFLOW_DB_PATH` is required; everything else falls back to the
/// defaults of [`Config`].
///
/// # Errors
/// Returns `SlotflowError::Config` if the path is missing or a value does
/// not parse.
pub fn load_from_env() -> Result<Config> {
    let defaults = NotificationConfig::default();

    let database = DatabaseConfig {
        path: env_var("SLOTFLOW_DB_PATH")?,
        pool_size: env_parse("SLOTFLOW_DB_POOL_SIZE")?
            .unwrap_or(slotflow_domain::constants::DEFAULT_POOL_SIZE),
    };

    let notifications = NotificationConfig {
        endpoint: env_opt("SLOTFLOW_NOTIFICATIONS_ENDPOINT"),
        api_token: env_opt("SLOTFLOW_NOTIFICATIONS_API_TOKEN"),
        timeout_secs: env_parse("SLOTFLOW_NOTIFICATIONS_TIMEOUT_SECS")?
            .unwrap_or(defaults.timeout_secs),
        max_attempts: env_parse("SLOTFLOW_NOTIFICATIONS_MAX_ATTEMPTS")?
            .unwrap_or(defaults.max_attempts),
        default_sender_id: env_opt("SLOTFLOW_DEFAULT_SENDER_ID")
            .unwrap_or(defaults.default_sender_id),
        default_sender_name: env_opt("SLOTFLOW_DEFAULT_SENDER_NAME")
            .unwrap_or(defaults.default_sender_name),
    };

    let deployment = DeploymentConfig { self_hosted: env_bool("SLOTFLOW_SELF_HOSTED", false) };

    Ok(Config { database, notifications, deployment })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. The format is picked
/// by extension.
///
/// # Errors
/// Returns `SlotflowError::Config` if no file is found, it cannot be read,
/// or it does not parse.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.exists() => p,
        Some(p) => {
            return Err(SlotflowError::Config(format!("Config file not found: {}", p.display())));
        }
        None => probe_config_paths().ok_or_else(|| {
            SlotflowError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SlotflowError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SlotflowError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SlotflowError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SlotflowError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|candidate| candidate.is_file())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SlotflowError::Config(format!("Missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| SlotflowError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
/// (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
