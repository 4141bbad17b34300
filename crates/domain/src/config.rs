//! Application configuration structures

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_NOTIFICATION_MAX_ATTEMPTS, DEFAULT_NOTIFICATION_TIMEOUT_SECS, DEFAULT_POOL_SIZE,
    DEFAULT_SENDER_ID, DEFAULT_SENDER_NAME,
};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

/// SQLite database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Notification provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Base URL of the delivery provider. `None` disables remote delivery
    /// and reminders are recorded locally only.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Alphanumeric sender id used for SMS/WhatsApp when a step has none.
    #[serde(default = "default_sender_id")]
    pub default_sender_id: String,
    /// Display name used for email when a step has none.
    #[serde(default = "default_sender_name")]
    pub default_sender_name: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_token: None,
            timeout_secs: DEFAULT_NOTIFICATION_TIMEOUT_SECS,
            max_attempts: DEFAULT_NOTIFICATION_MAX_ATTEMPTS,
            default_sender_id: DEFAULT_SENDER_ID.to_string(),
            default_sender_name: DEFAULT_SENDER_NAME.to_string(),
        }
    }
}

/// Deployment-wide settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Self-hosted deployments unlock every plan-gated action.
    #[serde(default)]
    pub self_hosted: bool,
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_NOTIFICATION_TIMEOUT_SECS
}

fn default_max_attempts() -> usize {
    DEFAULT_NOTIFICATION_MAX_ATTEMPTS
}

fn default_sender_id() -> String {
    DEFAULT_SENDER_ID.to_string()
}

fn default_sender_name() -> String {
    DEFAULT_SENDER_NAME.to_string()
}
