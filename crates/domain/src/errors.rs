//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Slotflow
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SlotflowError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Acting user lacks rights, a step points at a foreign workflow, or a
    /// plan requirement is unmet.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Optimistic version check failed.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Notification provider rejected or could not register a delivery.
    #[error("Provider delivery failure: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlotflowError {
    /// Stable, low-cardinality label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::Provider(_) => "provider",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for Slotflow operations
pub type Result<T> = std::result::Result<T, SlotflowError>;
