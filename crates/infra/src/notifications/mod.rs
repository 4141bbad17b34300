//! Notification provider adapters

pub mod http_provider;
pub mod local;

use std::sync::Arc;

use slotflow_core::workflows::NotificationProvider;
use slotflow_domain::{NotificationConfig, Result};

pub use http_provider::HttpNotificationProvider;
pub use local::LogOnlyNotificationProvider;

/// HTTP provider when an endpoint is configured, log-only otherwise.
pub fn provider_from_config(config: &NotificationConfig) -> Result<Arc<dyn NotificationProvider>> {
    Ok(match HttpNotificationProvider::from_config(config)? {
        Some(provider) => Arc::new(provider),
        None => {
            tracing::warn!("SLOTFLOW_NOTIFICATIONS_ENDPOINT not set; deliveries are logged only");
            Arc::new(LogOnlyNotificationProvider)
        }
    })
}
