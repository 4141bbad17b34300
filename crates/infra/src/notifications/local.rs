//! Provider used when no delivery endpoint is configured.

use async_trait::async_trait;
use slotflow_core::workflows::NotificationProvider;
use slotflow_domain::{Result, ScheduledDelivery};
use tracing::info;

/// Records deliveries in the log only. References are derived from the
/// reminder id so cancelling is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyNotificationProvider;

#[async_trait]
impl NotificationProvider for LogOnlyNotificationProvider {
    async fn schedule(&self, delivery: &ScheduledDelivery) -> Result<String> {
        info!(
            reminder_id = %delivery.reminder_id,
            channel = %delivery.channel,
            fire_at = %delivery.fire_at,
            "no delivery endpoint configured; reminder recorded locally"
        );
        Ok(format!("local-{}", delivery.reminder_id))
    }

    async fn cancel(&self, provider_reference: &str) -> Result<()> {
        info!(reference = provider_reference, "local delivery cancelled");
        Ok(())
    }
}
