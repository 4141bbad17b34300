//! Reminder canceller

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use slotflow_domain::{Result, WorkflowReminder};
use tracing::{debug, warn};

use super::ports::{NotificationProvider, ReminderRepository};

/// Outcome of a cancellation batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelReport {
    /// Reminder records deleted.
    pub cancelled: usize,
    /// Provider cancellations that failed; their records were deleted anyway.
    pub provider_errors: usize,
}

impl CancelReport {
    pub fn merge(&mut self, other: CancelReport) {
        self.cancelled += other.cancelled;
        self.provider_errors += other.provider_errors;
    }
}

/// Cancels reminders at the provider and deletes their records
pub struct ReminderCanceller {
    reminders: Arc<dyn ReminderRepository>,
    provider: Arc<dyn NotificationProvider>,
}

impl ReminderCanceller {
    pub fn new(
        reminders: Arc<dyn ReminderRepository>,
        provider: Arc<dyn NotificationProvider>,
    ) -> Self {
        Self { reminders, provider }
    }

    /// Cancel every reminder in `batch` concurrently.
    ///
    /// All cancellations run to completion before returning. A store failure
    /// on any of them fails the batch; provider failures do not.
    pub async fn cancel_all(
        &self,
        batch: Vec<WorkflowReminder>,
        now: DateTime<Utc>,
    ) -> Result<CancelReport> {
        if batch.is_empty() {
            return Ok(CancelReport::default());
        }

        let outcomes = join_all(batch.iter().map(|reminder| self.cancel_one(reminder, now))).await;

        let mut report = CancelReport::default();
        for outcome in outcomes {
            let provider_failed = outcome?;
            report.cancelled += 1;
            if provider_failed {
                report.provider_errors += 1;
            }
        }
        Ok(report)
    }

    /// Returns whether the provider call failed.
    async fn cancel_one(&self, reminder: &WorkflowReminder, now: DateTime<Utc>) -> Result<bool> {
        let mut provider_failed = false;

        match reminder.provider_reference.as_deref() {
            Some(reference) if reminder.has_pending_delivery(now) => {
                if let Err(err) = self.provider.cancel(reference).await {
                    warn!(
                        reminder_id = %reminder.id,
                        booking_id = reminder.booking_id,
                        error = %err,
                        "Provider cancellation failed; deleting reminder record anyway"
                    );
                    provider_failed = true;
                }
            }
            _ => {
                debug!(reminder_id = %reminder.id, "No pending provider delivery to cancel");
            }
        }

        self.reminders.delete(reminder.id).await?;
        Ok(provider_failed)
    }
}
