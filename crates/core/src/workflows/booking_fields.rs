//! Booking-field synchronizer for the SMS reminder number field

use std::sync::Arc;

use futures::future::join_all;
use slotflow_domain::{EventTypeId, Result, StepContent, WorkflowId};
use tracing::debug;

use super::ports::BookingFieldRepository;

/// What the workflow needs from the booking form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsFieldRequirement {
    /// No attendee-direct SMS/WhatsApp step: the workflow is not a source.
    Absent,
    Optional,
    Required,
}

impl SmsFieldRequirement {
    pub fn from_steps<'a>(steps: impl IntoIterator<Item = &'a StepContent>) -> Self {
        let mut requirement = Self::Absent;
        for step in steps {
            if !step.action.is_attendee_direct() {
                continue;
            }
            if step.number_required {
                return Self::Required;
            }
            requirement = Self::Optional;
        }
        requirement
    }
}

pub struct BookingFieldSynchronizer {
    fields: Arc<dyn BookingFieldRepository>,
}

impl BookingFieldSynchronizer {
    pub fn new(fields: Arc<dyn BookingFieldRepository>) -> Self {
        Self { fields }
    }

    /// Make the workflow's contribution to every active event type match
    /// `steps`, and withdraw it from every removed one.
    pub async fn sync(
        &self,
        workflow_id: WorkflowId,
        active: &[EventTypeId],
        removed: &[EventTypeId],
        steps: &[StepContent],
    ) -> Result<()> {
        let requirement = SmsFieldRequirement::from_steps(steps);
        debug!(workflow_id, ?requirement, "Syncing SMS reminder booking field");

        let updates = active.iter().map(|&event_type_id| async move {
            match requirement {
                SmsFieldRequirement::Absent => {
                    self.fields.remove_sms_reminder_field(event_type_id, workflow_id).await
                }
                SmsFieldRequirement::Optional | SmsFieldRequirement::Required => {
                    self.fields
                        .upsert_sms_reminder_field(
                            event_type_id,
                            workflow_id,
                            requirement == SmsFieldRequirement::Required,
                        )
                        .await
                }
            }
        });
        let removals = removed
            .iter()
            .map(|&event_type_id| self.fields.remove_sms_reminder_field(event_type_id, workflow_id));

        let (updated, removed) = futures::join!(join_all(updates), join_all(removals));
        updated.into_iter().chain(removed).collect::<Result<Vec<()>>>()?;
        Ok(())
    }
}
