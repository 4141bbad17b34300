//! Reminder types
//!
//! A reminder is one scheduled delivery of a step for one booking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::workflow::WorkflowAction;
use super::{BookingId, EventTypeId, StepId};
use crate::impl_domain_status_conversions;

/// Transport used to deliver a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryChannel {
    Email,
    Sms,
    Whatsapp,
}

impl_domain_status_conversions!(DeliveryChannel {
    Email => "email",
    Sms => "sms",
    Whatsapp => "whatsapp",
});

impl From<WorkflowAction> for DeliveryChannel {
    fn from(action: WorkflowAction) -> Self {
        if action.is_sms() {
            Self::Sms
        } else if action.is_whatsapp() {
            Self::Whatsapp
        } else {
            Self::Email
        }
    }
}

/// Local state of a reminder record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderStatus {
    /// Registered with the provider.
    Scheduled,
    /// Provider registration failed; kept for an external retry sweep.
    DeliveryFailed,
}

impl_domain_status_conversions!(ReminderStatus {
    Scheduled => "scheduled",
    DeliveryFailed => "delivery_failed",
});

/// Persisted reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReminder {
    pub id: Uuid,
    pub step_id: StepId,
    pub booking_id: BookingId,
    /// Event type of the booking at schedule time.
    pub booking_event_type_id: Option<EventTypeId>,
    pub channel: DeliveryChannel,
    pub recipient: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: ReminderStatus,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowReminder {
    /// Only scheduled, not-yet-fired reminders hold a provider delivery.
    pub fn has_pending_delivery(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Scheduled
            && self.provider_reference.is_some()
            && self.scheduled_for > now
    }
}

/// Delivery request handed to the notification provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledDelivery {
    pub reminder_id: Uuid,
    pub channel: DeliveryChannel,
    pub recipient: String,
    pub sender: String,
    pub subject: Option<String>,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    pub include_calendar_event: bool,
}
