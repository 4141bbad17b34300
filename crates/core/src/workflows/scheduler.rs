//! Reminder scheduler
//!
//! Turns (booking, step) pairs into provider deliveries plus reminder
//! records. Only offset triggers schedule at edit time; event-driven
//! triggers are dispatched by the booking lifecycle. Attendee-direct
//! SMS/WhatsApp steps are scheduled when the attendee's number is collected
//! at booking time, never by a workflow edit.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use slotflow_domain::{
    Booking, DeliveryChannel, ReminderStatus, Result, ScheduledDelivery, StepContent,
    WorkflowAction, WorkflowReminder, WorkflowStep, WorkflowTrigger,
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::ports::{NotificationProvider, ReminderRepository};

/// Sender values used when a step leaves them blank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderDefaults {
    /// Alphanumeric id for SMS/WhatsApp.
    pub sender_id: String,
    /// Display name for email.
    pub sender_name: String,
}

/// Workflow timing applied to every pair in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub trigger: WorkflowTrigger,
    pub offset: Option<Duration>,
}

impl Timing {
    /// Fire time for `booking`, or `None` for event-driven triggers and
    /// incomplete offsets.
    pub fn fire_time(&self, booking: &Booking) -> Option<DateTime<Utc>> {
        let offset = self.offset?;
        match self.trigger {
            WorkflowTrigger::BeforeEvent => booking.start_time.checked_sub_signed(offset),
            WorkflowTrigger::AfterEvent => booking.end_time.checked_add_signed(offset),
            _ => None,
        }
    }

    pub fn schedules_on_edit(&self) -> bool {
        self.trigger.is_offset_based() && self.offset.is_some()
    }
}

/// Outcome of a scheduling batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReport {
    pub scheduled: usize,
    /// Persisted as `DELIVERY_FAILED`.
    pub failed: usize,
    pub skipped: usize,
}

impl ScheduleReport {
    pub fn merge(&mut self, other: ScheduleReport) {
        self.scheduled += other.scheduled;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

enum PairOutcome {
    Scheduled,
    Failed,
}

/// Schedules reminders with the notification provider
pub struct ReminderScheduler {
    reminders: Arc<dyn ReminderRepository>,
    provider: Arc<dyn NotificationProvider>,
    defaults: SenderDefaults,
}

impl ReminderScheduler {
    pub fn new(
        reminders: Arc<dyn ReminderRepository>,
        provider: Arc<dyn NotificationProvider>,
        defaults: SenderDefaults,
    ) -> Self {
        Self { reminders, provider, defaults }
    }

    pub fn defaults(&self) -> &SenderDefaults {
        &self.defaults
    }

    /// Schedule every eligible (booking, step) pair concurrently.
    ///
    /// Pairs are skipped when the booking no longer accrues reminders, the
    /// step is attendee-direct, the fire time has passed, or no recipient
    /// resolves. A provider rejection is recorded on the reminder instead of
    /// failing the batch; store failures fail it once every pair settled.
    pub async fn schedule(
        &self,
        bookings: &[Booking],
        steps: &[WorkflowStep],
        timing: Timing,
        now: DateTime<Utc>,
    ) -> Result<ScheduleReport> {
        let mut report = ScheduleReport::default();
        if !timing.schedules_on_edit() {
            return Ok(report);
        }

        let mut pending = Vec::new();
        for booking in bookings {
            for step in steps {
                match self.plan(booking, step, timing, now) {
                    Some((reminder, delivery)) => pending.push(self.register(reminder, delivery)),
                    None => report.skipped += 1,
                }
            }
        }

        for outcome in join_all(pending).await {
            match outcome? {
                PairOutcome::Scheduled => report.scheduled += 1,
                PairOutcome::Failed => report.failed += 1,
            }
        }
        Ok(report)
    }

    fn plan(
        &self,
        booking: &Booking,
        step: &WorkflowStep,
        timing: Timing,
        now: DateTime<Utc>,
    ) -> Option<(WorkflowReminder, ScheduledDelivery)> {
        let content = &step.content;
        if content.action.is_attendee_direct() || !booking.accrues_reminders(now) {
            return None;
        }
        let fire_at = timing.fire_time(booking).filter(|fire_at| *fire_at > now)?;
        let Some(recipient) = resolve_recipient(content, booking) else {
            debug!(booking_id = booking.id, step_id = step.id, "No recipient for reminder");
            return None;
        };

        let channel = DeliveryChannel::from(content.action);
        let reminder = WorkflowReminder {
            id: Uuid::now_v7(),
            step_id: step.id,
            booking_id: booking.id,
            booking_event_type_id: booking.event_type_id,
            channel,
            recipient: recipient.clone(),
            scheduled_for: fire_at,
            status: ReminderStatus::Scheduled,
            provider_reference: None,
            failure_reason: None,
            created_at: now,
        };
        let delivery = ScheduledDelivery {
            reminder_id: reminder.id,
            channel,
            recipient,
            sender: resolve_sender(content, &self.defaults),
            subject: match channel {
                DeliveryChannel::Email => Some(render(
                    content.email_subject.as_deref().unwrap_or(DEFAULT_SUBJECT),
                    booking,
                )),
                _ => None,
            },
            body: render(content.reminder_body.as_deref().unwrap_or(DEFAULT_BODY), booking),
            fire_at,
            include_calendar_event: content.include_calendar_event,
        };
        Some((reminder, delivery))
    }

    async fn register(
        &self,
        mut reminder: WorkflowReminder,
        delivery: ScheduledDelivery,
    ) -> Result<PairOutcome> {
        let outcome = match self.provider.schedule(&delivery).await {
            Ok(reference) => {
                reminder.provider_reference = Some(reference);
                PairOutcome::Scheduled
            }
            Err(err) => {
                warn!(
                    reminder_id = %reminder.id,
                    booking_id = reminder.booking_id,
                    step_id = reminder.step_id,
                    error = %err,
                    "Provider rejected delivery; recording reminder as failed"
                );
                reminder.status = ReminderStatus::DeliveryFailed;
                reminder.failure_reason = Some(err.to_string());
                PairOutcome::Failed
            }
        };
        self.reminders.insert(&reminder).await?;
        Ok(outcome)
    }
}

const DEFAULT_SUBJECT: &str = "Reminder: {EVENT_NAME}";
const DEFAULT_BODY: &str = "Reminder: {EVENT_NAME} on {EVENT_DATE}.";

/// Where a step's message goes for a booking.
pub fn resolve_recipient(content: &StepContent, booking: &Booking) -> Option<String> {
    let recipient = match content.action {
        WorkflowAction::EmailHost => booking.organizer_email.clone(),
        WorkflowAction::EmailAttendee => booking.attendees.first().map(|a| a.email.clone()),
        WorkflowAction::EmailAddress
        | WorkflowAction::SmsNumber
        | WorkflowAction::WhatsappNumber => content.send_to.clone(),
        WorkflowAction::SmsAttendee | WorkflowAction::WhatsappAttendee => {
            booking.sms_reminder_number.clone()
        }
    };
    recipient.filter(|value| !value.trim().is_empty())
}

/// Sender shown to the recipient.
pub fn resolve_sender(content: &StepContent, defaults: &SenderDefaults) -> String {
    let (value, fallback) = if content.action.is_sms_or_whatsapp() {
        (content.sender.as_deref(), &defaults.sender_id)
    } else {
        (content.sender_name.as_deref(), &defaults.sender_name)
    };
    value.filter(|value| !value.trim().is_empty()).unwrap_or(fallback).to_string()
}

/// Substitute booking placeholders.
pub fn render(template: &str, booking: &Booking) -> String {
    let attendee = booking.attendees.first().map(|a| a.name.as_str()).unwrap_or_default();
    template
        .replace("{EVENT_NAME}", &booking.title)
        .replace("{EVENT_DATE}", &booking.start_time.format("%Y-%m-%d %H:%M UTC").to_string())
        .replace("{ORGANIZER_EMAIL}", booking.organizer_email.as_deref().unwrap_or_default())
        .replace("{ATTENDEE_NAME}", attendee)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use slotflow_domain::{Attendee, BookingStatus, WorkflowTemplate};

    use super::*;

    fn booking() -> Booking {
        Booking {
            id: 7,
            uid: "bk-7".into(),
            title: "Intro call".into(),
            event_type_id: Some(1),
            user_id: Some(3),
            organizer_email: Some("host@example.com".into()),
            start_time: Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2030, 5, 1, 10, 30, 0).unwrap(),
            status: BookingStatus::Accepted,
            attendees: vec![Attendee {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                time_zone: "Europe/London".into(),
            }],
            sms_reminder_number: None,
        }
    }

    fn content(action: WorkflowAction) -> StepContent {
        StepContent {
            action,
            step_number: 1,
            send_to: Some("+15550100".into()),
            reminder_body: None,
            email_subject: None,
            template: WorkflowTemplate::Reminder,
            number_required: false,
            sender: None,
            sender_name: None,
            include_calendar_event: false,
        }
    }

    #[test]
    fn before_and_after_offsets_anchor_on_start_and_end() {
        let booking = booking();
        let before = Timing { trigger: WorkflowTrigger::BeforeEvent, offset: Some(Duration::hours(1)) };
        let after = Timing { trigger: WorkflowTrigger::AfterEvent, offset: Some(Duration::minutes(15)) };

        assert_eq!(before.fire_time(&booking), Some(Utc.with_ymd_and_hms(2030, 5, 1, 9, 0, 0).unwrap()));
        assert_eq!(after.fire_time(&booking), Some(Utc.with_ymd_and_hms(2030, 5, 1, 10, 45, 0).unwrap()));

        let new_event = Timing { trigger: WorkflowTrigger::NewEvent, offset: None };
        assert_eq!(new_event.fire_time(&booking), None);
        assert!(!new_event.schedules_on_edit());
    }

    #[test]
    fn recipients_follow_the_action() {
        let mut booking = booking();
        assert_eq!(
            resolve_recipient(&content(WorkflowAction::EmailHost), &booking).as_deref(),
            Some("host@example.com")
        );
        assert_eq!(
            resolve_recipient(&content(WorkflowAction::EmailAttendee), &booking).as_deref(),
            Some("ada@example.com")
        );
        assert_eq!(
            resolve_recipient(&content(WorkflowAction::SmsNumber), &booking).as_deref(),
            Some("+15550100")
        );
        assert_eq!(resolve_recipient(&content(WorkflowAction::SmsAttendee), &booking), None);

        booking.sms_reminder_number = Some("+15550199".into());
        assert_eq!(
            resolve_recipient(&content(WorkflowAction::WhatsappAttendee), &booking).as_deref(),
            Some("+15550199")
        );
    }

    #[test]
    fn sender_falls_back_per_channel() {
        let defaults = SenderDefaults { sender_id: "SLOTS".into(), sender_name: "Slots Team".into() };
        assert_eq!(resolve_sender(&content(WorkflowAction::SmsNumber), &defaults), "SLOTS");
        assert_eq!(resolve_sender(&content(WorkflowAction::EmailHost), &defaults), "Slots Team");

        let mut custom = content(WorkflowAction::EmailAddress);
        custom.sender_name = Some("Front desk".into());
        assert_eq!(resolve_sender(&custom, &defaults), "Front desk");
    }

    #[test]
    fn placeholders_are_substituted() {
        let rendered = render("Hi {ATTENDEE_NAME}, {EVENT_NAME} is at {EVENT_DATE}", &booking());
        assert_eq!(rendered, "Hi Ada, Intro call is at 2030-05-01 10:00 UTC");
    }
}
