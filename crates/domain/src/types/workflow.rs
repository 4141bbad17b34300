//! Workflow, step and active-on target types

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::team::TeamRef;
use super::{EventTypeId, StepId, TeamId, UserId, WorkflowId};
use crate::constants::UNPERSISTED_STEP_ID_MAX;
use crate::impl_domain_status_conversions;

/// Booking lifecycle event that arms a workflow's steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowTrigger {
    BeforeEvent,
    AfterEvent,
    NewEvent,
    EventCancelled,
    RescheduleEvent,
}

impl_domain_status_conversions!(WorkflowTrigger {
    BeforeEvent => "before_event",
    AfterEvent => "after_event",
    NewEvent => "new_event",
    EventCancelled => "event_cancelled",
    RescheduleEvent => "reschedule_event",
});

impl WorkflowTrigger {
    /// Offset triggers fire relative to the booking's start or end time;
    /// every other trigger is dispatched by the booking lifecycle itself.
    pub fn is_offset_based(self) -> bool {
        matches!(self, Self::BeforeEvent | Self::AfterEvent)
    }
}

/// Unit of a workflow's timing offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Day,
    Hour,
    Minute,
}

impl_domain_status_conversions!(TimeUnit {
    Day => "day",
    Hour => "hour",
    Minute => "minute",
});

impl TimeUnit {
    /// Convert `value` units into a duration. `None` on overflow.
    pub fn duration(self, value: i64) -> Option<Duration> {
        match self {
            Self::Day => Duration::try_days(value),
            Self::Hour => Duration::try_hours(value),
            Self::Minute => Duration::try_minutes(value),
        }
    }
}

/// What a step does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAction {
    EmailHost,
    EmailAttendee,
    EmailAddress,
    SmsAttendee,
    SmsNumber,
    WhatsappAttendee,
    WhatsappNumber,
}

impl_domain_status_conversions!(WorkflowAction {
    EmailHost => "email_host",
    EmailAttendee => "email_attendee",
    EmailAddress => "email_address",
    SmsAttendee => "sms_attendee",
    SmsNumber => "sms_number",
    WhatsappAttendee => "whatsapp_attendee",
    WhatsappNumber => "whatsapp_number",
});

impl WorkflowAction {
    pub fn is_sms(self) -> bool {
        matches!(self, Self::SmsAttendee | Self::SmsNumber)
    }

    pub fn is_whatsapp(self) -> bool {
        matches!(self, Self::WhatsappAttendee | Self::WhatsappNumber)
    }

    /// Plan-gated actions.
    pub fn is_sms_or_whatsapp(self) -> bool {
        self.is_sms() || self.is_whatsapp()
    }

    /// SMS/WhatsApp sent to the attendee's own number. These follow the
    /// booking rather than the workflow edit.
    pub fn is_attendee_direct(self) -> bool {
        matches!(self, Self::SmsAttendee | Self::WhatsappAttendee)
    }

    /// Actions that deliver to the fixed `send_to` address or number of the
    /// step.
    pub fn requires_send_to(self) -> bool {
        matches!(self, Self::EmailAddress | Self::SmsNumber | Self::WhatsappNumber)
    }
}

/// Message template a step was created from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowTemplate {
    #[default]
    Reminder,
    Custom,
    Rating,
    ThankYou,
}

impl_domain_status_conversions!(WorkflowTemplate {
    Reminder => "reminder",
    Custom => "custom",
    Rating => "rating",
    ThankYou => "thank_you",
});

/// User-editable content of a step. Two steps with equal content produce
/// identical reminders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepContent {
    pub action: WorkflowAction,
    pub step_number: i32,
    #[serde(default)]
    pub send_to: Option<String>,
    #[serde(default)]
    pub reminder_body: Option<String>,
    #[serde(default)]
    pub email_subject: Option<String>,
    #[serde(default)]
    pub template: WorkflowTemplate,
    #[serde(default)]
    pub number_required: bool,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub include_calendar_event: bool,
}

/// A persisted workflow step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub id: StepId,
    pub workflow_id: WorkflowId,
    #[serde(flatten)]
    pub content: StepContent,
    #[serde(default)]
    pub number_verification_pending: bool,
}

/// A step as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInput {
    pub id: StepId,
    pub workflow_id: WorkflowId,
    #[serde(flatten)]
    pub content: StepContent,
}

impl StepInput {
    /// Placeholder ids mark steps that do not exist yet.
    pub fn is_new(&self) -> bool {
        self.id <= UNPERSISTED_STEP_ID_MAX
    }
}

/// Association between a workflow and what it applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ActiveOnTarget {
    EventType(EventTypeId),
    Team(TeamId),
}

impl ActiveOnTarget {
    pub fn id(self) -> i64 {
        match self {
            Self::EventType(id) | Self::Team(id) => id,
        }
    }
}

/// How a workflow's active-on ids are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowScope {
    /// Personal or team workflow: targets are event types and their
    /// managed children.
    EventTypeScoped,
    /// Organization workflow: targets are teams of the organization.
    TeamScoped { organization_id: TeamId },
}

impl WorkflowScope {
    /// Interpret a raw submitted id under this scope.
    pub fn target(self, id: i64) -> ActiveOnTarget {
        match self {
            Self::EventTypeScoped => ActiveOnTarget::EventType(id),
            Self::TeamScoped { .. } => ActiveOnTarget::Team(id),
        }
    }
}

/// A workflow with its steps and active-on associations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub user_id: Option<UserId>,
    pub team: Option<TeamRef>,
    pub trigger: WorkflowTrigger,
    pub time: Option<i64>,
    pub time_unit: Option<TimeUnit>,
    pub is_active_on_all: bool,
    pub version: i64,
    /// Ordered by `step_number`.
    pub steps: Vec<WorkflowStep>,
    pub active_on: Vec<ActiveOnTarget>,
}

impl Workflow {
    pub fn team_id(&self) -> Option<TeamId> {
        self.team.as_ref().map(|team| team.id)
    }

    pub fn scope(&self) -> WorkflowScope {
        match &self.team {
            Some(team) if team.is_organization => {
                WorkflowScope::TeamScoped { organization_id: team.id }
            }
            _ => WorkflowScope::EventTypeScoped,
        }
    }

    /// Timing offset, when trigger, time and unit form a valid one.
    pub fn offset(&self) -> Option<Duration> {
        timing_offset(self.trigger, self.time, self.time_unit)
    }
}

/// Update request for an existing workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowUpdate {
    pub id: WorkflowId,
    pub name: String,
    /// Event type ids, or team ids for organization workflows.
    #[serde(default)]
    pub active_on: Vec<i64>,
    #[serde(default)]
    pub steps: Vec<StepInput>,
    pub trigger: WorkflowTrigger,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub time_unit: Option<TimeUnit>,
    #[serde(default)]
    pub is_active_on_all: bool,
    /// Version the caller last read. Stale versions are rejected.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl WorkflowUpdate {
    pub fn offset(&self) -> Option<Duration> {
        timing_offset(self.trigger, self.time, self.time_unit)
    }
}

fn timing_offset(
    trigger: WorkflowTrigger,
    time: Option<i64>,
    unit: Option<TimeUnit>,
) -> Option<Duration> {
    if !trigger.is_offset_based() {
        return None;
    }
    match (time, unit) {
        (Some(value), Some(unit)) if value >= 0 => unit.duration(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_content() -> StepContent {
        StepContent {
            action: WorkflowAction::EmailHost,
            step_number: 1,
            send_to: None,
            reminder_body: Some("See you soon".into()),
            email_subject: Some("Reminder".into()),
            template: WorkflowTemplate::Reminder,
            number_required: false,
            sender: None,
            sender_name: None,
            include_calendar_event: false,
        }
    }

    #[test]
    fn attendee_direct_actions_are_plan_gated() {
        for action in [WorkflowAction::SmsAttendee, WorkflowAction::WhatsappAttendee] {
            assert!(action.is_attendee_direct());
            assert!(action.is_sms_or_whatsapp());
            assert!(!action.requires_send_to());
        }
        assert!(!WorkflowAction::EmailAttendee.is_attendee_direct());
        assert!(WorkflowAction::SmsNumber.requires_send_to());
    }

    #[test]
    fn offset_requires_offset_trigger_and_complete_timing() {
        assert_eq!(
            timing_offset(WorkflowTrigger::BeforeEvent, Some(2), Some(TimeUnit::Hour)),
            Some(Duration::hours(2))
        );
        assert_eq!(timing_offset(WorkflowTrigger::NewEvent, Some(2), Some(TimeUnit::Hour)), None);
        assert_eq!(timing_offset(WorkflowTrigger::AfterEvent, None, Some(TimeUnit::Day)), None);
        assert_eq!(timing_offset(WorkflowTrigger::AfterEvent, Some(-1), Some(TimeUnit::Day)), None);
    }

    #[test]
    fn placeholder_ids_mark_new_steps() {
        let step = StepInput { id: 0, workflow_id: 3, content: email_content() };
        assert!(step.is_new());
        let step = StepInput { id: -4, ..step };
        assert!(step.is_new());
        let step = StepInput { id: 12, ..step };
        assert!(!step.is_new());
    }

    #[test]
    fn organization_team_switches_scope() {
        let mut workflow = Workflow {
            id: 1,
            name: "Reminders".into(),
            user_id: Some(9),
            team: None,
            trigger: WorkflowTrigger::BeforeEvent,
            time: Some(24),
            time_unit: Some(TimeUnit::Hour),
            is_active_on_all: false,
            version: 1,
            steps: Vec::new(),
            active_on: Vec::new(),
        };
        assert_eq!(workflow.scope(), WorkflowScope::EventTypeScoped);

        workflow.team =
            Some(TeamRef { id: 40, slug: Some("acme".into()), name: "Acme".into(), is_organization: true });
        assert_eq!(workflow.scope(), WorkflowScope::TeamScoped { organization_id: 40 });
        assert_eq!(workflow.scope().target(7), ActiveOnTarget::Team(7));
    }

    #[test]
    fn update_request_uses_camel_case_contract() {
        let json = serde_json::json!({
            "id": 5,
            "name": "Follow up",
            "activeOn": [1, 2],
            "steps": [{
                "id": 11,
                "workflowId": 5,
                "action": "SMS_NUMBER",
                "stepNumber": 1,
                "sendTo": "+15550100",
                "numberRequired": true
            }],
            "trigger": "AFTER_EVENT",
            "time": 30,
            "timeUnit": "MINUTE",
            "isActiveOnAll": false
        });

        let update: WorkflowUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(update.active_on, vec![1, 2]);
        assert_eq!(update.steps[0].content.action, WorkflowAction::SmsNumber);
        assert_eq!(update.steps[0].content.template, WorkflowTemplate::Reminder);
        assert_eq!(update.offset(), Some(Duration::minutes(30)));
        assert_eq!(update.expected_version, None);
    }

    #[test]
    fn actions_round_trip_through_column_values() {
        let parsed: WorkflowAction = "whatsapp_attendee".parse().unwrap();
        assert_eq!(parsed, WorkflowAction::WhatsappAttendee);
        assert_eq!(WorkflowTrigger::EventCancelled.to_string(), "event_cancelled");
    }
}
