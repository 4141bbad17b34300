use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use slotflow_core::workflows::{
    ActingUser, ReconcilerSettings, RequestContext, SenderDefaults, UpdateOutcome, WorkflowPorts,
    WorkflowReconciler,
};
use slotflow_domain::{
    ActiveOnTarget, Attendee, Booking, BookingId, BookingStatus, DeliveryChannel, EventType,
    EventTypeId, ReminderStatus, Result as DomainResult, StepContent, StepId, StepInput, TeamId,
    TimeUnit, UserId, Workflow, WorkflowAction, WorkflowId, WorkflowReminder, WorkflowStep,
    WorkflowTemplate, WorkflowTrigger, WorkflowUpdate,
};
use uuid::Uuid;

use super::provider::RecordingProvider;
use super::store::InMemoryStore;

pub const OWNER: UserId = 1;
pub const WORKFLOW_ID: WorkflowId = 1;
pub const E1: EventTypeId = 10;
pub const E2: EventTypeId = 20;
pub const S1: StepId = 101;
pub const S2: StepId = 102;
pub const B1: BookingId = 1;
pub const B2: BookingId = 2;

/// Fixed clock for every test.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

pub fn event_type(id: EventTypeId, owner: Option<UserId>, team_id: Option<TeamId>) -> EventType {
    EventType {
        id,
        title: format!("Event {id}"),
        slug: format!("event-{id}"),
        owner_user_id: owner,
        team_id,
        parent_id: None,
        children: Vec::new(),
    }
}

pub fn booking(id: BookingId, event_type_id: EventTypeId, start: DateTime<Utc>) -> Booking {
    Booking {
        id,
        uid: format!("booking-{id}"),
        title: format!("Meeting {id}"),
        event_type_id: Some(event_type_id),
        user_id: Some(OWNER),
        organizer_email: Some("host@example.com".into()),
        start_time: start,
        end_time: start + Duration::minutes(30),
        status: BookingStatus::Accepted,
        attendees: vec![Attendee {
            name: "Grace".into(),
            email: "grace@example.com".into(),
            time_zone: "UTC".into(),
        }],
        sms_reminder_number: Some("+15550123".into()),
    }
}

/// Step content in the normalised form the store holds.
pub fn content(action: WorkflowAction, step_number: i32) -> StepContent {
    let sms = action.is_sms_or_whatsapp();
    StepContent {
        action,
        step_number,
        send_to: match action {
            WorkflowAction::EmailAddress => Some("desk@example.com".into()),
            WorkflowAction::SmsNumber | WorkflowAction::WhatsappNumber => Some("+15550100".into()),
            _ => None,
        },
        reminder_body: Some("{EVENT_NAME} starts at {EVENT_DATE}".into()),
        email_subject: Some("Upcoming: {EVENT_NAME}".into()),
        template: WorkflowTemplate::Reminder,
        number_required: false,
        sender: sms.then(|| "Slotflow".to_string()),
        sender_name: (!sms).then(|| "Slotflow".to_string()),
        include_calendar_event: false,
    }
}

pub fn step(id: StepId, action: WorkflowAction, step_number: i32) -> WorkflowStep {
    WorkflowStep {
        id,
        workflow_id: WORKFLOW_ID,
        content: content(action, step_number),
        number_verification_pending: false,
    }
}

pub fn workflow(steps: Vec<WorkflowStep>, active_on: Vec<ActiveOnTarget>) -> Workflow {
    Workflow {
        id: WORKFLOW_ID,
        name: "Reminders".into(),
        user_id: Some(OWNER),
        team: None,
        trigger: WorkflowTrigger::BeforeEvent,
        time: Some(1),
        time_unit: Some(TimeUnit::Hour),
        is_active_on_all: false,
        version: 1,
        steps,
        active_on,
    }
}

pub fn reminder(step_id: StepId, booking: &Booking, reference: &str) -> WorkflowReminder {
    WorkflowReminder {
        id: Uuid::new_v4(),
        step_id,
        booking_id: booking.id,
        booking_event_type_id: booking.event_type_id,
        channel: DeliveryChannel::Email,
        recipient: "host@example.com".into(),
        scheduled_for: booking.start_time - Duration::hours(1),
        status: ReminderStatus::Scheduled,
        provider_reference: Some(reference.to_string()),
        failure_reason: None,
        created_at: now() - Duration::days(1),
    }
}

/// Request that resubmits `workflow` as loaded, targeting `active_on`.
pub fn resubmit(workflow: &Workflow, active_on: Vec<i64>) -> WorkflowUpdate {
    WorkflowUpdate {
        id: workflow.id,
        name: workflow.name.clone(),
        active_on,
        steps: workflow
            .steps
            .iter()
            .map(|step| StepInput {
                id: step.id,
                workflow_id: step.workflow_id,
                content: step.content.clone(),
            })
            .collect(),
        trigger: workflow.trigger,
        time: workflow.time,
        time_unit: workflow.time_unit,
        is_active_on_all: workflow.is_active_on_all,
        expected_version: None,
    }
}

pub fn new_step(action: WorkflowAction, step_number: i32) -> StepInput {
    StepInput { id: 0, workflow_id: WORKFLOW_ID, content: content(action, step_number) }
}

pub fn settings() -> ReconcilerSettings {
    ReconcilerSettings {
        self_hosted: false,
        senders: SenderDefaults { sender_id: "Slotflow".into(), sender_name: "Slotflow".into() },
    }
}

/// Reconciler wired to an in-memory store and a recording provider.
pub struct Harness {
    pub store: InMemoryStore,
    pub provider: Arc<RecordingProvider>,
    pub reconciler: WorkflowReconciler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: ReconcilerSettings) -> Self {
        let store = InMemoryStore::new();
        let provider = Arc::new(RecordingProvider::new());
        let shared = store.ports();
        let ports = WorkflowPorts {
            workflows: shared.clone(),
            event_types: shared.clone(),
            bookings: shared.clone(),
            reminders: shared.clone(),
            booking_fields: shared.clone(),
            memberships: shared.clone(),
            entitlements: shared,
            notifications: provider.clone(),
        };
        Self { store, provider, reconciler: WorkflowReconciler::new(ports, settings) }
    }

    /// Personal workflow with two email steps on E1, bookings on E1 and E2,
    /// and reminders for both steps on the E1 booking.
    pub fn seeded() -> Self {
        let harness = Self::new();
        harness.store.insert_event_type(event_type(E1, Some(OWNER), None));
        harness.store.insert_event_type(event_type(E2, Some(OWNER), None));
        harness.store.insert_workflow(workflow(
            vec![step(S1, WorkflowAction::EmailHost, 1), step(S2, WorkflowAction::EmailAttendee, 2)],
            vec![ActiveOnTarget::EventType(E1)],
        ));

        let b1 = booking(B1, E1, now() + Duration::days(2));
        let b2 = booking(B2, E2, now() + Duration::days(3));
        harness.store.insert_reminder(reminder(S1, &b1, "seed-s1-b1"));
        harness.store.insert_reminder(reminder(S2, &b1, "seed-s2-b1"));
        harness.store.insert_booking(b1);
        harness.store.insert_booking(b2);
        harness
    }

    pub fn ctx(&self) -> RequestContext {
        self.ctx_for(OWNER, false)
    }

    pub fn ctx_for(&self, user_id: UserId, is_premium: bool) -> RequestContext {
        RequestContext::at(ActingUser { id: user_id, is_premium }, now())
    }

    pub async fn update(&self, input: WorkflowUpdate) -> DomainResult<UpdateOutcome> {
        self.reconciler.update(&self.ctx(), input).await
    }

    pub fn workflow(&self) -> Workflow {
        self.store.state().workflows.get(&WORKFLOW_ID).cloned().unwrap()
    }
}
