use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotflow_core::workflows::ports::{
    BookingFieldRepository, BookingFilter, BookingRepository, EntitlementResolver,
    EventTypeRepository, MembershipDirectory, ReminderRepository, WorkflowHeader,
    WorkflowRepository,
};
use slotflow_domain::{
    ActiveOnTarget, Booking, BookingId, EventType, EventTypeId, MembershipRole,
    Result as DomainResult, SlotflowError, StepContent, StepId, Team, TeamId, UserId, Workflow,
    WorkflowId, WorkflowReminder, WorkflowStep,
};
use uuid::Uuid;

/// Raw state behind [`InMemoryStore`].
#[derive(Default)]
pub struct StoreState {
    pub workflows: HashMap<WorkflowId, Workflow>,
    pub event_types: HashMap<EventTypeId, EventType>,
    pub bookings: Vec<Booking>,
    pub reminders: Vec<WorkflowReminder>,
    /// (event type, workflow) -> required
    pub booking_fields: BTreeMap<(EventTypeId, WorkflowId), bool>,
    pub memberships: HashMap<(TeamId, UserId), MembershipRole>,
    pub teams: HashMap<TeamId, Team>,
    pub team_plan_users: HashSet<UserId>,
    pub next_step_id: StepId,
    /// Number of mutating calls received.
    pub writes: usize,
}

/// In-memory implementation of every store port.
///
/// One shared state so tests can seed and inspect it directly.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.state().next_step_id = 1000;
        store
    }

    pub fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn insert_workflow(&self, workflow: Workflow) {
        self.state().workflows.insert(workflow.id, workflow);
    }

    pub fn insert_event_type(&self, event_type: EventType) {
        self.state().event_types.insert(event_type.id, event_type);
    }

    pub fn insert_booking(&self, booking: Booking) {
        self.state().bookings.push(booking);
    }

    pub fn insert_reminder(&self, reminder: WorkflowReminder) {
        self.state().reminders.push(reminder);
    }

    pub fn insert_team(&self, team: Team) {
        self.state().teams.insert(team.id, team);
    }

    pub fn add_member(&self, team_id: TeamId, user_id: UserId, role: MembershipRole) {
        self.state().memberships.insert((team_id, user_id), role);
    }

    pub fn grant_team_plan(&self, user_id: UserId) {
        self.state().team_plan_users.insert(user_id);
    }

    pub fn reminders(&self) -> Vec<WorkflowReminder> {
        self.state().reminders.clone()
    }

    pub fn reminders_for(&self, step_id: StepId) -> Vec<WorkflowReminder> {
        self.reminders().into_iter().filter(|r| r.step_id == step_id).collect()
    }

    pub fn writes(&self) -> usize {
        self.state().writes
    }

    pub fn booking_field(&self, event_type_id: EventTypeId, workflow_id: WorkflowId) -> Option<bool> {
        self.state().booking_fields.get(&(event_type_id, workflow_id)).copied()
    }

    pub fn ports(&self) -> Arc<Self> {
        Arc::new(self.clone())
    }
}

fn booking_matches(state: &StoreState, booking: &Booking, filter: &BookingFilter) -> bool {
    match filter {
        BookingFilter::EventTypes(ids) => {
            booking.event_type_id.is_some_and(|id| ids.contains(&id))
        }
        BookingFilter::Teams(teams) => {
            let owned_by_team = booking
                .event_type_id
                .and_then(|id| state.event_types.get(&id))
                .and_then(|event_type| event_type.team_id)
                .is_some_and(|team_id| teams.contains(&team_id));
            let organizer_is_member = booking.user_id.is_some_and(|user_id| {
                teams.iter().any(|team_id| state.memberships.contains_key(&(*team_id, user_id)))
            });
            owned_by_team || organizer_is_member
        }
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryStore {
    async fn find_by_id(&self, id: WorkflowId) -> DomainResult<Option<Workflow>> {
        Ok(self.state().workflows.get(&id).cloned().map(|mut workflow| {
            workflow.steps.sort_by_key(|step| step.content.step_number);
            workflow
        }))
    }

    async fn update_header(&self, header: &WorkflowHeader, expected_version: i64) -> DomainResult<i64> {
        let mut state = self.state();
        state.writes += 1;
        let workflow = state
            .workflows
            .get_mut(&header.id)
            .ok_or_else(|| SlotflowError::NotFound(format!("workflow {}", header.id)))?;
        if workflow.version != expected_version {
            return Err(SlotflowError::Conflict(format!("workflow {} changed", header.id)));
        }
        workflow.name = header.name.clone();
        workflow.trigger = header.trigger;
        workflow.time = header.time;
        workflow.time_unit = header.time_unit;
        workflow.is_active_on_all = header.is_active_on_all;
        workflow.version += 1;
        Ok(workflow.version)
    }

    async fn replace_active_on(
        &self,
        workflow_id: WorkflowId,
        targets: &[ActiveOnTarget],
    ) -> DomainResult<()> {
        let mut state = self.state();
        state.writes += 1;
        if let Some(workflow) = state.workflows.get_mut(&workflow_id) {
            workflow.active_on = targets.to_vec();
        }
        Ok(())
    }

    async fn create_step(
        &self,
        workflow_id: WorkflowId,
        content: &StepContent,
    ) -> DomainResult<WorkflowStep> {
        let mut state = self.state();
        state.writes += 1;
        state.next_step_id += 1;
        let step = WorkflowStep {
            id: state.next_step_id,
            workflow_id,
            content: content.clone(),
            number_verification_pending: false,
        };
        let workflow = state
            .workflows
            .get_mut(&workflow_id)
            .ok_or_else(|| SlotflowError::NotFound(format!("workflow {workflow_id}")))?;
        workflow.steps.push(step.clone());
        Ok(step)
    }

    async fn update_step(&self, step: &WorkflowStep) -> DomainResult<()> {
        let mut state = self.state();
        state.writes += 1;
        let existing = state
            .workflows
            .values_mut()
            .flat_map(|workflow| workflow.steps.iter_mut())
            .find(|existing| existing.id == step.id)
            .ok_or_else(|| SlotflowError::NotFound(format!("step {}", step.id)))?;
        *existing = step.clone();
        Ok(())
    }

    async fn delete_step(&self, step_id: StepId) -> DomainResult<()> {
        let mut state = self.state();
        state.writes += 1;
        for workflow in state.workflows.values_mut() {
            workflow.steps.retain(|step| step.id != step_id);
        }
        Ok(())
    }
}

#[async_trait]
impl EventTypeRepository for InMemoryStore {
    async fn find_by_ids(&self, ids: &[EventTypeId]) -> DomainResult<Vec<EventType>> {
        let state = self.state();
        Ok(ids.iter().filter_map(|id| state.event_types.get(id).cloned()).collect())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn find_upcoming_accepted(
        &self,
        filter: &BookingFilter,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        let state = self.state();
        Ok(state
            .bookings
            .iter()
            .filter(|booking| booking.accrues_reminders(now) && booking_matches(&state, booking, filter))
            .cloned()
            .collect())
    }

    async fn find_ids(&self, filter: &BookingFilter) -> DomainResult<Vec<BookingId>> {
        let state = self.state();
        Ok(state
            .bookings
            .iter()
            .filter(|booking| booking_matches(&state, booking, filter))
            .map(|booking| booking.id)
            .collect())
    }
}

#[async_trait]
impl ReminderRepository for InMemoryStore {
    async fn find_by_steps(&self, step_ids: &[StepId]) -> DomainResult<Vec<WorkflowReminder>> {
        Ok(self
            .state()
            .reminders
            .iter()
            .filter(|reminder| step_ids.contains(&reminder.step_id))
            .cloned()
            .collect())
    }

    async fn insert(&self, reminder: &WorkflowReminder) -> DomainResult<()> {
        let mut state = self.state();
        state.writes += 1;
        state.reminders.push(reminder.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let mut state = self.state();
        state.writes += 1;
        state.reminders.retain(|reminder| reminder.id != id);
        Ok(())
    }
}

#[async_trait]
impl BookingFieldRepository for InMemoryStore {
    async fn upsert_sms_reminder_field(
        &self,
        event_type_id: EventTypeId,
        workflow_id: WorkflowId,
        required: bool,
    ) -> DomainResult<()> {
        let mut state = self.state();
        state.writes += 1;
        state.booking_fields.insert((event_type_id, workflow_id), required);
        Ok(())
    }

    async fn remove_sms_reminder_field(
        &self,
        event_type_id: EventTypeId,
        workflow_id: WorkflowId,
    ) -> DomainResult<()> {
        let mut state = self.state();
        state.writes += 1;
        state.booking_fields.remove(&(event_type_id, workflow_id));
        Ok(())
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryStore {
    async fn role(&self, team_id: TeamId, user_id: UserId) -> DomainResult<Option<MembershipRole>> {
        Ok(self.state().memberships.get(&(team_id, user_id)).copied())
    }

    async fn find_team(&self, team_id: TeamId) -> DomainResult<Option<Team>> {
        Ok(self.state().teams.get(&team_id).cloned())
    }
}

#[async_trait]
impl EntitlementResolver for InMemoryStore {
    async fn has_team_plan(&self, user_id: UserId) -> DomainResult<bool> {
        Ok(self.state().team_plan_users.contains(&user_id))
    }
}
