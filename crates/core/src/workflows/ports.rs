//! Port interfaces for workflow reminder reconciliation
//!
//! These traits define the boundaries between the reconciler and the
//! persistence store, the notification provider and the plan/membership
//! lookups. Every method is a single request-scoped call; timeouts and
//! retries belong to the implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotflow_domain::{
    ActiveOnTarget, Booking, BookingId, EventType, EventTypeId, MembershipRole, Result,
    ScheduledDelivery, StepContent, StepId, Team, TeamId, TimeUnit, UserId, Workflow,
    WorkflowId, WorkflowReminder, WorkflowStep, WorkflowTrigger,
};
use uuid::Uuid;

/// Workflow-level fields written by an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowHeader {
    pub id: WorkflowId,
    pub name: String,
    pub trigger: WorkflowTrigger,
    pub time: Option<i64>,
    pub time_unit: Option<TimeUnit>,
    pub is_active_on_all: bool,
}

/// Trait for workflow, step and association persistence
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Load a workflow with steps ordered by step number and its active-on
    /// rows.
    async fn find_by_id(&self, id: WorkflowId) -> Result<Option<Workflow>>;

    /// Write the header if the stored version still equals
    /// `expected_version`, returning the new version.
    ///
    /// Fails with `SlotflowError::Conflict` when another writer got there
    /// first.
    async fn update_header(&self, header: &WorkflowHeader, expected_version: i64) -> Result<i64>;

    /// Delete every association row of the workflow, then insert `targets`.
    async fn replace_active_on(
        &self,
        workflow_id: WorkflowId,
        targets: &[ActiveOnTarget],
    ) -> Result<()>;

    /// Persist a new step and return it with its assigned id.
    async fn create_step(
        &self,
        workflow_id: WorkflowId,
        content: &StepContent,
    ) -> Result<WorkflowStep>;

    /// Overwrite an existing step.
    async fn update_step(&self, step: &WorkflowStep) -> Result<()>;

    /// Delete a step. Reminders must have been cancelled beforehand.
    async fn delete_step(&self, step_id: StepId) -> Result<()>;
}

/// Trait for event type lookups
#[async_trait]
pub trait EventTypeRepository: Send + Sync {
    /// Fetch event types with their child ids. Unknown ids are omitted.
    async fn find_by_ids(&self, ids: &[EventTypeId]) -> Result<Vec<EventType>>;
}

/// Which bookings a set of active-on targets covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingFilter {
    /// Bookings of these event types.
    EventTypes(Vec<EventTypeId>),
    /// Bookings of event types owned by these teams or organized by one of
    /// their members.
    Teams(Vec<TeamId>),
}

impl BookingFilter {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::EventTypes(ids) | Self::Teams(ids) => ids.is_empty(),
        }
    }
}

/// Trait for booking reads
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Accepted bookings matching `filter` that start at or after `now`.
    async fn find_upcoming_accepted(
        &self,
        filter: &BookingFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;

    /// Ids of every booking matching `filter`, whatever its status or time.
    async fn find_ids(&self, filter: &BookingFilter) -> Result<Vec<BookingId>>;
}

/// Trait for reminder persistence
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// All reminders belonging to any of the given steps.
    async fn find_by_steps(&self, step_ids: &[StepId]) -> Result<Vec<WorkflowReminder>>;

    /// Insert a reminder record.
    async fn insert(&self, reminder: &WorkflowReminder) -> Result<()>;

    /// Delete a reminder record. Deleting a missing record succeeds.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Trait for the virtual booking-form field fed by workflows
#[async_trait]
pub trait BookingFieldRepository: Send + Sync {
    /// Add or update `workflow_id` as a source of the SMS reminder number
    /// field on `event_type_id`.
    async fn upsert_sms_reminder_field(
        &self,
        event_type_id: EventTypeId,
        workflow_id: WorkflowId,
        required: bool,
    ) -> Result<()>;

    /// Drop `workflow_id` as a source of the field; the field disappears
    /// with its last source. Removing an absent source succeeds.
    async fn remove_sms_reminder_field(
        &self,
        event_type_id: EventTypeId,
        workflow_id: WorkflowId,
    ) -> Result<()>;
}

/// Trait for team membership and hierarchy lookups
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Accepted membership role of `user_id` in `team_id`.
    async fn role(&self, team_id: TeamId, user_id: UserId) -> Result<Option<MembershipRole>>;

    async fn find_team(&self, team_id: TeamId) -> Result<Option<Team>>;
}

/// Trait for plan-tier lookups
#[async_trait]
pub trait EntitlementResolver: Send + Sync {
    /// Whether the user belongs to any team on a paid team plan.
    async fn has_team_plan(&self, user_id: UserId) -> Result<bool>;
}

/// Trait for the external delivery provider
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Register a delivery and return the provider's reference for it.
    async fn schedule(&self, delivery: &ScheduledDelivery) -> Result<String>;

    /// Cancel a delivery. Unknown or already-sent deliveries succeed.
    async fn cancel(&self, provider_reference: &str) -> Result<()>;
}
