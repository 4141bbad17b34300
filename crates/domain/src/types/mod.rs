//! Domain types and models
//!
//! Identifiers are the relational row ids of the booking platform. Step ids
//! at or below zero mark steps submitted for creation.

pub mod booking;
pub mod reminder;
pub mod team;
pub mod workflow;

pub use booking::{Attendee, Booking, BookingStatus, EventType};
pub use reminder::{DeliveryChannel, ReminderStatus, ScheduledDelivery, WorkflowReminder};
pub use team::{MembershipRole, Team, TeamRef};
pub use workflow::{
    ActiveOnTarget, StepContent, StepInput, TimeUnit, Workflow, WorkflowAction, WorkflowScope,
    WorkflowStep, WorkflowTemplate, WorkflowTrigger, WorkflowUpdate,
};

/// Workflow row id
pub type WorkflowId = i64;
/// Workflow step row id
pub type StepId = i64;
/// Event type row id
pub type EventTypeId = i64;
/// Team (or organization) row id
pub type TeamId = i64;
/// User row id
pub type UserId = i64;
/// Booking row id
pub type BookingId = i64;
