//! Workflow reminder reconciliation
//!
//! Applies an edited workflow and keeps the reminders of every affected
//! booking consistent with the new definition.

pub mod authorization;
pub mod booking_fields;
pub mod canceller;
pub mod context;
pub mod ports;
pub mod scheduler;
pub mod service;
pub mod steps;
pub mod targets;

pub use authorization::{AuthorizationGate, Entitlement, WorkflowAccess};
pub use booking_fields::{BookingFieldSynchronizer, SmsFieldRequirement};
pub use canceller::{CancelReport, ReminderCanceller};
pub use context::{ActingUser, RequestContext};
pub use ports::{
    BookingFieldRepository, BookingFilter, BookingRepository, EntitlementResolver,
    EventTypeRepository, MembershipDirectory, NotificationProvider, ReminderRepository,
    WorkflowHeader, WorkflowRepository,
};
pub use scheduler::{ReminderScheduler, ScheduleReport, SenderDefaults, Timing};
pub use service::{
    ReconcileReport, ReconcilerSettings, UpdateOutcome, WorkflowPorts, WorkflowReconciler,
};
pub use steps::{EditedStep, StepPlan};
pub use targets::TargetDiff;
