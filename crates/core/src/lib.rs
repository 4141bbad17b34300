//! # Slotflow Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits)
//! - The workflow reminder reconciler and its stages
//!
//! ## Architecture Principles
//! - Only depends on `slotflow-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod workflows;

// Re-export specific items to avoid ambiguity
pub use workflows::ports::{
    BookingFieldRepository, BookingFilter, BookingRepository, EntitlementResolver,
    EventTypeRepository, MembershipDirectory, NotificationProvider, ReminderRepository,
    WorkflowHeader, WorkflowRepository,
};
pub use workflows::{
    ActingUser, ReconcileReport, ReconcilerSettings, RequestContext, UpdateOutcome,
    WorkflowPorts, WorkflowReconciler,
};
