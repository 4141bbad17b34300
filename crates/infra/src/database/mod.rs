//! Database implementations

pub mod booking_field_repository;
pub mod booking_repository;
pub mod event_type_repository;
pub mod manager;
pub mod reminder_repository;
mod support;
pub mod team_repository;
pub mod workflow_repository;

pub use booking_field_repository::SqliteBookingFieldRepository;
pub use booking_repository::SqliteBookingRepository;
pub use event_type_repository::SqliteEventTypeRepository;
pub use manager::{DbManager, SqliteConnection};
pub use reminder_repository::SqliteReminderRepository;
pub use team_repository::SqliteTeamRepository;
pub use workflow_repository::SqliteWorkflowRepository;
