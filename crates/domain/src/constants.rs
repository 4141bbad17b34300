//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Booking form
pub const SMS_REMINDER_NUMBER_FIELD: &str = "smsReminderNumber";

// Sender defaults
pub const DEFAULT_SENDER_ID: &str = "Slotflow";
pub const DEFAULT_SENDER_NAME: &str = "Slotflow";

// Database
pub const DEFAULT_POOL_SIZE: u32 = 4;

// Notification provider
pub const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_NOTIFICATION_MAX_ATTEMPTS: usize = 3;

/// Step ids at or below this value are placeholders for steps that have not
/// been persisted yet.
pub const UNPERSISTED_STEP_ID_MAX: i64 = 0;
