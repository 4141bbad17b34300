//! Request context passed explicitly through the reconciler

use chrono::{DateTime, Utc};
use slotflow_domain::UserId;

/// The user performing the update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser {
    pub id: UserId,
    /// Premium flag from the user's profile metadata.
    pub is_premium: bool,
}

/// Per-call context. `now` is captured once so every stage agrees on what
/// "future" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user: ActingUser,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(user: ActingUser) -> Self {
        Self { user, now: Utc::now() }
    }

    /// Context pinned to a given instant.
    pub fn at(user: ActingUser, now: DateTime<Utc>) -> Self {
        Self { user, now }
    }
}
