//! Booking and event type types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookingId, EventTypeId, TeamId, UserId};
use crate::impl_domain_status_conversions;

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Accepted,
    Pending,
    Cancelled,
    Rejected,
    AwaitingHost,
}

impl_domain_status_conversions!(BookingStatus {
    Accepted => "accepted",
    Pending => "pending",
    Cancelled => "cancelled",
    Rejected => "rejected",
    AwaitingHost => "awaiting_host",
});

/// Attendee of a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub time_zone: String,
}

/// A booking as seen by the reminder reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub uid: String,
    pub title: String,
    pub event_type_id: Option<EventTypeId>,
    /// Organizer.
    pub user_id: Option<UserId>,
    pub organizer_email: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub attendees: Vec<Attendee>,
    /// Number collected by the SMS reminder booking field.
    pub sms_reminder_number: Option<String>,
}

impl Booking {
    /// Accepted and starting at or after `now`.
    pub fn accrues_reminders(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Accepted && self.start_time >= now
    }
}

/// Event type with its managed children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    pub id: EventTypeId,
    pub title: String,
    pub slug: String,
    pub owner_user_id: Option<UserId>,
    pub team_id: Option<TeamId>,
    /// Set on managed copies of a team event type.
    pub parent_id: Option<EventTypeId>,
    pub children: Vec<EventTypeId>,
}

impl EventType {
    /// The event type followed by its children.
    pub fn with_children(&self) -> impl Iterator<Item = EventTypeId> + '_ {
        std::iter::once(self.id).chain(self.children.iter().copied())
    }
}
