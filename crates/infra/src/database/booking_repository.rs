//! SQLite-backed booking reads.
//!
//! Bookings are matched either by event type or, for organization
//! workflows, by the team that owns the event type or employs the
//! organizer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use slotflow_core::workflows::{BookingFilter, BookingRepository};
use slotflow_domain::{Attendee, Booking, BookingId, BookingStatus, Result as DomainResult};
use tokio::task;
use tracing::instrument;

use super::manager::DbManager;
use super::support::{
    from_timestamp, lower_bound_secs, map_join_error, parse_column, placeholders,
};
use crate::errors::sql_error;

/// SQLite booking repository.
pub struct SqliteBookingRepository {
    db: Arc<DbManager>,
}

impl SqliteBookingRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    #[instrument(skip(self, filter))]
    async fn find_upcoming_accepted(
        &self,
        filter: &BookingFilter,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);
        let filter = filter.clone();

        task::spawn_blocking(move || -> DomainResult<Vec<Booking>> {
            let conn = db.get_connection()?;
            query_upcoming(&conn, &filter, now)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn find_ids(&self, filter: &BookingFilter) -> DomainResult<Vec<BookingId>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);
        let filter = filter.clone();

        task::spawn_blocking(move || -> DomainResult<Vec<BookingId>> {
            let conn = db.get_connection()?;
            let (clause, values) = filter_clause(&filter);

            let mut stmt = conn
                .prepare(&format!("SELECT b.id FROM bookings b WHERE {clause} ORDER BY b.id"))
                .map_err(sql_error)?;
            let ids = stmt
                .query_map(params_from_iter(values), |row| row.get(0))
                .map_err(sql_error)?
                .collect::<rusqlite::Result<Vec<BookingId>>>()
                .map_err(sql_error)?;
            Ok(ids)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

/// WHERE fragment over `bookings b` and its bound values.
fn filter_clause(filter: &BookingFilter) -> (String, Vec<Value>) {
    match filter {
        BookingFilter::EventTypes(ids) => (
            format!("b.event_type_id IN ({})", placeholders(ids.len())),
            ids.iter().copied().map(Value::from).collect(),
        ),
        BookingFilter::Teams(ids) => {
            let marks = placeholders(ids.len());
            let clause = format!(
                "(b.event_type_id IN (SELECT id FROM event_types WHERE team_id IN ({marks}))
                  OR b.user_id IN (SELECT user_id FROM memberships WHERE accepted = 1 AND team_id IN ({marks})))"
            );
            let values = ids.iter().chain(ids.iter()).copied().map(Value::from).collect();
            (clause, values)
        }
    }
}

struct BookingRow {
    id: BookingId,
    uid: String,
    title: String,
    event_type_id: Option<i64>,
    user_id: Option<i64>,
    organizer_email: Option<String>,
    start_time: i64,
    end_time: i64,
    status: String,
    sms_reminder_number: Option<String>,
}

fn query_upcoming(
    conn: &Connection,
    filter: &BookingFilter,
    now: DateTime<Utc>,
) -> DomainResult<Vec<Booking>> {
    let (clause, mut values) = filter_clause(filter);
    values.push(Value::from(BookingStatus::Accepted.to_string()));
    values.push(Value::from(lower_bound_secs(now)));

    let mut stmt = conn
        .prepare(&format!(
            "SELECT b.id, b.uid, b.title, b.event_type_id, b.user_id, b.organizer_email,
                    b.start_time, b.end_time, b.status, b.sms_reminder_number
             FROM bookings b
             WHERE {clause} AND b.status = ? AND b.start_time >= ?
             ORDER BY b.start_time, b.id"
        ))
        .map_err(sql_error)?;

    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(BookingRow {
                id: row.get(0)?,
                uid: row.get(1)?,
                title: row.get(2)?,
                event_type_id: row.get(3)?,
                user_id: row.get(4)?,
                organizer_email: row.get(5)?,
                start_time: row.get(6)?,
                end_time: row.get(7)?,
                status: row.get(8)?,
                sms_reminder_number: row.get(9)?,
            })
        })
        .map_err(sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(sql_error)?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<BookingId> = rows.iter().map(|row| row.id).collect();
    let mut attendees = query_attendees(conn, &ids)?;

    rows.into_iter()
        .map(|row| {
            Ok(Booking {
                id: row.id,
                uid: row.uid,
                title: row.title,
                event_type_id: row.event_type_id,
                user_id: row.user_id,
                organizer_email: row.organizer_email,
                start_time: from_timestamp(row.start_time, "start_time")?,
                end_time: from_timestamp(row.end_time, "end_time")?,
                status: parse_column(&row.status, "status")?,
                attendees: attendees.remove(&row.id).unwrap_or_default(),
                sms_reminder_number: row.sms_reminder_number,
            })
        })
        .collect()
}

fn query_attendees(
    conn: &Connection,
    booking_ids: &[BookingId],
) -> DomainResult<HashMap<BookingId, Vec<Attendee>>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT booking_id, name, email, time_zone FROM attendees
             WHERE booking_id IN ({}) ORDER BY id",
            placeholders(booking_ids.len())
        ))
        .map_err(sql_error)?;

    let mut grouped: HashMap<BookingId, Vec<Attendee>> = HashMap::new();
    for row in stmt
        .query_map(params_from_iter(booking_ids.iter()), |row| {
            Ok((
                row.get::<_, BookingId>(0)?,
                Attendee { name: row.get(1)?, email: row.get(2)?, time_zone: row.get(3)? },
            ))
        })
        .map_err(sql_error)?
    {
        let (booking_id, attendee) = row.map_err(sql_error)?;
        grouped.entry(booking_id).or_default().push(attendee);
    }
    Ok(grouped)
}
