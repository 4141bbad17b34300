//! SQLite-backed reminder persistence.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection};
use slotflow_core::workflows::ReminderRepository;
use slotflow_domain::{Result as DomainResult, SlotflowError, StepId, WorkflowReminder};
use tokio::task;
use tracing::instrument;
use uuid::Uuid;

use super::manager::DbManager;
use super::support::{from_timestamp, map_join_error, parse_column, placeholders};
use crate::errors::sql_error;

/// SQLite reminder repository.
pub struct SqliteReminderRepository {
    db: Arc<DbManager>,
}

impl SqliteReminderRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReminderRepository for SqliteReminderRepository {
    #[instrument(skip(self, step_ids), fields(steps = step_ids.len()))]
    async fn find_by_steps(&self, step_ids: &[StepId]) -> DomainResult<Vec<WorkflowReminder>> {
        if step_ids.is_empty() {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);
        let step_ids = step_ids.to_vec();

        task::spawn_blocking(move || -> DomainResult<Vec<WorkflowReminder>> {
            let conn = db.get_connection()?;
            query_by_steps(&conn, &step_ids)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, reminder), fields(reminder_id = %reminder.id, booking_id = reminder.booking_id))]
    async fn insert(&self, reminder: &WorkflowReminder) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let reminder = reminder.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO workflow_reminders (id, step_id, booking_id, booking_event_type_id,
                     channel, recipient, scheduled_for, status, provider_reference,
                     failure_reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    reminder.id.to_string(),
                    reminder.step_id,
                    reminder.booking_id,
                    reminder.booking_event_type_id,
                    reminder.channel.to_string(),
                    reminder.recipient,
                    reminder.scheduled_for.timestamp(),
                    reminder.status.to_string(),
                    reminder.provider_reference,
                    reminder.failure_reason,
                    reminder.created_at.timestamp(),
                ],
            )
            .map_err(sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM workflow_reminders WHERE id = ?1", [id.to_string()])
                .map_err(sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

struct ReminderRow {
    id: String,
    step_id: StepId,
    booking_id: i64,
    booking_event_type_id: Option<i64>,
    channel: String,
    recipient: String,
    scheduled_for: i64,
    status: String,
    provider_reference: Option<String>,
    failure_reason: Option<String>,
    created_at: i64,
}

impl ReminderRow {
    fn into_reminder(self) -> DomainResult<WorkflowReminder> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| SlotflowError::Database(format!("column id: {e}")))?;
        Ok(WorkflowReminder {
            id,
            step_id: self.step_id,
            booking_id: self.booking_id,
            booking_event_type_id: self.booking_event_type_id,
            channel: parse_column(&self.channel, "channel")?,
            recipient: self.recipient,
            scheduled_for: from_timestamp(self.scheduled_for, "scheduled_for")?,
            status: parse_column(&self.status, "status")?,
            provider_reference: self.provider_reference,
            failure_reason: self.failure_reason,
            created_at: from_timestamp(self.created_at, "created_at")?,
        })
    }
}

fn query_by_steps(conn: &Connection, step_ids: &[StepId]) -> DomainResult<Vec<WorkflowReminder>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, step_id, booking_id, booking_event_type_id, channel, recipient,
                    scheduled_for, status, provider_reference, failure_reason, created_at
             FROM workflow_reminders
             WHERE step_id IN ({})
             ORDER BY scheduled_for, id",
            placeholders(step_ids.len())
        ))
        .map_err(sql_error)?;

    let rows = stmt
        .query_map(params_from_iter(step_ids.iter()), |row| {
            Ok(ReminderRow {
                id: row.get(0)?,
                step_id: row.get(1)?,
                booking_id: row.get(2)?,
                booking_event_type_id: row.get(3)?,
                channel: row.get(4)?,
                recipient: row.get(5)?,
                scheduled_for: row.get(6)?,
                status: row.get(7)?,
                provider_reference: row.get(8)?,
                failure_reason: row.get(9)?,
                created_at: row.get(10)?,
            })
        })
        .map_err(sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(sql_error)?;

    rows.into_iter().map(ReminderRow::into_reminder).collect()
}
