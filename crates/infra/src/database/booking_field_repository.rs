//! SQLite-backed booking-form field sources.
//!
//! A field row exists while at least one workflow lists itself as a source.
//! The field is required when any source requires it.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Transaction};
use slotflow_core::workflows::BookingFieldRepository;
use slotflow_domain::constants::SMS_REMINDER_NUMBER_FIELD;
use slotflow_domain::{EventTypeId, Result as DomainResult, WorkflowId};
use tokio::task;

use super::manager::DbManager;
use super::support::{bool_to_int, map_join_error};
use crate::errors::sql_error;

const PHONE_FIELD_TYPE: &str = "phone";

/// SQLite booking field repository.
pub struct SqliteBookingFieldRepository {
    db: Arc<DbManager>,
}

impl SqliteBookingFieldRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookingFieldRepository for SqliteBookingFieldRepository {
    async fn upsert_sms_reminder_field(
        &self,
        event_type_id: EventTypeId,
        workflow_id: WorkflowId,
        required: bool,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(sql_error)?;

            tx.execute(
                "INSERT INTO booking_fields (event_type_id, name, field_type, required)
                 VALUES (?1, ?2, ?3, 0)
                 ON CONFLICT(event_type_id, name) DO NOTHING",
                params![event_type_id, SMS_REMINDER_NUMBER_FIELD, PHONE_FIELD_TYPE],
            )
            .map_err(sql_error)?;
            tx.execute(
                "INSERT INTO booking_field_sources (event_type_id, field_name, workflow_id, required)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(event_type_id, field_name, workflow_id) DO UPDATE SET
                    required = excluded.required",
                params![event_type_id, SMS_REMINDER_NUMBER_FIELD, workflow_id, bool_to_int(required)],
            )
            .map_err(sql_error)?;

            refresh_required(&tx, event_type_id)?;
            tx.commit().map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn remove_sms_reminder_field(
        &self,
        event_type_id: EventTypeId,
        workflow_id: WorkflowId,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(sql_error)?;

            tx.execute(
                "DELETE FROM booking_field_sources
                 WHERE event_type_id = ?1 AND field_name = ?2 AND workflow_id = ?3",
                params![event_type_id, SMS_REMINDER_NUMBER_FIELD, workflow_id],
            )
            .map_err(sql_error)?;
            tx.execute(
                "DELETE FROM booking_fields
                 WHERE event_type_id = ?1 AND name = ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM booking_field_sources
                       WHERE event_type_id = ?1 AND field_name = ?2
                   )",
                params![event_type_id, SMS_REMINDER_NUMBER_FIELD],
            )
            .map_err(sql_error)?;

            refresh_required(&tx, event_type_id)?;
            tx.commit().map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn refresh_required(tx: &Transaction<'_>, event_type_id: EventTypeId) -> DomainResult<()> {
    tx.execute(
        "UPDATE booking_fields
         SET required = COALESCE((
             SELECT MAX(required) FROM booking_field_sources
             WHERE event_type_id = ?1 AND field_name = ?2
         ), 0)
         WHERE event_type_id = ?1 AND name = ?2",
        params![event_type_id, SMS_REMINDER_NUMBER_FIELD],
    )
    .map_err(sql_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::OptionalExtension;
    use tempfile::TempDir;

    use super::*;

    async fn setup() -> (SqliteBookingFieldRepository, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db = Arc::new(DbManager::new(temp_dir.path().join("test.db"), 2).expect("db"));
        db.run_migrations().expect("migrations run");
        db.get_connection()
            .expect("connection")
            .execute_batch(
                "INSERT INTO event_types (id, title, slug) VALUES (10, 'Intro', 'intro');
                 INSERT INTO workflows (id, name, trigger) VALUES (1, 'First', 'before_event');
                 INSERT INTO workflows (id, name, trigger) VALUES (2, 'Second', 'after_event');",
            )
            .expect("seed");
        (SqliteBookingFieldRepository::new(Arc::clone(&db)), db, temp_dir)
    }

    fn field_required(db: &DbManager) -> Option<bool> {
        db.get_connection()
            .expect("connection")
            .query_row(
                "SELECT required FROM booking_fields WHERE event_type_id = 10 AND name = ?1",
                [SMS_REMINDER_NUMBER_FIELD],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .expect("query")
            .map(|value| value != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn field_is_required_while_any_source_requires_it() {
        let (repo, db, _dir) = setup().await;

        repo.upsert_sms_reminder_field(10, 1, false).await.expect("first source");
        assert_eq!(field_required(&db), Some(false));

        repo.upsert_sms_reminder_field(10, 2, true).await.expect("second source");
        assert_eq!(field_required(&db), Some(true));

        repo.upsert_sms_reminder_field(10, 2, false).await.expect("relaxed");
        assert_eq!(field_required(&db), Some(false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn field_disappears_with_its_last_source() {
        let (repo, db, _dir) = setup().await;

        repo.upsert_sms_reminder_field(10, 1, true).await.expect("first source");
        repo.upsert_sms_reminder_field(10, 2, false).await.expect("second source");

        repo.remove_sms_reminder_field(10, 1).await.expect("remove first");
        assert_eq!(field_required(&db), Some(false));

        repo.remove_sms_reminder_field(10, 2).await.expect("remove second");
        assert_eq!(field_required(&db), None);

        repo.remove_sms_reminder_field(10, 2).await.expect("removing again succeeds");
    }
}
