//! SQLite-backed event type lookups.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection};
use slotflow_core::workflows::EventTypeRepository;
use slotflow_domain::{EventType, EventTypeId, Result as DomainResult};
use tokio::task;

use super::manager::DbManager;
use super::support::{map_join_error, placeholders};
use crate::errors::sql_error;

/// SQLite event type repository.
pub struct SqliteEventTypeRepository {
    db: Arc<DbManager>,
}

impl SqliteEventTypeRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventTypeRepository for SqliteEventTypeRepository {
    async fn find_by_ids(&self, ids: &[EventTypeId]) -> DomainResult<Vec<EventType>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);
        let ids = ids.to_vec();

        task::spawn_blocking(move || -> DomainResult<Vec<EventType>> {
            let conn = db.get_connection()?;
            query_event_types(&conn, &ids)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn query_event_types(conn: &Connection, ids: &[EventTypeId]) -> DomainResult<Vec<EventType>> {
    let marks = placeholders(ids.len());

    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, title, slug, owner_user_id, team_id, parent_id
             FROM event_types WHERE id IN ({marks}) ORDER BY id"
        ))
        .map_err(sql_error)?;
    let mut event_types = stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok(EventType {
                id: row.get(0)?,
                title: row.get(1)?,
                slug: row.get(2)?,
                owner_user_id: row.get(3)?,
                team_id: row.get(4)?,
                parent_id: row.get(5)?,
                children: Vec::new(),
            })
        })
        .map_err(sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(sql_error)?;

    let mut stmt = conn
        .prepare(&format!(
            "SELECT parent_id, id FROM event_types WHERE parent_id IN ({marks}) ORDER BY id"
        ))
        .map_err(sql_error)?;
    let mut children: HashMap<EventTypeId, Vec<EventTypeId>> = HashMap::new();
    for pair in stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, EventTypeId>(0)?, row.get::<_, EventTypeId>(1)?))
        })
        .map_err(sql_error)?
    {
        let (parent, child) = pair.map_err(sql_error)?;
        children.entry(parent).or_default().push(child);
    }

    for event_type in &mut event_types {
        if let Some(ids) = children.remove(&event_type.id) {
            event_type.children = ids;
        }
    }

    Ok(event_types)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn setup() -> (SqliteEventTypeRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db = Arc::new(DbManager::new(temp_dir.path().join("test.db"), 2).expect("db"));
        db.run_migrations().expect("migrations run");
        db.get_connection()
            .expect("connection")
            .execute_batch(
                "INSERT INTO teams (id, name) VALUES (7, 'Support');
                 INSERT INTO event_types (id, title, slug, team_id) VALUES (30, 'Onboarding', 'onboarding', 7);
                 INSERT INTO event_types (id, title, slug, owner_user_id, parent_id) VALUES (31, 'Onboarding', 'onboarding', 2, 30);
                 INSERT INTO event_types (id, title, slug, owner_user_id, parent_id) VALUES (32, 'Onboarding', 'onboarding', 3, 30);
                 INSERT INTO event_types (id, title, slug, owner_user_id) VALUES (40, 'Solo', 'solo', 2);",
            )
            .expect("seed");
        (SqliteEventTypeRepository::new(db), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn parents_carry_their_children() {
        let (repo, _dir) = setup().await;

        let found = repo.find_by_ids(&[30, 40]).await.expect("query");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].team_id, Some(7));
        assert_eq!(found[0].children, vec![31, 32]);
        assert!(found[1].children.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn children_report_their_parent_and_unknown_ids_are_omitted() {
        let (repo, _dir) = setup().await;

        let found = repo.find_by_ids(&[31, 999]).await.expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].parent_id, Some(30));
        assert_eq!(found[0].owner_user_id, Some(2));

        assert!(repo.find_by_ids(&[]).await.expect("query").is_empty());
    }
}
