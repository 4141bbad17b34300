//! SQLite-backed team, membership and plan lookups.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use slotflow_core::workflows::{EntitlementResolver, MembershipDirectory};
use slotflow_domain::{MembershipRole, Result as DomainResult, Team, TeamId, UserId};
use tokio::task;

use super::manager::DbManager;
use super::support::{map_join_error, parse_column};
use crate::errors::sql_error;

/// SQLite team repository.
///
/// Serves both membership lookups and the team-plan entitlement check; both
/// read the same `teams` and `memberships` tables.
pub struct SqliteTeamRepository {
    db: Arc<DbManager>,
}

impl SqliteTeamRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MembershipDirectory for SqliteTeamRepository {
    async fn role(&self, team_id: TeamId, user_id: UserId) -> DomainResult<Option<MembershipRole>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<MembershipRole>> {
            let conn = db.get_connection()?;
            let role: Option<String> = conn
                .query_row(
                    "SELECT role FROM memberships
                     WHERE team_id = ?1 AND user_id = ?2 AND accepted = 1",
                    params![team_id, user_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error)?;

            role.as_deref().map(|role| parse_column(role, "role")).transpose()
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_team(&self, team_id: TeamId) -> DomainResult<Option<Team>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Team>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT id, name, slug, parent_id, is_organization FROM teams WHERE id = ?1",
                [team_id],
                |row| {
                    Ok(Team {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                        parent_id: row.get(3)?,
                        is_organization: row.get::<_, i64>(4)? != 0,
                    })
                },
            )
            .optional()
            .map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl EntitlementResolver for SqliteTeamRepository {
    /// A plan on the team itself or on its parent organization counts.
    async fn has_team_plan(&self, user_id: UserId) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM memberships m
                     JOIN teams t ON t.id = m.team_id
                     LEFT JOIN teams parent ON parent.id = t.parent_id
                     WHERE m.user_id = ?1 AND m.accepted = 1
                       AND (t.has_team_plan = 1 OR parent.has_team_plan = 1)
                 )",
                [user_id],
                |row| row.get(0),
            )
            .map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
