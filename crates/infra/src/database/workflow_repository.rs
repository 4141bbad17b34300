//! SQLite-backed workflow repository.
//!
//! Implements the `WorkflowRepository` port: workflow headers with an
//! optimistic version column, steps, and the active-on association tables.
//! All database operations run in `spawn_blocking` to avoid blocking the
//! async runtime.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use slotflow_core::workflows::{WorkflowHeader, WorkflowRepository};
use slotflow_domain::{
    ActiveOnTarget, Result as DomainResult, SlotflowError, StepContent, StepId, TeamRef, TimeUnit,
    Workflow, WorkflowAction, WorkflowId, WorkflowStep, WorkflowTemplate, WorkflowTrigger,
};
use tokio::task;
use tracing::instrument;

use super::manager::DbManager;
use super::support::{bool_to_int, map_join_error, parse_column};
use crate::errors::sql_error;

const STEP_COLUMNS: &str = "id, workflow_id, step_number, action, send_to, reminder_body, \
     email_subject, template, number_required, sender, sender_name, include_calendar_event, \
     number_verification_pending";

/// SQLite workflow repository.
pub struct SqliteWorkflowRepository {
    db: Arc<DbManager>,
}

impl SqliteWorkflowRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkflowRepository for SqliteWorkflowRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: WorkflowId) -> DomainResult<Option<Workflow>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Workflow>> {
            let conn = db.get_connection()?;
            query_workflow(&conn, id)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, header), fields(workflow_id = header.id))]
    async fn update_header(
        &self,
        header: &WorkflowHeader,
        expected_version: i64,
    ) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);
        let header = header.clone();

        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            compare_and_update_header(&conn, &header, expected_version)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    async fn replace_active_on(
        &self,
        workflow_id: WorkflowId,
        targets: &[ActiveOnTarget],
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let targets = targets.to_vec();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(sql_error)?;
            tx.execute("DELETE FROM workflows_on_event_types WHERE workflow_id = ?1", [workflow_id])
                .map_err(sql_error)?;
            tx.execute("DELETE FROM workflows_on_teams WHERE workflow_id = ?1", [workflow_id])
                .map_err(sql_error)?;

            for target in &targets {
                let sql = match target {
                    ActiveOnTarget::EventType(_) => {
                        "INSERT INTO workflows_on_event_types (workflow_id, event_type_id) VALUES (?1, ?2)"
                    }
                    ActiveOnTarget::Team(_) => {
                        "INSERT INTO workflows_on_teams (workflow_id, team_id) VALUES (?1, ?2)"
                    }
                };
                tx.execute(sql, params![workflow_id, target.id()]).map_err(sql_error)?;
            }

            tx.commit().map_err(sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, content), fields(step_number = content.step_number))]
    async fn create_step(
        &self,
        workflow_id: WorkflowId,
        content: &StepContent,
    ) -> DomainResult<WorkflowStep> {
        let db = Arc::clone(&self.db);
        let content = content.clone();

        task::spawn_blocking(move || -> DomainResult<WorkflowStep> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO workflow_steps (workflow_id, step_number, action, send_to, reminder_body,
                     email_subject, template, number_required, sender, sender_name,
                     include_calendar_event, number_verification_pending)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)",
                params![
                    workflow_id,
                    content.step_number,
                    content.action.to_string(),
                    content.send_to,
                    content.reminder_body,
                    content.email_subject,
                    content.template.to_string(),
                    bool_to_int(content.number_required),
                    content.sender,
                    content.sender_name,
                    bool_to_int(content.include_calendar_event),
                ],
            )
            .map_err(sql_error)?;

            Ok(WorkflowStep {
                id: conn.last_insert_rowid(),
                workflow_id,
                content,
                number_verification_pending: false,
            })
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, step), fields(step_id = step.id))]
    async fn update_step(&self, step: &WorkflowStep) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let step = step.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let content = &step.content;
            let changed = conn
                .execute(
                    "UPDATE workflow_steps SET step_number = ?1, action = ?2, send_to = ?3,
                         reminder_body = ?4, email_subject = ?5, template = ?6,
                         number_required = ?7, sender = ?8, sender_name = ?9,
                         include_calendar_event = ?10, number_verification_pending = ?11
                     WHERE id = ?12 AND workflow_id = ?13",
                    params![
                        content.step_number,
                        content.action.to_string(),
                        content.send_to,
                        content.reminder_body,
                        content.email_subject,
                        content.template.to_string(),
                        bool_to_int(content.number_required),
                        content.sender,
                        content.sender_name,
                        bool_to_int(content.include_calendar_event),
                        bool_to_int(step.number_verification_pending),
                        step.id,
                        step.workflow_id,
                    ],
                )
                .map_err(sql_error)?;

            if changed == 0 {
                return Err(SlotflowError::NotFound(format!("workflow step {}", step.id)));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn delete_step(&self, step_id: StepId) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM workflow_steps WHERE id = ?1", [step_id])
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

struct WorkflowRow {
    id: WorkflowId,
    name: String,
    user_id: Option<i64>,
    trigger: String,
    time: Option<i64>,
    time_unit: Option<String>,
    is_active_on_all: bool,
    version: i64,
    team: Option<TeamRef>,
}

fn query_workflow(conn: &Connection, id: WorkflowId) -> DomainResult<Option<Workflow>> {
    let row = conn
        .query_row(
            "SELECT w.id, w.name, w.user_id, w.trigger, w.time, w.time_unit, w.is_active_on_all,
                    w.version, t.id, t.slug, t.name, t.is_organization
             FROM workflows w
             LEFT JOIN teams t ON t.id = w.team_id
             WHERE w.id = ?1",
            [id],
            |row| {
                let team_id: Option<i64> = row.get(8)?;
                let team = match team_id {
                    Some(team_id) => Some(TeamRef {
                        id: team_id,
                        slug: row.get(9)?,
                        name: row.get(10)?,
                        is_organization: row.get::<_, i64>(11)? != 0,
                    }),
                    None => None,
                };
                Ok(WorkflowRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    user_id: row.get(2)?,
                    trigger: row.get(3)?,
                    time: row.get(4)?,
                    time_unit: row.get(5)?,
                    is_active_on_all: row.get::<_, i64>(6)? != 0,
                    version: row.get(7)?,
                    team,
                })
            },
        )
        .optional()
        .map_err(sql_error)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let trigger: WorkflowTrigger = parse_column(&row.trigger, "trigger")?;
    let time_unit: Option<TimeUnit> =
        row.time_unit.as_deref().map(|unit| parse_column(unit, "time_unit")).transpose()?;

    Ok(Some(Workflow {
        id: row.id,
        name: row.name,
        user_id: row.user_id,
        team: row.team,
        trigger,
        time: row.time,
        time_unit,
        is_active_on_all: row.is_active_on_all,
        version: row.version,
        steps: query_steps(conn, id)?,
        active_on: query_active_on(conn, id)?,
    }))
}

struct StepRow {
    id: StepId,
    workflow_id: WorkflowId,
    step_number: i32,
    action: String,
    send_to: Option<String>,
    reminder_body: Option<String>,
    email_subject: Option<String>,
    template: String,
    number_required: bool,
    sender: Option<String>,
    sender_name: Option<String>,
    include_calendar_event: bool,
    number_verification_pending: bool,
}

impl StepRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            workflow_id: row.get(1)?,
            step_number: row.get(2)?,
            action: row.get(3)?,
            send_to: row.get(4)?,
            reminder_body: row.get(5)?,
            email_subject: row.get(6)?,
            template: row.get(7)?,
            number_required: row.get::<_, i64>(8)? != 0,
            sender: row.get(9)?,
            sender_name: row.get(10)?,
            include_calendar_event: row.get::<_, i64>(11)? != 0,
            number_verification_pending: row.get::<_, i64>(12)? != 0,
        })
    }

    fn into_step(self) -> DomainResult<WorkflowStep> {
        let action: WorkflowAction = parse_column(&self.action, "action")?;
        let template: WorkflowTemplate = parse_column(&self.template, "template")?;
        Ok(WorkflowStep {
            id: self.id,
            workflow_id: self.workflow_id,
            content: StepContent {
                action,
                step_number: self.step_number,
                send_to: self.send_to,
                reminder_body: self.reminder_body,
                email_subject: self.email_subject,
                template,
                number_required: self.number_required,
                sender: self.sender,
                sender_name: self.sender_name,
                include_calendar_event: self.include_calendar_event,
            },
            number_verification_pending: self.number_verification_pending,
        })
    }
}

fn query_steps(conn: &Connection, workflow_id: WorkflowId) -> DomainResult<Vec<WorkflowStep>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE workflow_id = ?1 ORDER BY step_number, id"
        ))
        .map_err(sql_error)?;

    let rows = stmt
        .query_map([workflow_id], StepRow::from_row)
        .map_err(sql_error)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(sql_error)?;

    rows.into_iter().map(StepRow::into_step).collect()
}

fn query_active_on(conn: &Connection, workflow_id: WorkflowId) -> DomainResult<Vec<ActiveOnTarget>> {
    let mut targets = Vec::new();

    let mut stmt = conn
        .prepare(
            "SELECT event_type_id FROM workflows_on_event_types WHERE workflow_id = ?1 ORDER BY event_type_id",
        )
        .map_err(sql_error)?;
    for id in stmt.query_map([workflow_id], |row| row.get::<_, i64>(0)).map_err(sql_error)? {
        targets.push(ActiveOnTarget::EventType(id.map_err(sql_error)?));
    }

    let mut stmt = conn
        .prepare("SELECT team_id FROM workflows_on_teams WHERE workflow_id = ?1 ORDER BY team_id")
        .map_err(sql_error)?;
    for id in stmt.query_map([workflow_id], |row| row.get::<_, i64>(0)).map_err(sql_error)? {
        targets.push(ActiveOnTarget::Team(id.map_err(sql_error)?));
    }

    Ok(targets)
}

/// Version-guarded header write. Zero affected rows means the workflow is
/// gone or somebody else bumped the version first.
fn compare_and_update_header(
    conn: &Connection,
    header: &WorkflowHeader,
    expected_version: i64,
) -> DomainResult<i64> {
    let changed = conn
        .execute(
            "UPDATE workflows
             SET name = ?1, trigger = ?2, time = ?3, time_unit = ?4, is_active_on_all = ?5,
                 version = version + 1
             WHERE id = ?6 AND version = ?7",
            params![
                header.name,
                header.trigger.to_string(),
                header.time,
                header.time_unit.map(|unit| unit.to_string()),
                bool_to_int(header.is_active_on_all),
                header.id,
                expected_version,
            ],
        )
        .map_err(sql_error)?;

    if changed == 1 {
        return Ok(expected_version + 1);
    }

    let exists: bool = conn
        .query_row("SELECT EXISTS(SELECT 1 FROM workflows WHERE id = ?1)", [header.id], |row| {
            row.get(0)
        })
        .map_err(sql_error)?;

    if exists {
        Err(SlotflowError::Conflict(format!(
            "workflow {} changed since version {expected_version}",
            header.id
        )))
    } else {
        Err(SlotflowError::NotFound(format!("workflow {}", header.id)))
    }
}

// ============================================================================
// Tests
// ============================================================================
