//! Application context - dependency injection container

use std::sync::Arc;

use slotflow_core::workflows::{
    ReconcilerSettings, WorkflowPorts, WorkflowReconciler, WorkflowRepository,
};
use slotflow_domain::{Config, Result};
use slotflow_infra::notifications::provider_from_config;
use slotflow_infra::{
    DbManager, SqliteBookingFieldRepository, SqliteBookingRepository, SqliteEventTypeRepository,
    SqliteReminderRepository, SqliteTeamRepository, SqliteWorkflowRepository,
};
use tracing::info;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub reconciler: Arc<WorkflowReconciler>,
}

impl AppContext {
    /// Build the context from `SLOTFLOW_*` variables or a config file.
    pub fn new() -> Result<Self> {
        Self::new_with_config(slotflow_infra::config::load()?)
    }

    /// Open the database, apply the schema and wire the reconciler.
    pub fn new_with_config(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let workflows = Arc::new(SqliteWorkflowRepository::new(Arc::clone(&db)));
        let teams = Arc::new(SqliteTeamRepository::new(Arc::clone(&db)));
        let ports = WorkflowPorts {
            workflows: workflows.clone(),
            event_types: Arc::new(SqliteEventTypeRepository::new(Arc::clone(&db))),
            bookings: Arc::new(SqliteBookingRepository::new(Arc::clone(&db))),
            reminders: Arc::new(SqliteReminderRepository::new(Arc::clone(&db))),
            booking_fields: Arc::new(SqliteBookingFieldRepository::new(Arc::clone(&db))),
            memberships: teams.clone(),
            entitlements: teams,
            notifications: provider_from_config(&config.notifications)?,
        };

        let reconciler =
            Arc::new(WorkflowReconciler::new(ports, ReconcilerSettings::from_config(&config)));

        info!(
            db_path = %db.path().display(),
            self_hosted = config.deployment.self_hosted,
            remote_delivery = config.notifications.endpoint.is_some(),
            "application context initialised"
        );

        Ok(Self { config, db, workflows, reconciler })
    }

    /// Verify the database is reachable.
    pub fn health_check(&self) -> Result<()> {
        self.db.health_check()
    }
}
