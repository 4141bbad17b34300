//! Workflow reminder reconciler - core business logic
//!
//! Applies an edited workflow definition and brings the scheduled reminders
//! of every affected booking in line with it. The update runs as an ordered
//! pipeline of stages; nothing is written until the `authorize` stage has
//! validated the whole request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use slotflow_domain::{
    ActiveOnTarget, Booking, BookingId, Config, EventType, EventTypeId, Result, SlotflowError,
    StepId, TeamId, Workflow, WorkflowId, WorkflowScope, WorkflowUpdate,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::authorization::AuthorizationGate;
use super::booking_fields::BookingFieldSynchronizer;
use super::canceller::{CancelReport, ReminderCanceller};
use super::context::RequestContext;
use super::ports::{
    BookingFieldRepository, BookingRepository, EntitlementResolver, EventTypeRepository,
    MembershipDirectory, NotificationProvider, ReminderRepository, WorkflowHeader,
    WorkflowRepository,
};
use super::scheduler::{ReminderScheduler, ScheduleReport, SenderDefaults, Timing};
use super::steps::StepPlan;
use super::targets::{validate_submitted_event_types, TargetDiff};

/// Adapters the reconciler runs against
#[derive(Clone)]
pub struct WorkflowPorts {
    pub workflows: Arc<dyn WorkflowRepository>,
    pub event_types: Arc<dyn EventTypeRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub reminders: Arc<dyn ReminderRepository>,
    pub booking_fields: Arc<dyn BookingFieldRepository>,
    pub memberships: Arc<dyn MembershipDirectory>,
    pub entitlements: Arc<dyn EntitlementResolver>,
    pub notifications: Arc<dyn NotificationProvider>,
}

/// Deployment-level knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub self_hosted: bool,
    pub senders: SenderDefaults,
}

impl ReconcilerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            self_hosted: config.deployment.self_hosted,
            senders: SenderDefaults {
                sender_id: config.notifications.default_sender_id.clone(),
                sender_name: config.notifications.default_sender_name.clone(),
            },
        }
    }
}

/// Counts gathered while reconciling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Version written by the header stage.
    pub version: i64,
    pub targets_added: usize,
    pub targets_removed: usize,
    pub steps_created: usize,
    pub steps_updated: usize,
    pub steps_deleted: usize,
    pub cancelled: CancelReport,
    pub scheduled: ScheduleReport,
}

/// Reloaded workflow plus what the update did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub workflow: Workflow,
    pub report: ReconcileReport,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Authorize,
    PersistHeader,
    CancelRemovedTargets,
    ScheduleAddedTargets,
    ApplySteps,
    PersistAssociations,
    SyncBookingFields,
    Reload,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::PersistHeader => "persist_header",
            Self::CancelRemovedTargets => "cancel_removed_targets",
            Self::ScheduleAddedTargets => "schedule_added_targets",
            Self::ApplySteps => "apply_steps",
            Self::PersistAssociations => "persist_associations",
            Self::SyncBookingFields => "sync_booking_fields",
            Self::Reload => "reload",
        }
    }
}

/// Everything the write stages need, computed before the first write.
struct PreparedUpdate {
    workflow: Workflow,
    header: WorkflowHeader,
    steps: StepPlan,
    targets: TargetDiff,
    timing: Timing,
}

/// Bookings fetched once per update and shared by the scheduling stages.
#[derive(Default)]
struct AffectedBookings {
    /// Upcoming accepted bookings under newly added targets.
    added: Vec<Booking>,
    /// Upcoming accepted bookings under targets that were already active.
    retained: Vec<Booking>,
}

impl AffectedBookings {
    fn added_ids(&self) -> HashSet<BookingId> {
        self.added.iter().map(|booking| booking.id).collect()
    }

    fn all(&self) -> Vec<Booking> {
        self.retained.iter().chain(&self.added).cloned().collect()
    }
}

/// Workflow reminder reconciler
pub struct WorkflowReconciler {
    workflows: Arc<dyn WorkflowRepository>,
    event_types: Arc<dyn EventTypeRepository>,
    bookings: Arc<dyn BookingRepository>,
    reminders: Arc<dyn ReminderRepository>,
    gate: AuthorizationGate,
    canceller: ReminderCanceller,
    scheduler: ReminderScheduler,
    booking_fields: BookingFieldSynchronizer,
    locks: DashMap<WorkflowId, Arc<Mutex<()>>>,
}

impl WorkflowReconciler {
    pub fn new(ports: WorkflowPorts, settings: ReconcilerSettings) -> Self {
        Self {
            gate: AuthorizationGate::new(
                ports.memberships,
                ports.entitlements,
                settings.self_hosted,
            ),
            canceller: ReminderCanceller::new(
                Arc::clone(&ports.reminders),
                Arc::clone(&ports.notifications),
            ),
            scheduler: ReminderScheduler::new(
                Arc::clone(&ports.reminders),
                ports.notifications,
                settings.senders,
            ),
            booking_fields: BookingFieldSynchronizer::new(ports.booking_fields),
            workflows: ports.workflows,
            event_types: ports.event_types,
            bookings: ports.bookings,
            reminders: ports.reminders,
            locks: DashMap::new(),
        }
    }

    /// Apply `input` to its workflow and reconcile reminders.
    ///
    /// Updates of the same workflow are serialised inside this process; the
    /// persisted version check rejects writers from other processes.
    #[instrument(skip_all, fields(workflow_id = input.id, user_id = ctx.user.id))]
    pub async fn update(&self, ctx: &RequestContext, input: WorkflowUpdate) -> Result<UpdateOutcome> {
        let workflow_id = input.id;
        let lock = self.lock_for(workflow_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.run(ctx, &input).await
        };
        drop(lock);
        self.locks.remove_if(&workflow_id, |_, lock| Arc::strong_count(lock) == 1);
        outcome
    }

    fn lock_for(&self, workflow_id: WorkflowId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(workflow_id).or_default().value())
    }

    async fn run(&self, ctx: &RequestContext, input: &WorkflowUpdate) -> Result<UpdateOutcome> {
        let workflow_id = input.id;
        let failed = |stage: Stage| {
            move |err: &SlotflowError| {
                warn!(
                    workflow_id,
                    stage = stage.as_str(),
                    error_type = err.label(),
                    error = %err,
                    "Workflow update stage failed"
                );
            }
        };

        let prepared =
            self.authorize(ctx, input).await.inspect_err(failed(Stage::Authorize))?;
        let mut report = ReconcileReport {
            targets_added: prepared.targets.added.len(),
            targets_removed: prepared.targets.removed.len(),
            ..ReconcileReport::default()
        };
        debug!(
            workflow_id,
            stage = Stage::Authorize.as_str(),
            added = report.targets_added,
            removed = report.targets_removed,
            deleted_steps = prepared.steps.deleted.len(),
            edited_steps = prepared.steps.edited.len(),
            added_steps = prepared.steps.added.len(),
            "Update authorized"
        );

        report.version = self
            .workflows
            .update_header(&prepared.header, prepared.workflow.version)
            .await
            .inspect_err(failed(Stage::PersistHeader))?;
        debug!(workflow_id, stage = Stage::PersistHeader.as_str(), version = report.version, "Header persisted");

        let cancelled = self
            .cancel_removed_targets(ctx, &prepared)
            .await
            .inspect_err(failed(Stage::CancelRemovedTargets))?;
        debug!(
            workflow_id,
            stage = Stage::CancelRemovedTargets.as_str(),
            cancelled = cancelled.cancelled,
            "Reminders under removed targets cancelled"
        );
        report.cancelled.merge(cancelled);

        let bookings = self
            .affected_bookings(ctx, &prepared)
            .await
            .inspect_err(failed(Stage::ScheduleAddedTargets))?;
        let scheduled = self
            .scheduler
            .schedule(&bookings.added, &prepared.steps.retained(), prepared.timing, ctx.now)
            .await
            .inspect_err(failed(Stage::ScheduleAddedTargets))?;
        debug!(
            workflow_id,
            stage = Stage::ScheduleAddedTargets.as_str(),
            scheduled = scheduled.scheduled,
            failed = scheduled.failed,
            "Retained steps scheduled for added targets"
        );
        report.scheduled.merge(scheduled);

        self.apply_steps(ctx, &prepared, &bookings, &mut report)
            .await
            .inspect_err(failed(Stage::ApplySteps))?;
        debug!(
            workflow_id,
            stage = Stage::ApplySteps.as_str(),
            created = report.steps_created,
            updated = report.steps_updated,
            deleted = report.steps_deleted,
            "Steps applied"
        );

        let rows = prepared.targets.rows();
        self.workflows
            .replace_active_on(workflow_id, &rows)
            .await
            .inspect_err(failed(Stage::PersistAssociations))?;
        debug!(workflow_id, stage = Stage::PersistAssociations.as_str(), targets = rows.len(), "Associations replaced");

        if prepared.targets.scope == WorkflowScope::EventTypeScoped {
            let active: Vec<EventTypeId> = prepared.targets.active.iter().copied().collect();
            let removed: Vec<EventTypeId> = prepared.targets.removed.iter().copied().collect();
            self.booking_fields
                .sync(workflow_id, &active, &removed, &prepared.steps.final_contents())
                .await
                .inspect_err(failed(Stage::SyncBookingFields))?;
            debug!(workflow_id, stage = Stage::SyncBookingFields.as_str(), "Booking fields synced");
        }

        let workflow = self
            .workflows
            .find_by_id(workflow_id)
            .await
            .and_then(|found| {
                found.ok_or_else(|| SlotflowError::NotFound(format!("workflow {workflow_id}")))
            })
            .inspect_err(failed(Stage::Reload))?;

        info!(
            workflow_id,
            stage = Stage::Reload.as_str(),
            version = report.version,
            cancelled = report.cancelled.cancelled,
            scheduled = report.scheduled.scheduled,
            delivery_failed = report.scheduled.failed,
            "Workflow updated"
        );
        Ok(UpdateOutcome { workflow, report })
    }

    async fn authorize(&self, ctx: &RequestContext, input: &WorkflowUpdate) -> Result<PreparedUpdate> {
        let workflow = self
            .workflows
            .find_by_id(input.id)
            .await?
            .ok_or_else(|| SlotflowError::NotFound(format!("workflow {}", input.id)))?;

        let access = self.gate.authorize_workflow(ctx, &workflow).await?;
        debug!(workflow_id = workflow.id, organization_admin = access.organization_admin, "Workflow access granted");
        self.gate.ensure_steps_belong(&workflow, &input.steps)?;

        if input.trigger.is_offset_based() && input.offset().is_none() {
            return Err(SlotflowError::InvalidInput(format!(
                "{} needs a non-negative time and a time unit",
                input.trigger
            )));
        }
        if let Some(expected) = input.expected_version {
            if expected != workflow.version {
                return Err(SlotflowError::Conflict(format!(
                    "workflow {} is at version {}, request expected {expected}",
                    workflow.id, workflow.version
                )));
            }
        }

        let timing_changed = workflow.trigger != input.trigger
            || workflow.time != input.time
            || workflow.time_unit != input.time_unit;
        let steps = StepPlan::build(
            &workflow.steps,
            &input.steps,
            timing_changed,
            self.scheduler.defaults(),
        )?;

        let gated = steps.edited.iter().any(|edit| edit.content.action.is_sms_or_whatsapp())
            || steps.added.iter().any(|content| content.action.is_sms_or_whatsapp());
        if gated {
            let entitlement = self.gate.resolve_entitlement(ctx, &workflow).await?;
            for edit in &steps.edited {
                entitlement.ensure_step_allowed(Some(edit.previous.content.action), edit.content.action)?;
            }
            for content in &steps.added {
                entitlement.ensure_step_allowed(None, content.action)?;
            }
        }

        let targets = match workflow.scope() {
            WorkflowScope::EventTypeScoped => self.diff_event_types(&workflow, &input.active_on).await?,
            WorkflowScope::TeamScoped { organization_id } => {
                let previous: Vec<TeamId> = target_ids(&workflow.active_on);
                let diff = TargetDiff::teams(organization_id, &previous, &input.active_on);
                let added: Vec<TeamId> = diff.added.iter().copied().collect();
                self.gate.authorize_added_teams(organization_id, &added).await?;
                diff
            }
        };

        Ok(PreparedUpdate {
            header: WorkflowHeader {
                id: workflow.id,
                name: input.name.clone(),
                trigger: input.trigger,
                time: input.time,
                time_unit: input.time_unit,
                is_active_on_all: input.is_active_on_all,
            },
            timing: Timing { trigger: input.trigger, offset: input.offset() },
            workflow,
            steps,
            targets,
        })
    }

    async fn diff_event_types(
        &self,
        workflow: &Workflow,
        submitted: &[EventTypeId],
    ) -> Result<TargetDiff> {
        let previous: Vec<EventTypeId> = target_ids(&workflow.active_on);
        let mut lookup: Vec<EventTypeId> = previous.iter().chain(submitted).copied().collect();
        lookup.sort_unstable();
        lookup.dedup();

        let catalog: HashMap<EventTypeId, EventType> = self
            .event_types
            .find_by_ids(&lookup)
            .await?
            .into_iter()
            .map(|event_type| (event_type.id, event_type))
            .collect();
        validate_submitted_event_types(submitted, &catalog)?;

        let diff = TargetDiff::event_types(&previous, submitted, &catalog);
        let added: Vec<&EventType> = diff.added.iter().filter_map(|id| catalog.get(id)).collect();
        self.gate.authorize_added_event_types(workflow, &added).await?;
        Ok(diff)
    }

    /// Cancel reminders of the pre-update steps for bookings that are no
    /// longer covered.
    async fn cancel_removed_targets(
        &self,
        ctx: &RequestContext,
        prepared: &PreparedUpdate,
    ) -> Result<CancelReport> {
        let targets = &prepared.targets;
        if targets.removed.is_empty() || prepared.workflow.steps.is_empty() {
            return Ok(CancelReport::default());
        }

        let mut booking_ids: HashSet<BookingId> =
            self.bookings.find_ids(&targets.filter(&targets.removed)).await?.into_iter().collect();
        // A booking may sit under a removed team and a kept one at once.
        if matches!(targets.scope, WorkflowScope::TeamScoped { .. }) && !targets.active.is_empty() {
            for id in self.bookings.find_ids(&targets.filter(&targets.active)).await? {
                booking_ids.remove(&id);
            }
        }
        if booking_ids.is_empty() {
            return Ok(CancelReport::default());
        }

        let step_ids: Vec<StepId> = prepared.workflow.steps.iter().map(|step| step.id).collect();
        let stale = self
            .reminders
            .find_by_steps(&step_ids)
            .await?
            .into_iter()
            .filter(|reminder| booking_ids.contains(&reminder.booking_id))
            .collect();
        self.canceller.cancel_all(stale, ctx.now).await
    }

    async fn affected_bookings(
        &self,
        ctx: &RequestContext,
        prepared: &PreparedUpdate,
    ) -> Result<AffectedBookings> {
        let targets = &prepared.targets;
        let mut bookings = AffectedBookings::default();
        if !prepared.timing.schedules_on_edit() {
            return Ok(bookings);
        }

        let steps_changed = !prepared.steps.edited.is_empty() || !prepared.steps.added.is_empty();
        let has_added = !targets.added_expanded.is_empty();
        if !targets.retained.is_empty() && (steps_changed || has_added) {
            bookings.retained = self
                .bookings
                .find_upcoming_accepted(&targets.filter(&targets.retained), ctx.now)
                .await?;
        }
        if has_added {
            let retained: HashSet<BookingId> =
                bookings.retained.iter().map(|booking| booking.id).collect();
            bookings.added = self
                .bookings
                .find_upcoming_accepted(&targets.filter(&targets.added_expanded), ctx.now)
                .await?
                .into_iter()
                .filter(|booking| !retained.contains(&booking.id))
                .collect();
        }
        Ok(bookings)
    }

    async fn apply_steps(
        &self,
        ctx: &RequestContext,
        prepared: &PreparedUpdate,
        bookings: &AffectedBookings,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let workflow_id = prepared.workflow.id;

        for step in &prepared.steps.deleted {
            let reminders = self.reminders.find_by_steps(&[step.id]).await?;
            report.cancelled.merge(self.canceller.cancel_all(reminders, ctx.now).await?);
            self.workflows.delete_step(step.id).await?;
            report.steps_deleted += 1;
        }

        let added_ids = bookings.added_ids();
        for edit in &prepared.steps.edited {
            let updated = edit.updated();
            self.workflows.update_step(&updated).await?;
            report.steps_updated += 1;

            let stale = self
                .reminders
                .find_by_steps(&[updated.id])
                .await?
                .into_iter()
                .filter(|reminder| !added_ids.contains(&reminder.booking_id))
                .collect();
            report.cancelled.merge(self.canceller.cancel_all(stale, ctx.now).await?);

            let scheduled = self
                .scheduler
                .schedule(&bookings.retained, std::slice::from_ref(&updated), prepared.timing, ctx.now)
                .await?;
            report.scheduled.merge(scheduled);
        }

        let everything = bookings.all();
        for content in &prepared.steps.added {
            let created = self.workflows.create_step(workflow_id, content).await?;
            report.steps_created += 1;

            let scheduled = self
                .scheduler
                .schedule(&everything, std::slice::from_ref(&created), prepared.timing, ctx.now)
                .await?;
            report.scheduled.merge(scheduled);
        }
        Ok(())
    }
}

fn target_ids(targets: &[ActiveOnTarget]) -> Vec<i64> {
    targets.iter().map(|target| target.id()).collect()
}
