//! Workflow commands

use std::time::Instant;

use slotflow_core::workflows::{RequestContext, UpdateOutcome};
use slotflow_core::{ActingUser, WorkflowRepository};
use slotflow_domain::{Result, SlotflowError, Workflow, WorkflowId, WorkflowUpdate};
use tracing::instrument;

use crate::context::AppContext;
use crate::utils::logging::log_command_execution;

/// Apply an edited workflow and reconcile its reminders.
#[instrument(skip(ctx, update), fields(workflow_id = update.id, user_id = user.id))]
pub async fn update_workflow(
    ctx: &AppContext,
    user: ActingUser,
    update: WorkflowUpdate,
) -> Result<UpdateOutcome> {
    let start = Instant::now();
    let result = ctx.reconciler.update(&RequestContext::new(user), update).await;
    log_command_execution("workflows::update_workflow", start.elapsed(), result.as_ref().map(|_| ()));
    result
}

/// Load a workflow with its steps and targets.
#[instrument(skip(ctx))]
pub async fn get_workflow(ctx: &AppContext, id: WorkflowId) -> Result<Workflow> {
    let start = Instant::now();
    let result = ctx
        .workflows
        .find_by_id(id)
        .await
        .and_then(|found| found.ok_or_else(|| SlotflowError::NotFound(format!("workflow {id}"))));
    log_command_execution("workflows::get_workflow", start.elapsed(), result.as_ref().map(|_| ()));
    result
}
