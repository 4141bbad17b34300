//! Authorization gate for workflow updates
//!
//! Every check here runs before the first mutation, so a rejected update
//! leaves the store untouched.

use std::sync::Arc;

use slotflow_domain::{
    EventType, Result, SlotflowError, StepInput, TeamId, Workflow, WorkflowAction,
};
use tracing::debug;

use super::context::RequestContext;
use super::ports::{EntitlementResolver, MembershipDirectory};

/// Plan-tier entitlement of the acting user, resolved once per update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    paid: bool,
}

impl Entitlement {
    pub fn paid() -> Self {
        Self { paid: true }
    }

    pub fn free() -> Self {
        Self { paid: false }
    }

    pub fn allows_paid_actions(self) -> bool {
        self.paid
    }

    /// Reject creating an SMS/WhatsApp step, or converting a step into one,
    /// without a paid entitlement. Steps that already were SMS/WhatsApp keep
    /// their channel.
    pub fn ensure_step_allowed(
        self,
        previous: Option<WorkflowAction>,
        next: WorkflowAction,
    ) -> Result<()> {
        if self.paid || !next.is_sms_or_whatsapp() {
            return Ok(());
        }
        match previous {
            Some(action) if action.is_sms_or_whatsapp() => Ok(()),
            _ => Err(SlotflowError::Unauthorized(format!(
                "{next} steps require a paid plan"
            ))),
        }
    }
}

/// Rights the acting user holds on a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowAccess {
    /// Admin or owner of the organization that owns the workflow.
    pub organization_admin: bool,
}

/// Validates that the acting user may perform an update
pub struct AuthorizationGate {
    memberships: Arc<dyn MembershipDirectory>,
    entitlements: Arc<dyn EntitlementResolver>,
    self_hosted: bool,
}

impl AuthorizationGate {
    pub fn new(
        memberships: Arc<dyn MembershipDirectory>,
        entitlements: Arc<dyn EntitlementResolver>,
        self_hosted: bool,
    ) -> Self {
        Self { memberships, entitlements, self_hosted }
    }

    /// Personal workflows are editable by their owner, team workflows by
    /// team admins and owners.
    pub async fn authorize_workflow(
        &self,
        ctx: &RequestContext,
        workflow: &Workflow,
    ) -> Result<WorkflowAccess> {
        match &workflow.team {
            Some(team) => {
                let team_id = team.id;
                let role = self.memberships.role(team_id, ctx.user.id).await?;
                if role.is_some_and(|role| role.can_edit_workflows()) {
                    Ok(WorkflowAccess { organization_admin: team.is_organization })
                } else {
                    Err(SlotflowError::Unauthorized(format!(
                        "user {} cannot edit workflows of team {team_id}",
                        ctx.user.id
                    )))
                }
            }
            None if workflow.user_id == Some(ctx.user.id) => {
                Ok(WorkflowAccess { organization_admin: false })
            }
            None => Err(SlotflowError::Unauthorized(format!(
                "user {} does not own workflow {}",
                ctx.user.id, workflow.id
            ))),
        }
    }

    /// Every submitted step must name the workflow being updated.
    pub fn ensure_steps_belong(&self, workflow: &Workflow, steps: &[StepInput]) -> Result<()> {
        match steps.iter().find(|step| step.workflow_id != workflow.id) {
            Some(step) => Err(SlotflowError::Unauthorized(format!(
                "step {} belongs to workflow {}, not {}",
                step.id, step.workflow_id, workflow.id
            ))),
            None => Ok(()),
        }
    }

    /// Self-hosted deployments, premium users and organization workflows
    /// are entitled without asking the plan lookup.
    pub async fn resolve_entitlement(
        &self,
        ctx: &RequestContext,
        workflow: &Workflow,
    ) -> Result<Entitlement> {
        if self.self_hosted || ctx.user.is_premium {
            return Ok(Entitlement::paid());
        }
        if workflow.team.as_ref().is_some_and(|team| team.is_organization) {
            return Ok(Entitlement::paid());
        }
        let paid = self.entitlements.has_team_plan(ctx.user.id).await?;
        debug!(user_id = ctx.user.id, paid, "Resolved team plan entitlement");
        Ok(if paid { Entitlement::paid() } else { Entitlement::free() })
    }

    /// Newly added event types must belong to the workflow's team, or for
    /// personal workflows be owned by the owner or sit in one of their teams.
    pub async fn authorize_added_event_types(
        &self,
        workflow: &Workflow,
        added: &[&EventType],
    ) -> Result<()> {
        for event_type in added {
            let allowed = match (workflow.team_id(), workflow.user_id) {
                (Some(team_id), _) => event_type.team_id == Some(team_id),
                (None, Some(owner)) => {
                    event_type.owner_user_id == Some(owner)
                        || match event_type.team_id {
                            Some(team_id) => self.memberships.role(team_id, owner).await?.is_some(),
                            None => false,
                        }
                }
                (None, None) => false,
            };
            if !allowed {
                return Err(SlotflowError::Unauthorized(format!(
                    "event type {} is not available to workflow {}",
                    event_type.id, workflow.id
                )));
            }
        }
        Ok(())
    }

    /// Newly added teams must be the organization or one of its sub-teams.
    pub async fn authorize_added_teams(
        &self,
        organization_id: TeamId,
        added: &[TeamId],
    ) -> Result<()> {
        for &team_id in added {
            let team = self
                .memberships
                .find_team(team_id)
                .await?
                .ok_or_else(|| SlotflowError::InvalidInput(format!("unknown team {team_id}")))?;
            if !team.belongs_to_organization(organization_id) {
                return Err(SlotflowError::Unauthorized(format!(
                    "team {team_id} is outside organization {organization_id}"
                )));
            }
        }
        Ok(())
    }
}
