//! Step differ
//!
//! Classifies submitted steps against the persisted ones. Stored and
//! submitted content are both normalised before comparison, so resubmitting
//! what was loaded never registers as an edit.

use std::collections::{HashMap, HashSet};

use slotflow_domain::{Result, SlotflowError, StepContent, StepId, StepInput, WorkflowStep};

use super::scheduler::SenderDefaults;

/// A persisted step whose content changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedStep {
    pub previous: WorkflowStep,
    /// Normalised replacement content.
    pub content: StepContent,
}

impl EditedStep {
    /// The step as it will be persisted.
    pub fn updated(&self) -> WorkflowStep {
        WorkflowStep {
            id: self.previous.id,
            workflow_id: self.previous.workflow_id,
            content: self.content.clone(),
            number_verification_pending: false,
        }
    }
}

/// Classification of every step touched by an update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepPlan {
    pub deleted: Vec<WorkflowStep>,
    pub unchanged: Vec<WorkflowStep>,
    pub edited: Vec<EditedStep>,
    /// Normalised content of steps to create.
    pub added: Vec<StepContent>,
}

impl StepPlan {
    /// Build the plan. With `timing_changed` every retained step counts as
    /// edited so its reminders move to the new fire time. Attendee-direct
    /// steps are exempt: their reminders follow the booking, not the offset.
    ///
    /// Both sides are normalised before comparing, so a stored row that
    /// predates normalisation is not an edit.
    pub fn build(
        previous: &[WorkflowStep],
        submitted: &[StepInput],
        timing_changed: bool,
        defaults: &SenderDefaults,
    ) -> Result<Self> {
        let known: HashMap<StepId, &WorkflowStep> =
            previous.iter().map(|step| (step.id, step)).collect();

        let mut seen = HashSet::new();
        for step in submitted.iter().filter(|step| !step.is_new()) {
            if !seen.insert(step.id) {
                return Err(SlotflowError::InvalidInput(format!(
                    "step {} submitted more than once",
                    step.id
                )));
            }
            if !known.contains_key(&step.id) {
                return Err(SlotflowError::InvalidInput(format!(
                    "step {} does not belong to this workflow",
                    step.id
                )));
            }
        }

        let mut plan = StepPlan::default();
        for step in previous {
            if !seen.contains(&step.id) {
                plan.deleted.push(step.clone());
            }
        }

        for input in submitted {
            let content = normalize(input.content.clone(), defaults);
            match known.get(&input.id) {
                None => plan.added.push(content),
                Some(previous)
                    if normalize(previous.content.clone(), defaults) == content
                        && (!timing_changed || content.action.is_attendee_direct()) =>
                {
                    plan.unchanged.push((*previous).clone());
                }
                Some(previous) => {
                    plan.edited.push(EditedStep { previous: (*previous).clone(), content });
                }
            }
        }
        Ok(plan)
    }

    /// Steps that survive the update with their final content.
    pub fn retained(&self) -> Vec<WorkflowStep> {
        self.unchanged
            .iter()
            .cloned()
            .chain(self.edited.iter().map(EditedStep::updated))
            .collect()
    }

    /// Final content of every step after the update.
    pub fn final_contents(&self) -> Vec<StepContent> {
        self.unchanged
            .iter()
            .map(|step| step.content.clone())
            .chain(self.edited.iter().map(|edit| edit.content.clone()))
            .chain(self.added.iter().cloned())
            .collect()
    }
}

/// Canonical form of step content as stored.
pub fn normalize(mut content: StepContent, defaults: &SenderDefaults) -> StepContent {
    if !content.action.requires_send_to() {
        content.send_to = None;
    }
    if content.action.is_sms_or_whatsapp() {
        content.sender = Some(non_blank(content.sender).unwrap_or_else(|| defaults.sender_id.clone()));
        content.sender_name = None;
    } else {
        content.sender_name =
            Some(non_blank(content.sender_name).unwrap_or_else(|| defaults.sender_name.clone()));
        content.sender = None;
    }
    content
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
