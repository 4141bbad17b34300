//! Active-on target differ
//!
//! Compares the persisted association rows with the submitted ids. Event
//! type targets are expanded with their managed children on both sides so
//! that a parent and its copies always move together.

use std::collections::{BTreeSet, HashMap};

use slotflow_domain::{
    ActiveOnTarget, EventType, EventTypeId, Result, SlotflowError, TeamId, WorkflowScope,
};

use super::ports::BookingFilter;

/// Result of diffing previous and submitted targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDiff {
    pub scope: WorkflowScope,
    /// Final target set, children included. This is what gets persisted.
    pub active: BTreeSet<i64>,
    /// Submitted ids that were not covered before.
    pub added: BTreeSet<i64>,
    /// `added` together with their children.
    pub added_expanded: BTreeSet<i64>,
    /// Previously covered ids that are no longer covered.
    pub removed: BTreeSet<i64>,
    /// Final targets that were already covered before the update.
    pub retained: BTreeSet<i64>,
}

impl TargetDiff {
    /// Diff event type targets. `catalog` must hold every previous and
    /// submitted event type.
    pub fn event_types(
        previous_rows: &[EventTypeId],
        submitted: &[EventTypeId],
        catalog: &HashMap<EventTypeId, EventType>,
    ) -> Self {
        let previous = expand(previous_rows.iter().copied(), catalog);
        let active = expand(submitted.iter().copied(), catalog);
        let added: BTreeSet<i64> =
            submitted.iter().copied().filter(|id| !previous.contains(id)).collect();
        let added_expanded = expand(added.iter().copied(), catalog);

        Self::assemble(WorkflowScope::EventTypeScoped, previous, active, added, added_expanded)
    }

    /// Diff team targets of an organization workflow. Teams are not
    /// expanded.
    pub fn teams(organization_id: TeamId, previous_rows: &[TeamId], submitted: &[TeamId]) -> Self {
        let previous: BTreeSet<i64> = previous_rows.iter().copied().collect();
        let active: BTreeSet<i64> = submitted.iter().copied().collect();
        let added: BTreeSet<i64> = active.difference(&previous).copied().collect();
        let added_expanded = added.clone();

        Self::assemble(
            WorkflowScope::TeamScoped { organization_id },
            previous,
            active,
            added,
            added_expanded,
        )
    }

    fn assemble(
        scope: WorkflowScope,
        previous: BTreeSet<i64>,
        active: BTreeSet<i64>,
        added: BTreeSet<i64>,
        added_expanded: BTreeSet<i64>,
    ) -> Self {
        let removed = previous.difference(&active).copied().collect();
        let retained = active.difference(&added_expanded).copied().collect();
        Self { scope, active, added, added_expanded, removed, retained }
    }

    /// Association rows to persist.
    pub fn rows(&self) -> Vec<ActiveOnTarget> {
        self.active.iter().map(|&id| self.scope.target(id)).collect()
    }

    /// Booking filter covering `ids` under this diff's scope.
    pub fn filter(&self, ids: &BTreeSet<i64>) -> BookingFilter {
        let ids = ids.iter().copied().collect();
        match self.scope {
            WorkflowScope::EventTypeScoped => BookingFilter::EventTypes(ids),
            WorkflowScope::TeamScoped { .. } => BookingFilter::Teams(ids),
        }
    }
}

fn expand(
    ids: impl Iterator<Item = EventTypeId>,
    catalog: &HashMap<EventTypeId, EventType>,
) -> BTreeSet<i64> {
    let mut expanded = BTreeSet::new();
    for id in ids {
        match catalog.get(&id) {
            Some(event_type) => expanded.extend(event_type.with_children()),
            None => {
                expanded.insert(id);
            }
        }
    }
    expanded
}

/// Reject submitted event types that do not exist or are managed children.
pub fn validate_submitted_event_types(
    submitted: &[EventTypeId],
    catalog: &HashMap<EventTypeId, EventType>,
) -> Result<()> {
    for id in submitted {
        match catalog.get(id) {
            None => {
                return Err(SlotflowError::InvalidInput(format!("unknown event type {id}")));
            }
            Some(event_type) if event_type.parent_id.is_some() => {
                return Err(SlotflowError::InvalidInput(format!(
                    "event type {id} is managed by its parent and cannot be targeted directly"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
