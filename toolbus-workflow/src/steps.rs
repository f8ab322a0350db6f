//! Step sequences per entity type, and the pure predicates over them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entity kinds a guided workflow can create or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A task with name, description, assignee, and due date.
    Task,
    /// An organization with name and description only.
    Organization,
}

impl EntityType {
    /// Returns the ordered step sequence for this entity type.
    #[must_use]
    pub const fn steps(self) -> &'static [WorkflowStep] {
        match self {
            Self::Task => TASK_STEPS,
            Self::Organization => ORGANIZATION_STEPS,
        }
    }
}

/// One position in an entity's step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Workflow created, nothing collected yet.
    Init,
    /// Collecting the entity name.
    CollectName,
    /// Collecting the description.
    CollectDescription,
    /// Collecting the assignee (tasks only).
    CollectAssignee,
    /// Collecting the due date (tasks only).
    CollectDate,
    /// Awaiting the explicit confirmation turn.
    CollectConfirmation,
}

impl WorkflowStep {
    /// Returns the collected-data field this step fills, if any.
    #[must_use]
    pub const fn field(self) -> Option<&'static str> {
        match self {
            Self::Init | Self::CollectConfirmation => None,
            Self::CollectName => Some("name"),
            Self::CollectDescription => Some("description"),
            Self::CollectAssignee => Some("assignee"),
            Self::CollectDate => Some("due_date"),
        }
    }
}

const TASK_STEPS: &[WorkflowStep] = &[
    WorkflowStep::Init,
    WorkflowStep::CollectName,
    WorkflowStep::CollectDescription,
    WorkflowStep::CollectAssignee,
    WorkflowStep::CollectDate,
    WorkflowStep::CollectConfirmation,
];

const ORGANIZATION_STEPS: &[WorkflowStep] = &[
    WorkflowStep::Init,
    WorkflowStep::CollectName,
    WorkflowStep::CollectDescription,
    WorkflowStep::CollectConfirmation,
];

/// Returns the successor of `current` in the entity's step sequence.
///
/// The step pointer only moves forward. At the end of a sequence the current
/// step is returned unchanged, making repeated advancement at the boundary a
/// named no-op rather than an out-of-bounds condition. Steps outside the
/// entity's sequence also stay put; they are never scheduled for that
/// entity.
#[must_use]
pub const fn advance(current: WorkflowStep, entity: EntityType) -> WorkflowStep {
    match entity {
        EntityType::Task => match current {
            WorkflowStep::Init => WorkflowStep::CollectName,
            WorkflowStep::CollectName => WorkflowStep::CollectDescription,
            WorkflowStep::CollectDescription => WorkflowStep::CollectAssignee,
            WorkflowStep::CollectAssignee => WorkflowStep::CollectDate,
            WorkflowStep::CollectDate | WorkflowStep::CollectConfirmation => {
                WorkflowStep::CollectConfirmation
            }
        },
        EntityType::Organization => match current {
            WorkflowStep::Init => WorkflowStep::CollectName,
            WorkflowStep::CollectName => WorkflowStep::CollectDescription,
            WorkflowStep::CollectDescription | WorkflowStep::CollectConfirmation => {
                WorkflowStep::CollectConfirmation
            }
            WorkflowStep::CollectAssignee | WorkflowStep::CollectDate => current,
        },
    }
}

/// Returns `true` when the step's field still needs to be asked for.
///
/// Steps that do not belong to the entity's sequence are never prompted,
/// regardless of collected data; steps without a field (init, confirmation)
/// collect nothing.
#[must_use]
pub fn should_prompt_for_field(
    step: WorkflowStep,
    entity: EntityType,
    collected: &Map<String, Value>,
) -> bool {
    if !entity.steps().contains(&step) {
        return false;
    }
    let Some(field) = step.field() else {
        return false;
    };
    !collected.get(field).is_some_and(|value| !value.is_null())
}

/// Right-biased shallow merge: fields present in `incoming` overwrite
/// `existing`; fields absent from `incoming` are preserved.
#[must_use]
pub fn merge_collected_data(
    existing: &Map<String, Value>,
    incoming: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = existing.clone();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
