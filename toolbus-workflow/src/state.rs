//! Workflow status state machine and per-workflow state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use toolbus_primitives::WorkflowId;
use tracing::debug;

use crate::steps::{EntityType, WorkflowStep, advance, merge_collected_data};

/// Discrete statuses a workflow can occupy during its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Created but no collection turn has run yet.
    Pending,
    /// Collecting entity fields turn by turn.
    Collecting,
    /// All fields collected; awaiting the explicit confirmation turn.
    Confirming,
    /// Confirmation given; the tool call is in flight.
    Executing,
    /// Tool call succeeded. Terminal.
    Completed,
    /// Aborted by the user or failed during execution. Terminal.
    Cancelled,
}

impl WorkflowStatus {
    /// Returns `true` once the workflow can never advance again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Events that drive workflow status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// Begin the first collection turn.
    Start,
    /// All required fields are collected; ask for confirmation.
    ReadyToConfirm,
    /// The user confirmed; execute the tool call.
    Confirm,
    /// The tool call succeeded.
    ExecutionSucceeded,
    /// The tool call failed; the workflow terminates rather than retrying.
    ExecutionFailed,
    /// The user aborted the workflow.
    Cancel,
}

/// Operation a workflow performs once confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowAction {
    /// Create a new entity.
    Create,
    /// Update an existing entity.
    Update,
}

/// Errors emitted by the workflow state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// Transition was not permitted from the current status.
    #[error("invalid workflow transition from {from:?} via {event:?} for workflow {id}")]
    InvalidTransition {
        /// Identifier of the workflow whose transition failed.
        id: WorkflowId,
        /// Status prior to the attempted transition.
        from: WorkflowStatus,
        /// Event that triggered the failure.
        event: WorkflowEvent,
    },

    /// A collection turn ran while the workflow was not collecting.
    #[error("workflow {id} is {status:?}, not collecting")]
    NotCollecting {
        /// Identifier of the offending workflow.
        id: WorkflowId,
        /// Status the workflow was actually in.
        status: WorkflowStatus,
    },
}

/// Result alias for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// One in-progress guided multi-turn operation.
///
/// Mutated turn by turn: each collection turn merges newly collected fields
/// and advances the step pointer; terminated on completion or cancellation,
/// never revived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    id: WorkflowId,
    entity: EntityType,
    action: WorkflowAction,
    status: WorkflowStatus,
    current_step: WorkflowStep,
    collected: Map<String, Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Creates a fresh workflow in [`WorkflowStatus::Pending`].
    #[must_use]
    pub fn new(entity: EntityType, action: WorkflowAction) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::random(),
            entity,
            action,
            status: WorkflowStatus::Pending,
            current_step: WorkflowStep::Init,
            collected: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the workflow identifier.
    #[must_use]
    pub const fn id(&self) -> WorkflowId {
        self.id
    }

    /// Returns the entity type this workflow creates or updates.
    #[must_use]
    pub const fn entity(&self) -> EntityType {
        self.entity
    }

    /// Returns the action performed once confirmed.
    #[must_use]
    pub const fn action(&self) -> WorkflowAction {
        self.action
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Returns the current step in the entity's sequence.
    #[must_use]
    pub const fn current_step(&self) -> WorkflowStep {
        self.current_step
    }

    /// Returns the accumulated field values.
    #[must_use]
    pub const fn collected(&self) -> &Map<String, Value> {
        &self.collected
    }

    /// Returns when the workflow was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the workflow last changed.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies a status event, returning the resulting status.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidTransition`] when the supplied event
    /// is not allowed from the current status.
    pub fn apply(&mut self, event: WorkflowEvent) -> WorkflowResult<WorkflowStatus> {
        let next = match (self.status, event) {
            (WorkflowStatus::Pending, WorkflowEvent::Start) => Some(WorkflowStatus::Collecting),
            (WorkflowStatus::Collecting, WorkflowEvent::ReadyToConfirm) => {
                Some(WorkflowStatus::Confirming)
            }
            (WorkflowStatus::Confirming, WorkflowEvent::Confirm) => Some(WorkflowStatus::Executing),
            (WorkflowStatus::Executing, WorkflowEvent::ExecutionSucceeded) => {
                Some(WorkflowStatus::Completed)
            }
            // Execution failure is terminal; a caller wanting a retry starts
            // a fresh workflow.
            (WorkflowStatus::Executing, WorkflowEvent::ExecutionFailed)
            | (
                WorkflowStatus::Collecting | WorkflowStatus::Confirming,
                WorkflowEvent::Cancel,
            ) => Some(WorkflowStatus::Cancelled),
            _ => None,
        };

        let Some(next_status) = next else {
            return Err(WorkflowError::InvalidTransition {
                id: self.id,
                from: self.status,
                event,
            });
        };

        if next_status != self.status {
            debug!(
                workflow_id = %self.id,
                ?self.status,
                ?next_status,
                ?event,
                "workflow status transition"
            );
            self.status = next_status;
            self.updated_at = Utc::now();
        }

        Ok(self.status)
    }

    /// Runs one collection turn: merges newly collected fields (right-biased)
    /// and advances the step pointer.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotCollecting`] unless the workflow is in
    /// [`WorkflowStatus::Collecting`].
    pub fn collect(&mut self, incoming: &Map<String, Value>) -> WorkflowResult<WorkflowStep> {
        if self.status != WorkflowStatus::Collecting {
            return Err(WorkflowError::NotCollecting {
                id: self.id,
                status: self.status,
            });
        }

        self.collected = merge_collected_data(&self.collected, incoming);
        self.current_step = advance(self.current_step, self.entity);
        self.updated_at = Utc::now();
        Ok(self.current_step)
    }
}
