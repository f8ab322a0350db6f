//! Guided multi-turn workflow engine.
//!
//! A pure state machine, independent of the channel, that sequences the
//! turns needed to collect entity-creation data and gates execution behind
//! an explicit confirmation turn. The engine performs no I/O; executing the
//! resulting tool call is the caller's job.

#![warn(missing_docs, clippy::pedantic)]

mod state;
mod steps;
mod store;

pub use state::{WorkflowAction, WorkflowError, WorkflowEvent, WorkflowResult, WorkflowState, WorkflowStatus};
pub use steps::{EntityType, WorkflowStep, advance, merge_collected_data, should_prompt_for_field};
pub use store::WorkflowStore;
