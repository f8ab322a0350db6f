//! Core primitive types shared across the toolbus runtime: principal and
//! workflow identifiers, plus the error type their constructors produce.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;

pub use error::{Error, Result};
pub use ids::{PrincipalId, WorkflowId};
