//! Worker-side toolbus runtime.
//!
//! Holds the set of registered tools, authenticates and dispatches incoming
//! `tools/list` and `tools/call` requests, and serves the dispatcher over a
//! line-framed byte stream (typically the worker's stdin/stdout).

#![warn(missing_docs, clippy::pedantic)]

mod dispatch;
mod registry;
mod serve;

pub use dispatch::{CallContext, Dispatcher};
pub use registry::{
    HandlerError, HandlerResult, RegistryError, RegistryResult, ToolHandle, ToolHandler,
    ToolRegistry,
};
pub use serve::{ServeError, serve};
