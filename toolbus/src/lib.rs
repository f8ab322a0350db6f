//! Tool-calling runtime SDK facade.
//!
//! Depend on this crate via `cargo add toolbus`. It bundles the runtime
//! crates behind feature flags so hosts can enable only the sides they need:
//! a host application typically wants `client` (and `workflow`), a worker
//! process wants `server` and `auth`.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use toolbus_primitives as primitives;

/// Wire format: envelopes, tool types, line codec (enabled by `wire` feature).
#[cfg(feature = "wire")]
pub use toolbus_wire as wire;

/// Worker process client (enabled by `client` feature).
#[cfg(feature = "client")]
pub use toolbus_client as client;

/// Call authentication and API key management (enabled by `auth` feature).
#[cfg(feature = "auth")]
pub use toolbus_auth as auth;

/// Tool registry, dispatch, and serve loop (enabled by `server` feature).
#[cfg(feature = "server")]
pub use toolbus_server as server;

/// Guided workflow engine (enabled by `workflow` feature).
#[cfg(feature = "workflow")]
pub use toolbus_workflow as workflow;
