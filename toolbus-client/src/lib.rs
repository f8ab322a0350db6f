//! Host-side toolbus client.
//!
//! Owns one worker process and one line-framed JSON-RPC channel to it, and
//! presents a request/response API that masks the asynchronous framing:
//! arbitrarily many requests may be outstanding, multiplexed over the single
//! channel by correlation id.

#![warn(missing_docs, clippy::pedantic)]

mod connection;
mod error;
mod process;
mod shared;

pub use connection::Connection;
pub use error::{ClientError, ClientResult};
pub use process::{ProcessClient, WorkerCommand};
pub use shared::SharedClient;
