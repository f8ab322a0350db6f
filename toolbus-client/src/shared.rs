//! Process-wide shared client with single-flight initialisation.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::ClientResult;
use crate::process::{ProcessClient, WorkerCommand};

/// Lazily created, process-wide [`ProcessClient`].
///
/// The first caller spawns and connects the worker; concurrent first callers
/// share that single initialisation, so two racing callers can never spawn
/// two workers. Constructed once at process start and passed explicitly to
/// every handler that needs it rather than living in a global.
pub struct SharedClient {
    command: WorkerCommand,
    cell: OnceCell<Arc<ProcessClient>>,
}

impl SharedClient {
    /// Creates a shared client for the supplied worker command. No process
    /// is spawned until the first [`get`](Self::get).
    #[must_use]
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            cell: OnceCell::new(),
        }
    }

    /// Returns the connected client, spawning the worker on first use.
    ///
    /// # Errors
    ///
    /// Propagates the connection failure of the single initialisation; a
    /// failed initialisation is not cached, so a later caller retries.
    pub async fn get(&self) -> ClientResult<Arc<ProcessClient>> {
        self.cell
            .get_or_try_init(|| async {
                info!(program = self.command.program(), "initialising shared worker client");
                let client = Arc::new(ProcessClient::new(self.command.clone()));
                client.connect().await?;
                Ok(client)
            })
            .await
            .cloned()
    }
}
