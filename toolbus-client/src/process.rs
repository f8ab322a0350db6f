//! Worker process lifecycle and the request/response client API.

use std::process::Stdio;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use toolbus_wire::{
    CallHeaders, CallParams, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, ToolDescriptor, ToolListResult,
    ToolResult,
};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};

/// Describes how to spawn a worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl WorkerCommand {
    /// Creates a command for the supplied program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds one environment variable for the worker.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Returns the program path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

struct Worker {
    child: Child,
    connection: Arc<Connection>,
}

/// Client owning exactly one worker process and one framed channel to it.
///
/// The worker and its correlation table are exclusively owned by this
/// instance; a host wanting a process-wide singleton wraps it in
/// [`SharedClient`](crate::SharedClient).
pub struct ProcessClient {
    command: WorkerCommand,
    credentials: CallHeaders,
    worker: Mutex<Option<Worker>>,
    catalog: Mutex<Option<Vec<ToolDescriptor>>>,
}

impl ProcessClient {
    /// Creates a client for the supplied worker command. No process is
    /// spawned until [`connect`](Self::connect).
    #[must_use]
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            credentials: CallHeaders::default(),
            worker: Mutex::new(None),
            catalog: Mutex::new(None),
        }
    }

    /// Attaches default credentials sent with every call issued through
    /// [`call_tool`](Self::call_tool).
    #[must_use]
    pub fn with_credentials(mut self, credentials: CallHeaders) -> Self {
        self.credentials = credentials;
        self
    }

    /// Spawns the worker and waits for its first output. Idempotent: a
    /// second call while the worker is alive is a no-op. A worker that died
    /// is not auto-restarted; this explicit call is the recovery path, and
    /// it discards the stale connection and tool cache before respawning.
    ///
    /// stderr is drained to the log on a separate task and never mixed with
    /// protocol traffic. If the child exits before producing output, connect
    /// still resolves; subsequent calls will fail with a closed connection.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Spawn`] when the process cannot be started or
    /// its stdio pipes are unavailable.
    pub async fn connect(&self) -> ClientResult<()> {
        let mut guard = self.worker.lock().await;
        if let Some(worker) = guard.as_mut() {
            if matches!(worker.child.try_wait(), Ok(None)) {
                debug!("already connected, ignoring connect");
                return Ok(());
            }
            warn!(program = %self.command.program, "worker is gone, reconnecting");
            worker.connection.close().await;
            *self.catalog.lock().await = None;
            *guard = None;
        }

        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.command.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|err| ClientError::Spawn {
            reason: format!("failed to spawn `{}`: {err}", self.command.program),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| ClientError::Spawn {
            reason: "worker stdin unavailable".to_owned(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ClientError::Spawn {
            reason: "worker stdout unavailable".to_owned(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ClientError::Spawn {
            reason: "worker stderr unavailable".to_owned(),
        })?;

        tokio::spawn(drain_stderr(stderr));

        let (connection, ready) = Connection::start(stdout, stdin);

        // Readiness probe: resolve on the worker's first output, or
        // immediately if the process is already gone.
        tokio::select! {
            _ = ready => {
                info!(program = %self.command.program, "worker ready");
            }
            status = child.wait() => {
                warn!(program = %self.command.program, ?status, "worker exited before producing output");
            }
        }

        *guard = Some(Worker {
            child,
            connection: Arc::new(connection),
        });
        Ok(())
    }

    /// Returns `true` while a worker is connected.
    pub async fn is_connected(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Returns the tool catalog, fetching and caching it on first use.
    ///
    /// The cache lives until [`close`](Self::close); it is never silently
    /// refreshed, so registration changes in the worker require restarting
    /// the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] before `connect()`, or the
    /// failure of the underlying `tools/list` request.
    pub async fn list_tools(&self) -> ClientResult<Vec<ToolDescriptor>> {
        if let Some(tools) = self.catalog.lock().await.as_ref() {
            return Ok(tools.clone());
        }

        let connection = self.connection().await?;
        let result = connection.request(METHOD_TOOLS_LIST, None).await?;
        let parsed: ToolListResult =
            serde_json::from_value(result).map_err(|err| ClientError::Protocol {
                reason: format!("invalid tools/list payload: {err}"),
            })?;

        *self.catalog.lock().await = Some(parsed.tools.clone());
        debug!(count = parsed.tools.len(), "tool catalog cached");
        Ok(parsed.tools)
    }

    /// Calls a tool using the client's default credentials.
    ///
    /// Every failure (write failure, closed channel, handler error) is
    /// folded into an error [`ToolResult`] so callers treat outcomes
    /// uniformly; this method never returns `Err`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult {
        self.call_tool_with(name, arguments, self.credentials.clone())
            .await
    }

    /// Calls a tool with explicit per-call credentials.
    pub async fn call_tool_with(
        &self,
        name: &str,
        arguments: Value,
        headers: CallHeaders,
    ) -> ToolResult {
        match self.try_call(name, arguments, headers).await {
            Ok(result) => result,
            Err(err) => ToolResult::error(err.to_string()),
        }
    }

    async fn try_call(
        &self,
        name: &str,
        arguments: Value,
        headers: CallHeaders,
    ) -> ClientResult<ToolResult> {
        let connection = self.connection().await?;
        let params = CallParams {
            name: name.to_owned(),
            arguments,
            headers,
        };
        let params = serde_json::to_value(params).map_err(|err| ClientError::Protocol {
            reason: format!("failed to encode call params: {err}"),
        })?;

        let result = connection.request(METHOD_TOOLS_CALL, Some(params)).await?;
        serde_json::from_value(result).map_err(|err| ClientError::Protocol {
            reason: format!("invalid tools/call payload: {err}"),
        })
    }

    /// Terminates the worker, rejects outstanding requests, and clears the
    /// tool cache. Idempotent.
    pub async fn close(&self) {
        let Some(mut worker) = self.worker.lock().await.take() else {
            debug!("close on disconnected client, ignoring");
            return;
        };

        worker.connection.close().await;
        if let Err(err) = worker.child.kill().await {
            debug!(error = %err, "worker already exited");
        }
        *self.catalog.lock().await = None;
        info!(program = %self.command.program, "worker stopped");
    }

    async fn connection(&self) -> ClientResult<Arc<Connection>> {
        self.worker
            .lock()
            .await
            .as_ref()
            .map(|worker| Arc::clone(&worker.connection))
            .ok_or(ClientError::NotConnected)
    }
}

/// Drains worker stderr into the log, keeping diagnostics off the protocol
/// stream.
async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    debug!(target: "toolbus_client::worker_stderr", "{trimmed}");
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "worker stderr read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn never_replying_worker() -> WorkerCommand {
        // A worker that emits one line of output and then sits silent,
        // leaving every request in flight.
        WorkerCommand::new("sh")
            .arg("-c")
            .arg("echo '{\"jsonrpc\":\"2.0\",\"method\":\"ready\"}'; sleep 30")
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let client = ProcessClient::new(never_replying_worker());
        client.connect().await.unwrap();
        client.connect().await.unwrap();
        assert!(client.is_connected().await);
        client.close().await;
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn call_before_connect_is_an_error_result() {
        let client = ProcessClient::new(never_replying_worker());
        let result = client.call_tool("echo", json!({"text": "hi"})).await;
        assert!(result.is_error);
        assert!(result.first_text().unwrap().contains("not connected"));
    }

    #[tokio::test]
    async fn close_rejects_outstanding_calls() {
        let client = Arc::new(ProcessClient::new(never_replying_worker()));
        client.connect().await.unwrap();

        let mut calls = Vec::new();
        for n in 0..2 {
            let client = Arc::clone(&client);
            calls.push(tokio::spawn(async move {
                client.call_tool(&format!("tool-{n}"), Value::Null).await
            }));
        }

        // Give both calls time to register in the pending table, then pull
        // the plug mid-flight.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        client.close().await;

        for call in calls {
            let result = call.await.unwrap();
            assert!(result.is_error);
            assert!(result.first_text().unwrap().contains("connection closed"));
        }
    }

    #[tokio::test]
    async fn explicit_connect_recovers_after_worker_death() {
        // This worker announces readiness and exits immediately.
        let client = ProcessClient::new(
            WorkerCommand::new("sh")
                .arg("-c")
                .arg("echo '{\"jsonrpc\":\"2.0\",\"method\":\"ready\"}'"),
        );
        client.connect().await.unwrap();

        // Wait for the child to be gone, then recover with an explicit
        // connect; calls against the fresh worker fail only because it never
        // replies, not because the client stayed wedged on the dead one.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        client.connect().await.unwrap();
        assert!(client.is_connected().await);
        client.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let client = ProcessClient::new(never_replying_worker());
        client.connect().await.unwrap();
        client.close().await;
        client.close().await;
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let client = ProcessClient::new(WorkerCommand::new("/nonexistent/toolbus-worker"));
        match client.connect().await {
            Err(ClientError::Spawn { reason }) => {
                assert!(reason.contains("/nonexistent/toolbus-worker"));
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }
}
