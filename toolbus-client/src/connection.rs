//! Framed JSON-RPC connection multiplexing requests by correlation id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use toolbus_wire::{Incoming, Request, Response, decode_line, encode_line};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

const WRITE_QUEUE_DEPTH: usize = 64;

/// Terminal outcome delivered to one pending entry.
#[derive(Debug)]
enum PendingFailure {
    /// The peer answered with an error reply.
    Rpc(String),
    /// The channel closed before a reply arrived.
    Closed,
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, PendingFailure>>>>>;

/// One duplex line-framed channel with request/reply correlation.
///
/// Outgoing requests are assigned monotonically increasing string ids;
/// replies are matched by id, never by arrival order. If the channel closes
/// with requests outstanding, every pending entry is rejected so that no
/// request is ever left unresolved.
pub struct Connection {
    writer_tx: mpsc::Sender<String>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Connection {
    /// Starts reader and writer tasks over the supplied byte streams.
    ///
    /// The returned receiver fires once the peer produces its first line of
    /// output; `connect()` uses it as the readiness probe.
    #[must_use]
    pub fn start<R, W>(reader: R, writer: W) -> (Self, oneshot::Receiver<()>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (writer_tx, writer_rx) = mpsc::channel::<String>(WRITE_QUEUE_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel();

        let writer_task = tokio::spawn(write_loop(writer, writer_rx));
        let reader_task = tokio::spawn(read_loop(reader, Arc::clone(&pending), ready_tx));

        (
            Self {
                writer_tx,
                pending,
                next_id: AtomicU64::new(0),
                reader_task,
                writer_task,
            },
            ready_rx,
        )
    }

    /// Sends one request and suspends until its reply arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] when the channel closes
    /// before the reply, [`ClientError::Rpc`] when the peer reports an error,
    /// or [`ClientError::Codec`] when the request cannot be framed.
    pub async fn request(&self, method: &str, params: Option<Value>) -> ClientResult<Value> {
        // The id is assigned before serialization and never reused while the
        // entry is outstanding.
        let id = (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        let request = Request::new(id.clone(), method, params);
        let frame = encode_line(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.writer_tx.send(frame).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::ConnectionClosed);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(PendingFailure::Rpc(message))) => Err(ClientError::Rpc { message }),
            Ok(Err(PendingFailure::Closed)) | Err(_) => Err(ClientError::ConnectionClosed),
        }
    }

    /// Returns the number of requests currently awaiting replies.
    pub async fn pending_requests(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Shuts the connection down, rejecting every outstanding request.
    pub async fn close(&self) {
        self.reader_task.abort();
        self.writer_task.abort();
        reject_all(&self.pending).await;
        debug!("connection closed");
    }
}

async fn read_loop<R>(reader: R, pending: PendingMap, ready_tx: oneshot::Sender<()>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut ready = Some(ready_tx);

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
                if line.trim().is_empty() {
                    continue;
                }
                match decode_line(&line) {
                    Incoming::Reply(reply) => resolve(&pending, reply).await,
                    Incoming::Notification { method } => {
                        debug!(%method, "notification from worker");
                    }
                    Incoming::Request(request) => {
                        debug!(id = %request.id, "ignoring request frame from worker");
                    }
                    Incoming::Malformed { error } => {
                        warn!(%error, "dropping unparsable line");
                    }
                }
            }
            Ok(None) => {
                debug!("worker output closed");
                break;
            }
            Err(err) => {
                warn!(error = %err, "worker read failed");
                break;
            }
        }
    }

    reject_all(&pending).await;
}

/// Resolves the pending entry matching the reply's id; replies with unknown
/// ids are ignored rather than resolving a stale callback.
async fn resolve(pending: &PendingMap, reply: Response) {
    let Some(tx) = pending.lock().await.remove(&reply.id) else {
        debug!(id = %reply.id, "reply for unknown id, ignoring");
        return;
    };

    let outcome = match (reply.result, reply.error) {
        (Some(result), _) => Ok(result),
        (None, Some(error)) => Err(PendingFailure::Rpc(error.message)),
        (None, None) => Err(PendingFailure::Rpc(
            "reply carried neither result nor error".to_owned(),
        )),
    };
    let _ = tx.send(outcome);
}

async fn reject_all(pending: &PendingMap) {
    let mut pending = pending.lock().await;
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(PendingFailure::Closed));
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(err) = writer.write_all(frame.as_bytes()).await {
            warn!(error = %err, "worker write failed");
            break;
        }
        if let Err(err) = writer.flush().await {
            warn!(error = %err, "worker flush failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    /// Test double speaking the worker side of the channel: collects request
    /// frames and replies however the test chooses.
    struct FakeWorker {
        lines: tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>,
        writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    }

    impl FakeWorker {
        fn start() -> (Connection, oneshot::Receiver<()>, Self) {
            let (client_side, worker_side) = tokio::io::duplex(16 * 1024);
            let (client_read, client_write) = tokio::io::split(client_side);
            let (connection, ready) = Connection::start(client_read, client_write);
            let (reader, writer) = tokio::io::split(worker_side);
            let lines = BufReader::new(reader).lines();
            (connection, ready, Self { lines, writer })
        }

        async fn next_request(&mut self) -> Request {
            loop {
                let line = self
                    .lines
                    .next_line()
                    .await
                    .expect("worker read")
                    .expect("channel open");
                if let Incoming::Request(request) = decode_line(&line) {
                    return request;
                }
            }
        }

        async fn send_raw(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.expect("write");
            self.writer.write_all(b"\n").await.expect("write");
            self.writer.flush().await.expect("flush");
        }

        async fn reply(&mut self, response: &Response) {
            let frame = encode_line(response).expect("encode");
            self.writer.write_all(frame.as_bytes()).await.expect("write");
            self.writer.flush().await.expect("flush");
        }
    }

    #[tokio::test]
    async fn correlates_shuffled_replies_by_id() {
        let (connection, _ready, mut worker) = FakeWorker::start();
        let connection = Arc::new(connection);

        let mut calls = Vec::new();
        for n in 0..4 {
            let connection = Arc::clone(&connection);
            calls.push(tokio::spawn(async move {
                connection
                    .request("tools/call", Some(json!({"name": format!("tool-{n}")})))
                    .await
            }));
        }

        // Collect all four requests, then answer them in reverse order; each
        // caller must still receive the reply matching its own id.
        let mut requests = Vec::new();
        for _ in 0..4 {
            requests.push(worker.next_request().await);
        }
        for request in requests.iter().rev() {
            let params = request.params.as_ref().unwrap();
            worker
                .reply(&Response::result(
                    request.id.clone(),
                    json!({"echoed": params["name"]}),
                ))
                .await;
        }

        for (n, call) in calls.into_iter().enumerate() {
            let result = call.await.unwrap().unwrap();
            assert_eq!(result["echoed"], format!("tool-{n}"));
        }
    }

    #[tokio::test]
    async fn error_replies_reject_their_caller() {
        let (connection, _ready, mut worker) = FakeWorker::start();
        let connection = Arc::new(connection);

        let call = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move { connection.request("tools/list", None).await })
        };
        let incoming = worker.next_request().await;
        worker
            .reply(&Response::error(incoming.id, "registry offline"))
            .await;

        match call.await.unwrap() {
            Err(ClientError::Rpc { message }) => assert_eq!(message, "registry offline"),
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_ids_and_garbage_are_ignored() {
        let (connection, _ready, mut worker) = FakeWorker::start();
        let connection = Arc::new(connection);

        let call = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move { connection.request("tools/list", None).await })
        };

        let incoming = worker.next_request().await;
        // Stray traffic first: a reply for an id nobody issued, and a line
        // that is not JSON at all. Neither may resolve the pending call.
        worker
            .reply(&Response::result("999", json!({"stray": true})))
            .await;
        worker.send_raw("panic: worker crashed while logging").await;
        worker
            .reply(&Response::result(incoming.id, json!({"ok": true})))
            .await;

        let result = call.await.unwrap().unwrap();
        assert_eq!(result["ok"], true);
        assert_eq!(connection.pending_requests().await, 0);
    }

    #[tokio::test]
    async fn channel_close_rejects_all_pending() {
        let (connection, _ready, mut worker) = FakeWorker::start();
        let connection = Arc::new(connection);

        let mut calls = Vec::new();
        for _ in 0..2 {
            let connection = Arc::clone(&connection);
            calls.push(tokio::spawn(async move {
                connection.request("tools/list", None).await
            }));
        }
        worker.next_request().await;
        worker.next_request().await;

        drop(worker);

        for call in calls {
            match call.await.unwrap() {
                Err(ClientError::ConnectionClosed) => {}
                other => panic!("expected connection closed, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn ids_are_monotonic_strings() {
        let (connection, _ready, mut worker) = FakeWorker::start();
        let connection = Arc::new(connection);

        for expected in ["1", "2", "3"] {
            let call = {
                let connection = Arc::clone(&connection);
                tokio::spawn(async move { connection.request("tools/list", None).await })
            };
            let request = worker.next_request().await;
            assert_eq!(request.id, expected);
            worker
                .reply(&Response::result(request.id, json!({})))
                .await;
            call.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn readiness_fires_on_first_output() {
        let (_connection, ready, mut worker) = FakeWorker::start();
        worker.send_raw(r#"{"jsonrpc":"2.0","method":"ready"}"#).await;
        ready.await.expect("ready signal");
    }
}
