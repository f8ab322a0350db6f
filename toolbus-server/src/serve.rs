//! Line-framed serve loop for a worker process.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use toolbus_wire::{CodecError, Incoming, Notification, decode_line, encode_line};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;

const WRITE_QUEUE_DEPTH: usize = 64;

/// Errors that terminate the serve loop.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Reading from the inbound stream failed.
    #[error("serve read failed: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An outgoing frame could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Serves the dispatcher over a pair of byte streams until the inbound
/// stream reaches end of file.
///
/// Each request runs on its own task so slow tools do not block the loop;
/// replies are serialized through a single writer task. One `ready`
/// notification is emitted before the first read so a newly spawned worker
/// always produces output for the client's readiness probe. Unparsable lines
/// are logged and dropped without terminating the loop.
///
/// # Errors
///
/// Returns [`ServeError`] when the inbound stream fails; end of file is a
/// normal return.
pub async fn serve<R, W>(dispatcher: Arc<Dispatcher>, reader: R, writer: W) -> Result<(), ServeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (writer_tx, writer_rx) = mpsc::channel::<String>(WRITE_QUEUE_DEPTH);
    let writer_task = tokio::spawn(write_loop(writer, writer_rx));

    let ready = encode_line(&Notification::ready())?;
    if writer_tx.send(ready).await.is_err() {
        warn!("outbound stream closed before ready notification");
        return Ok(());
    }
    info!("serve loop ready");

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match decode_line(&line) {
            Incoming::Request(request) => {
                let dispatcher = Arc::clone(&dispatcher);
                let writer_tx = writer_tx.clone();
                tokio::spawn(async move {
                    let reply = handle_supervised(dispatcher, request).await;
                    match encode_line(&reply) {
                        Ok(frame) => {
                            if writer_tx.send(frame).await.is_err() {
                                debug!("reply dropped: outbound stream closed");
                            }
                        }
                        Err(err) => warn!(error = %err, "failed to encode reply"),
                    }
                });
            }
            Incoming::Notification { method } => {
                debug!(%method, "ignoring notification");
            }
            Incoming::Reply(reply) => {
                debug!(id = %reply.id, "ignoring reply frame on server channel");
            }
            Incoming::Malformed { error } => {
                warn!(%error, "dropping unparsable line");
            }
        }
    }

    info!("inbound stream closed, serve loop exiting");
    drop(writer_tx);
    let _ = writer_task.await;
    Ok(())
}

/// Runs one dispatch on its own task so a panicking handler cannot take the
/// serve loop down; the panic is converted into an error reply.
async fn handle_supervised(
    dispatcher: Arc<Dispatcher>,
    request: toolbus_wire::Request,
) -> toolbus_wire::Response {
    let id = request.id.clone();
    match tokio::spawn(async move { dispatcher.handle(request).await }).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(%id, error = %err, "tool dispatch panicked");
            let result = toolbus_wire::ToolResult::error("tool handler panicked");
            match serde_json::to_value(&result) {
                Ok(value) => toolbus_wire::Response::result(id, value),
                Err(encode_err) => {
                    toolbus_wire::Response::error(id, format!("internal error: {encode_err}"))
                }
            }
        }
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(err) = writer.write_all(frame.as_bytes()).await {
            warn!(error = %err, "outbound write failed");
            break;
        }
        if let Err(err) = writer.flush().await {
            warn!(error = %err, "outbound flush failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use toolbus_auth::{ApiKeyStore, Authenticator, TokenVerifier};
    use toolbus_primitives::PrincipalId;
    use toolbus_wire::{
        CallHeaders, CallParams, InputSchema, METHOD_TOOLS_CALL, Request, Response,
        ToolDescriptor, ToolResult,
    };

    use crate::dispatch::CallContext;
    use crate::registry::ToolRegistry;

    async fn start_server() -> (tokio::io::DuplexStream, String) {
        let registry = Arc::new(ToolRegistry::new());
        let mut properties = serde_json::Map::new();
        properties.insert("text".to_owned(), json!({"type": "string"}));
        registry
            .register(
                ToolDescriptor::new("echo", "Echo", InputSchema::object(properties, ["text"])),
                |args: Value, _ctx: CallContext| async move {
                    Ok(ToolResult::text(args["text"].as_str().unwrap_or_default()))
                },
            )
            .unwrap();

        let keys = Arc::new(ApiKeyStore::new());
        let key = keys
            .generate(PrincipalId::new("tester").unwrap(), "test", None)
            .await;
        let auth = Arc::new(Authenticator::new(keys, TokenVerifier::new(b"serve-secret")));
        let dispatcher = Arc::new(Dispatcher::new(registry, auth));

        let (client_side, server_side) = tokio::io::duplex(16 * 1024);
        let (server_read, server_write) = tokio::io::split(server_side);
        tokio::spawn(async move {
            let _ = serve(dispatcher, server_read, server_write).await;
        });

        (client_side, key)
    }

    #[tokio::test]
    async fn emits_ready_then_replies_and_survives_garbage() {
        let (client_side, key) = start_server().await;
        let (read_half, mut write_half) = tokio::io::split(client_side);
        let mut lines = BufReader::new(read_half).lines();

        // First frame is the readiness notification.
        let ready = lines.next_line().await.unwrap().unwrap();
        assert!(ready.contains("\"ready\""));

        // Garbage on the channel is dropped, not fatal.
        write_half.write_all(b"not json at all\n").await.unwrap();

        let params = CallParams {
            name: "echo".to_owned(),
            arguments: json!({"text": "still alive"}),
            headers: CallHeaders::with_api_key(key),
        };
        let request = Request::new(
            "1",
            METHOD_TOOLS_CALL,
            Some(serde_json::to_value(params).unwrap()),
        );
        let frame = encode_line(&request).unwrap();
        write_half.write_all(frame.as_bytes()).await.unwrap();

        let reply = lines.next_line().await.unwrap().unwrap();
        let reply: Response = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply.id, "1");
        let result: ToolResult = serde_json::from_value(reply.result.unwrap()).unwrap();
        assert_eq!(result.first_text(), Some("still alive"));
    }
}
