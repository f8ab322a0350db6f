use std::sync::Arc;

use serde_json::{Value, json};
use toolbus::auth::{ApiKeyStore, Authenticator, TokenSigner, TokenVerifier};
use toolbus::client::{Connection, ProcessClient, WorkerCommand};
use toolbus::primitives::PrincipalId;
use toolbus::server::{CallContext, Dispatcher, ToolRegistry, serve};
use toolbus::wire::{
    CallHeaders, CallParams, InputSchema, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, ToolDescriptor,
    ToolListResult, ToolResult,
};

const SECRET: &[u8] = b"runtime-flow-secret";

struct Harness {
    connection: Connection,
    api_key: String,
}

/// Stands up a full server (registry + auth + serve loop) on one end of an
/// in-process duplex stream and a client connection on the other.
async fn start_harness() -> Harness {
    let registry = Arc::new(ToolRegistry::new());
    let mut properties = serde_json::Map::new();
    properties.insert("text".to_owned(), json!({"type": "string"}));
    registry
        .register(
            ToolDescriptor::new(
                "echo",
                "Echoes the supplied text back to the caller",
                InputSchema::object(properties, ["text"]),
            ),
            |args: Value, _ctx: CallContext| async move {
                Ok(ToolResult::text(args["text"].as_str().unwrap_or_default()))
            },
        )
        .unwrap();
    registry
        .register(
            ToolDescriptor::new("whoami", "Reports the calling principal", InputSchema::empty()),
            |_args: Value, ctx: CallContext| async move {
                Ok(ToolResult::text(ctx.principal().to_string()))
            },
        )
        .unwrap();

    let keys = Arc::new(ApiKeyStore::new());
    let api_key = keys
        .generate(PrincipalId::new("alice").unwrap(), "integration", None)
        .await;
    let auth = Arc::new(Authenticator::new(keys, TokenVerifier::new(SECRET)));
    let dispatcher = Arc::new(Dispatcher::new(registry, auth));

    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_side);
    tokio::spawn(async move {
        let _ = serve(dispatcher, server_read, server_write).await;
    });

    let (client_read, client_write) = tokio::io::split(client_side);
    let (connection, ready) = Connection::start(client_read, client_write);
    ready.await.expect("server should announce readiness");

    Harness {
        connection,
        api_key,
    }
}

async fn call(
    connection: &Connection,
    name: &str,
    arguments: Value,
    headers: CallHeaders,
) -> ToolResult {
    let params = CallParams {
        name: name.to_owned(),
        arguments,
        headers,
    };
    let result = connection
        .request(METHOD_TOOLS_CALL, Some(serde_json::to_value(params).unwrap()))
        .await
        .expect("tools/call replies are tool results, not transport failures");
    serde_json::from_value(result).unwrap()
}

#[tokio::test]
async fn echo_round_trip_under_api_key() {
    let harness = start_harness().await;

    let result = call(
        &harness.connection,
        "echo",
        json!({"text": "hi"}),
        CallHeaders::with_api_key(&harness.api_key),
    )
    .await;

    assert!(!result.is_error);
    assert_eq!(result.first_text(), Some("hi"));
}

#[tokio::test]
async fn missing_credential_is_rejected_before_dispatch() {
    let harness = start_harness().await;

    let result = call(
        &harness.connection,
        "echo",
        json!({"text": "hi"}),
        CallHeaders::default(),
    )
    .await;

    assert!(result.is_error);
    assert!(
        result
            .first_text()
            .unwrap()
            .contains("Authentication required")
    );
}

#[tokio::test]
async fn unknown_tool_names_the_missing_tool() {
    let harness = start_harness().await;

    let result = call(
        &harness.connection,
        "definitely_absent",
        json!({}),
        CallHeaders::with_api_key(&harness.api_key),
    )
    .await;

    assert!(result.is_error);
    let text = result.first_text().unwrap();
    assert!(text.contains("definitely_absent"));
    assert!(text.contains("not found"));
}

#[tokio::test]
async fn bearer_token_resolves_the_calling_principal() {
    let harness = start_harness().await;
    let signer = TokenSigner::new(SECRET);
    let token = signer
        .issue(
            &PrincipalId::new("bob").unwrap(),
            chrono::Duration::minutes(5),
        )
        .unwrap();

    let result = call(
        &harness.connection,
        "whoami",
        json!({}),
        CallHeaders::with_bearer(token),
    )
    .await;

    assert!(!result.is_error);
    assert_eq!(result.first_text(), Some("bob"));
}

#[tokio::test]
async fn expired_bearer_token_is_reported_distinctly() {
    let harness = start_harness().await;
    let signer = TokenSigner::new(SECRET);
    let token = signer
        .issue(
            &PrincipalId::new("bob").unwrap(),
            chrono::Duration::seconds(-120),
        )
        .unwrap();

    let result = call(
        &harness.connection,
        "whoami",
        json!({}),
        CallHeaders::with_bearer(token),
    )
    .await;

    assert!(result.is_error);
    assert!(result.first_text().unwrap().contains("Token expired"));
}

#[tokio::test]
async fn tool_catalog_lists_descriptors_in_registration_order() {
    let harness = start_harness().await;

    let result = harness
        .connection
        .request(METHOD_TOOLS_LIST, None)
        .await
        .unwrap();
    let listed: ToolListResult = serde_json::from_value(result).unwrap();

    let names: Vec<&str> = listed.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["echo", "whoami"]);
    assert_eq!(listed.tools[0].input_schema.required, vec!["text"]);
}

#[tokio::test]
async fn concurrent_calls_resolve_against_their_own_requests() {
    let harness = start_harness().await;
    let connection = Arc::new(harness.connection);

    let mut calls = Vec::new();
    for n in 0..8 {
        let connection = Arc::clone(&connection);
        let key = harness.api_key.clone();
        calls.push(tokio::spawn(async move {
            let result = call(
                &connection,
                "echo",
                json!({"text": format!("message-{n}")}),
                CallHeaders::with_api_key(key),
            )
            .await;
            (n, result)
        }));
    }

    for handle in calls {
        let (n, result) = handle.await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.first_text(), Some(format!("message-{n}").as_str()));
    }
}

#[tokio::test]
async fn worker_death_mid_flight_rejects_every_outstanding_call() {
    // A real child process that announces readiness and then never replies.
    let command = WorkerCommand::new("sh")
        .arg("-c")
        .arg("echo '{\"jsonrpc\":\"2.0\",\"method\":\"ready\"}'; sleep 30");
    let client = Arc::new(ProcessClient::new(command));
    client.connect().await.unwrap();
    // A second connect must not spawn a second worker.
    client.connect().await.unwrap();

    let mut calls = Vec::new();
    for _ in 0..2 {
        let client = Arc::clone(&client);
        calls.push(tokio::spawn(async move {
            client.call_tool("echo", json!({"text": "hi"})).await
        }));
    }

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    client.close().await;

    for handle in calls {
        let result = handle.await.unwrap();
        assert!(result.is_error);
        assert!(result.first_text().unwrap().contains("connection closed"));
    }
}
