//! Reference toolbus worker process.
//!
//! Serves the built-in tool registry over stdin/stdout behind the credential
//! middleware. All diagnostics go to stderr so protocol stdout stays clean.

mod config;

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use toolbus_auth::{ApiKeyStore, Authenticator, TokenVerifier};
use toolbus_primitives::PrincipalId;
use toolbus_server::{CallContext, Dispatcher, RegistryError, ToolRegistry, serve};
use toolbus_wire::{InputSchema, ToolDescriptor, ToolResult};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = config::WorkerConfig::from_env();

    let keys = Arc::new(ApiKeyStore::new());
    if let Some(principal) = &config.dev_principal {
        let principal = PrincipalId::new(principal).context("invalid TOOLBUS_DEV_PRINCIPAL")?;
        let key = keys.generate(principal.clone(), "dev", None).await;
        // The raw key is observable only here, at generation time.
        info!(%principal, %key, "minted development api key");
    }

    let auth = Arc::new(Authenticator::new(
        Arc::clone(&keys),
        TokenVerifier::new(config.token_secret.as_bytes()),
    ));

    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry).context("tool registration failed")?;

    let dispatcher = Arc::new(Dispatcher::new(registry, auth));
    serve(dispatcher, tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("serve loop failed")?;

    Ok(())
}

/// Registers the connectivity-check tools every worker exposes. Hosts extend
/// the registry with their own entity tools before serving.
fn register_builtin_tools(registry: &Arc<ToolRegistry>) -> Result<(), RegistryError> {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "text".to_owned(),
        serde_json::json!({"type": "string", "description": "Text to echo back"}),
    );
    registry.register(
        ToolDescriptor::new(
            "echo",
            "Echoes the supplied text back to the caller",
            InputSchema::object(properties, ["text"]),
        ),
        |args: Value, _ctx: CallContext| async move {
            Ok(ToolResult::text(args["text"].as_str().unwrap_or_default()))
        },
    )?;

    registry.register(
        ToolDescriptor::new(
            "whoami",
            "Reports the authenticated principal for the call",
            InputSchema::empty(),
        ),
        |_args: Value, ctx: CallContext| async move {
            Ok(ToolResult::text(ctx.principal().to_string()))
        },
    )?;

    Ok(())
}
