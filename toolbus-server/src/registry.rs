//! Runtime registry mapping tool names to descriptors and handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use toolbus_wire::{ToolDescriptor, ToolResult};

use crate::dispatch::CallContext;

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type produced by tool handlers.
pub type HandlerResult = Result<ToolResult, HandlerError>;

/// Errors produced by tool handler implementations.
///
/// These never cross the channel as failures; the dispatcher converts them
/// into error tool results at its boundary.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler rejected the supplied arguments.
    #[error("invalid arguments: {reason}")]
    InvalidArguments {
        /// Human-readable rejection reason.
        reason: String,
    },

    /// The handler's own logic failed.
    #[error("{reason}")]
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
}

impl HandlerError {
    /// Creates an invalid-arguments error from the supplied reason.
    #[must_use]
    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            reason: reason.into(),
        }
    }

    /// Creates a failure error from the supplied reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Trait implemented by tool executors.
///
/// Every tool shares this one closed signature; the dispatcher needs no
/// per-tool special-casing.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invokes the tool with the supplied arguments and call context.
    async fn call(&self, arguments: Value, ctx: CallContext) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Send + Sync + Fn(Value, CallContext) -> Fut,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn call(&self, arguments: Value, ctx: CallContext) -> HandlerResult {
        (self)(arguments, ctx).await
    }
}

/// Handle pairing a descriptor with its executor.
#[derive(Clone)]
pub struct ToolHandle {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

impl ToolHandle {
    /// Returns the associated descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Executes the underlying tool implementation.
    ///
    /// # Errors
    ///
    /// Propagates any [`HandlerError`] returned by the implementation.
    pub async fn invoke(&self, arguments: Value, ctx: CallContext) -> HandlerResult {
        self.handler.call(arguments, ctx).await
    }
}

#[derive(Default)]
struct RegistryInner {
    tools: HashMap<String, ToolHandle>,
    order: Vec<String>,
}

/// Registry that stores tool implementations keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("tool registry poisoned");
        f.debug_struct("ToolRegistry")
            .field("registered", &inner.order)
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool implementation under its descriptor's name.
    ///
    /// Registration happens once at process start; a name collision is a
    /// programming error, reported explicitly rather than overwriting.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if the name is already
    /// present.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register<H>(&self, descriptor: ToolDescriptor, handler: H) -> RegistryResult<()>
    where
        H: ToolHandler + 'static,
    {
        let mut inner = self.inner.write().expect("tool registry poisoned");
        let name = descriptor.name.clone();
        if inner.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool { name });
        }

        inner.tools.insert(
            name.clone(),
            ToolHandle {
                descriptor,
                handler: Arc::new(handler),
            },
        );
        inner.order.push(name);

        Ok(())
    }

    /// Returns a handle to the tool matching the supplied name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolHandle> {
        let inner = self.inner.read().ok()?;
        inner.tools.get(name).cloned()
    }

    /// Lists the descriptors of all registered tools, in registration order.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().expect("tool registry poisoned");
        inner
            .order
            .iter()
            .filter_map(|name| inner.tools.get(name))
            .map(|handle| handle.descriptor.clone())
            .collect()
    }
}

/// Errors produced by tool registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Tool name collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },
}
