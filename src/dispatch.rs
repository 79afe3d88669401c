//! Method dispatcher and handler adapters
//!
//! The [`Dispatcher`] owns the `method name -> handler` table (unique keys,
//! last registration wins) and translates handler outcomes back into
//! JSON-RPC messages: a successful value becomes a result response, a
//! declared protocol error keeps its code, and any other failure becomes a
//! `-32603` carrying the failure description. Notification handler failures
//! are logged and swallowed, never answered.
//!
//! Three handler shapes are admitted and normalized to one contract:
//!
//! - **eager** - a synchronous `Fn(Value) -> Result<Value>`, via [`Dispatcher::add_sync`]
//! - **suspendable** - an async `Fn(Value) -> impl Future`, via [`Dispatcher::add`]
//! - **streaming** - a lazy sequence of chunks driven by [`drive_stream`],
//!   which appends each chunk, reports progress on the ambient request
//!   context, and observes cancellation per [`CancelPolicy`]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::context;
use crate::error::{JsonRpcError, Result};
use crate::jsonrpc::{self, RequestId};

/// A boxed future produced by a handler invocation.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// The dispatcher-facing handler contract.
///
/// Handlers observe their request context ambiently via
/// [`context::current`]; notifications run without one.
pub trait Handler: Send + Sync {
    fn call(&self, params: Value) -> HandlerFuture;
}

struct AsyncHandler<F> {
    f: F,
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn call(&self, params: Value) -> HandlerFuture {
        Box::pin((self.f)(params))
    }
}

struct SyncHandler<F> {
    f: F,
}

impl<F> Handler for SyncHandler<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn call(&self, params: Value) -> HandlerFuture {
        let outcome = (self.f)(params);
        Box::pin(async move { outcome })
    }
}

/// Routing table from method name to handler.
#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler. Replaces any existing handler for the
    /// method.
    pub fn add<F, Fut>(&self, method: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.add_handler(method, Arc::new(AsyncHandler { f }));
    }

    /// Register an eager (synchronous) handler.
    pub fn add_sync<F>(&self, method: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.add_handler(method, Arc::new(SyncHandler { f }));
    }

    /// Register a prebuilt handler object.
    pub fn add_handler(&self, method: impl Into<String>, handler: Arc<dyn Handler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.insert(method.into(), handler);
    }

    pub fn contains(&self, method: &str) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.contains_key(method)
    }

    fn lookup(&self, method: &str) -> Option<Arc<dyn Handler>> {
        // read lock held for the lookup only, never across the handler
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(method).cloned()
    }

    /// Run the handler for an inbound request and build its response.
    ///
    /// The caller installs the request context scope; this method only
    /// routes and translates the outcome.
    pub async fn dispatch_request(&self, id: &RequestId, method: &str, params: Value) -> Value {
        let Some(handler) = self.lookup(method) else {
            return jsonrpc::make_error(Some(id), &JsonRpcError::method_not_found(method));
        };

        match handler.call(params).await {
            Ok(value) => jsonrpc::make_result(id, value),
            Err(e) => jsonrpc::make_error(Some(id), &e.into_json_rpc()),
        }
    }

    /// Run the handler for an inbound notification. Failures are logged on
    /// the error path and swallowed; unknown methods are dropped.
    pub async fn dispatch_notification(&self, method: &str, params: Value) {
        let Some(handler) = self.lookup(method) else {
            tracing::debug!(method = %method, "dropping notification for unknown method");
            return;
        };

        if let Err(e) = handler.call(params).await {
            tracing::warn!(method = %method, error = %e, "notification handler failed");
        }
    }
}

/// What a streaming handler yields when its request is cancelled mid-stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Stop pulling and answer with a `-32800` error.
    #[default]
    Fail,
    /// Stop pulling and return the chunks collected so far as a success.
    Partial,
}

/// Drive a streaming handler to completion.
///
/// Each yielded chunk is appended to the aggregate, progress is reported on
/// the ambient request context (a no-op unless the requester supplied a
/// progress token), and the cancelled flag is checked before the next pull.
pub async fn drive_stream<T, S>(mut stream: S, policy: CancelPolicy) -> Result<Vec<T>>
where
    S: Stream<Item = Result<T>> + Unpin,
{
    let ctx = context::current();
    let mut items = Vec::new();

    while let Some(item) = stream.next().await {
        items.push(item?);
        if let Some(ctx) = &ctx {
            ctx.report_progress(items.len() as f64, None).await;
            if ctx.is_cancelled() {
                return match policy {
                    CancelPolicy::Fail => Err(JsonRpcError::request_cancelled(
                        "request cancelled mid-stream",
                    )
                    .into()),
                    CancelPolicy::Partial => Ok(items),
                };
            }
        }
    }

    Ok(items)
}
