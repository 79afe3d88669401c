//! Request context for MCP handlers
//!
//! Every inbound request runs under a [`RequestContext`] carrying the
//! request id, a cancellation flag (set when `$/cancelRequest` arrives for
//! that id), and a progress sink bound to the requester's progress token.
//!
//! The context is ambient: the endpoint scopes each request dispatch in a
//! task-local, so handler code can reach its own context without threading
//! a parameter through every call:
//!
//! ```rust,ignore
//! async fn slow_tool(args: Value) -> Result<Vec<Content>> {
//!     for i in 0..100 {
//!         if context::is_cancelled() {
//!             return Err(JsonRpcError::request_cancelled("stopped").into());
//!         }
//!         context::report_progress(i as f64, Some(100.0)).await;
//!         step(i).await;
//!     }
//!     Ok(vec![Content::text("done")])
//! }
//! ```
//!
//! Contexts never leak across requests: the task-local scope ends with the
//! handler, and notification handlers run unscoped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::jsonrpc::{self, RequestId};
use crate::protocol::{ProgressParams, ProgressToken, notifications};
use crate::transport::Transport;

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Context for one in-flight inbound request.
#[derive(Clone)]
pub struct RequestContext {
    request_id: RequestId,
    progress_token: Option<ProgressToken>,
    cancelled: Arc<AtomicBool>,
    notifier: Option<Arc<dyn Transport>>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("progress_token", &self.progress_token)
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish()
    }
}

impl RequestContext {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            progress_token: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            notifier: None,
        }
    }

    /// Set the progress token echoed back in progress notifications.
    pub fn with_progress_token(mut self, token: ProgressToken) -> Self {
        self.progress_token = Some(token);
        self
    }

    /// Set the transport used to emit progress notifications.
    pub fn with_notifier(mut self, notifier: Arc<dyn Transport>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn progress_token(&self) -> Option<&ProgressToken> {
        self.progress_token.as_ref()
    }

    /// Check if the peer cancelled this request.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Mark the request as cancelled. Level-triggered; handlers observe it at
    /// their next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// A shareable token observing the same cancelled flag.
    pub fn cancellation_token(&self) -> CancellationToken {
        CancellationToken {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Report progress to the requester.
    ///
    /// No-op unless the request carried a progress token and the context has
    /// a notifier. Delivery is best effort; a failed send never fails the
    /// handler.
    pub async fn report_progress(&self, progress: f64, total: Option<f64>) {
        let Some(token) = &self.progress_token else {
            return;
        };
        let Some(notifier) = &self.notifier else {
            return;
        };

        let params = ProgressParams {
            progress_token: token.clone(),
            progress,
            total,
        };
        let message = jsonrpc::make_notification(
            notifications::PROGRESS,
            serde_json::to_value(&params).ok(),
        );
        if let Err(e) = notifier.send(message).await {
            tracing::debug!(error = %e, "dropping progress notification");
        }
    }
}

/// A token that observes (and can trigger) cancellation of one request.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// The context of the currently executing request handler, if any.
///
/// Returns `None` outside a request dispatch (notification handlers, plain
/// tasks).
pub fn current() -> Option<RequestContext> {
    CURRENT.try_with(|ctx| ctx.clone()).ok()
}

/// True if the currently executing request has been cancelled.
pub fn is_cancelled() -> bool {
    CURRENT
        .try_with(|ctx| ctx.is_cancelled())
        .unwrap_or(false)
}

/// Report progress for the currently executing request. No-op outside a
/// request or when no progress token was supplied.
pub async fn report_progress(progress: f64, total: Option<f64>) {
    if let Some(ctx) = current() {
        ctx.report_progress(progress, total).await;
    }
}

/// Run a future with `ctx` installed as the ambient request context.
pub(crate) fn scope<F>(ctx: RequestContext, future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    CURRENT.scope(ctx, future)
}
