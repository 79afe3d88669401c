//! Bidirectional JSON-RPC endpoint
//!
//! The [`Endpoint`] is the symmetric peer at the core of the engine: it
//! wraps a transport and a [`Dispatcher`], correlates outbound requests with
//! inbound responses through the outstanding table, unwraps batches, and
//! maintains the per-request inbound contexts that make cancellation and
//! progress observable from inside handlers.
//!
//! Outbound requests return a [`PendingRequest`] future handle instead of a
//! callback pair; cancellation is a first-class operation that removes the
//! outstanding entry, fails the waiter, and emits `$/cancelRequest` to the
//! peer. A late response to a cancelled request is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;

use futures::future::join_all;
use serde_json::{Value, json};
use tokio::sync::oneshot;

use crate::context::{self, RequestContext};
use crate::dispatch::Dispatcher;
use crate::error::{JsonRpcError, Result};
use crate::jsonrpc::{self, CANCEL_REQUEST, RequestId};
use crate::protocol::ProgressToken;
use crate::transport::Transport;

/// Resolution of an outbound request: the result value, or the peer's error
/// object. The error is a value the caller can inspect, not a thrown
/// failure.
pub type ResponseOutcome = std::result::Result<Value, JsonRpcError>;

struct Pending {
    tx: oneshot::Sender<ResponseOutcome>,
    opened_at: Instant,
}

struct EndpointInner {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    next_id: AtomicI64,
    outstanding: Mutex<HashMap<RequestId, Pending>>,
    inbound: Mutex<HashMap<RequestId, RequestContext>>,
    initialized: Arc<AtomicBool>,
    error_sink: RwLock<Option<Arc<dyn Fn(String) + Send + Sync>>>,
}

impl EndpointInner {
    fn soft_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(error = %message, "endpoint soft error");
        let sink = self
            .error_sink
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(sink) = sink {
            sink(message);
        }
    }

    /// Fail every outstanding request. Invoked on transport close.
    fn drain_outstanding(&self, reason: &str) {
        let entries: Vec<(RequestId, Pending)> = {
            let mut outstanding = self.outstanding.lock().unwrap_or_else(|e| e.into_inner());
            outstanding.drain().collect()
        };
        for (id, entry) in entries {
            tracing::debug!(id = %id, elapsed = ?entry.opened_at.elapsed(), "failing outstanding request");
            let _ = entry.tx.send(Err(JsonRpcError::connection_closed(reason)));
        }
    }
}

/// A bidirectional JSON-RPC peer over a transport.
///
/// Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

impl Endpoint {
    /// Create an endpoint over the given transport.
    ///
    /// Installs the transport sinks (inbound messages are dispatched on
    /// spawned tasks, so two inbound requests may run concurrently) and the
    /// `$/cancelRequest` built-in.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let inner = Arc::new(EndpointInner {
            transport: transport.clone(),
            dispatcher: Dispatcher::new(),
            next_id: AtomicI64::new(1),
            outstanding: Mutex::new(HashMap::new()),
            inbound: Mutex::new(HashMap::new()),
            initialized: Arc::new(AtomicBool::new(false)),
            error_sink: RwLock::new(None),
        });

        // $/cancelRequest: flag the matching inbound context; a miss is a
        // race with completion and is silently dropped.
        let weak: Weak<EndpointInner> = Arc::downgrade(&inner);
        inner.dispatcher.add_sync(CANCEL_REQUEST, move |params| {
            if let Some(inner) = weak.upgrade() {
                let id = params.get("id").and_then(RequestId::from_value);
                if let Some(id) = id {
                    let inbound = inner.inbound.lock().unwrap_or_else(|e| e.into_inner());
                    if let Some(ctx) = inbound.get(&id) {
                        tracing::debug!(id = %id, "cancelling inbound request");
                        ctx.cancel();
                    }
                }
            }
            Ok(Value::Null)
        });

        let weak = Arc::downgrade(&inner);
        transport.on_message(Arc::new(move |message| {
            if let Some(inner) = weak.upgrade() {
                let endpoint = Endpoint { inner };
                tokio::spawn(async move {
                    endpoint.receive(message).await;
                });
            }
        }));

        let weak = Arc::downgrade(&inner);
        transport.on_close(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.initialized.store(false, Ordering::Release);
                inner.drain_outstanding("transport closed");
            }
        }));

        let weak = Arc::downgrade(&inner);
        transport.on_error(Arc::new(move |error| {
            if let Some(inner) = weak.upgrade() {
                inner.soft_error(error);
            }
        }));

        Endpoint { inner }
    }

    /// The routing table. Sessions install their methods here; last
    /// registration wins.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Server-role observation: has `initialize` completed?
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Shared handle to the initialized flag, for the session installing the
    /// `initialize` method.
    pub(crate) fn initialized_flag(&self) -> Arc<AtomicBool> {
        self.inner.initialized.clone()
    }

    /// Forward endpoint soft errors (unmatched responses, malformed peer
    /// input, transport errors) to the embedder.
    pub fn on_error(&self, sink: Arc<dyn Fn(String) + Send + Sync>) {
        *self
            .inner
            .error_sink
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    /// Start the underlying transport.
    pub async fn start(&self) -> Result<()> {
        self.inner.transport.start().await
    }

    /// Close the transport and fail every outstanding request with
    /// "transport closed".
    pub async fn close(&self) {
        if let Err(e) = self.inner.transport.close().await {
            tracing::debug!(error = %e, "transport close reported an error");
        }
        self.inner.initialized.store(false, Ordering::Release);
        self.inner.drain_outstanding("transport closed");
    }

    /// Send a request to the peer and return a handle resolving to its
    /// response.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<PendingRequest> {
        let id = RequestId::Number(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        {
            let mut outstanding = self
                .inner
                .outstanding
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            outstanding.insert(
                id.clone(),
                Pending {
                    tx,
                    opened_at: Instant::now(),
                },
            );
        }

        let message = jsonrpc::make_request(id.clone(), method, params);
        if let Err(e) = self.inner.transport.send(message).await {
            self.inner
                .outstanding
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            return Err(e);
        }

        Ok(PendingRequest {
            id,
            rx,
            endpoint: self.clone(),
        })
    }

    /// Fire-and-forget notification.
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.inner
            .transport
            .send(jsonrpc::make_notification(method, params))
            .await
    }

    /// Cancel an outbound request: remove it from the outstanding table,
    /// fail the waiter with `-32800`, and notify the peer. A request that
    /// already resolved is left alone.
    pub async fn cancel_request(&self, id: &RequestId) {
        let entry = self
            .inner
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        if let Some(entry) = entry {
            let _ = entry
                .tx
                .send(Err(JsonRpcError::request_cancelled("cancelled by caller")));
            let params = json!({ "id": id.to_value() });
            if let Err(e) = self.send_notification(CANCEL_REQUEST, Some(params)).await {
                tracing::debug!(error = %e, "failed to notify peer of cancellation");
            }
        }
    }

    /// Single entry point from the transport: process one inbound message
    /// and send back whatever it produced.
    pub async fn receive(&self, message: Value) {
        if let Some(reply) = self.handle_message(message).await {
            if let Err(e) = self.inner.transport.send(reply).await {
                tracing::warn!(error = %e, "failed to send response");
            }
        }
    }

    /// Process one inbound message and return the outbound reply, if any.
    ///
    /// This is the raw-dispatch surface: helpers may feed requests through
    /// here without a transport.
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        if jsonrpc::is_batch(&message) {
            let Value::Array(children) = message else {
                return None;
            };
            if children.is_empty() {
                return Some(jsonrpc::make_error(
                    None,
                    &JsonRpcError::invalid_request("empty batch"),
                ));
            }

            // children run concurrently; reply order matches inbound order
            // of the responding children
            let replies = join_all(
                children
                    .into_iter()
                    .map(|child| self.handle_one(child, true)),
            )
            .await;
            let replies: Vec<Value> = replies.into_iter().flatten().collect();
            if replies.is_empty() {
                None
            } else {
                Some(Value::Array(replies))
            }
        } else {
            self.handle_one(message, false).await
        }
    }

    async fn handle_one(&self, message: Value, in_batch: bool) -> Option<Value> {
        if jsonrpc::is_response(&message) {
            self.resolve_response(message);
            return None;
        }

        if message.get("method").is_none() {
            self.inner
                .soft_error(format!("message is neither a request nor a response: {}", message));
            return None;
        }

        if let Err(why) = jsonrpc::validate_request(&message) {
            let id = message.get("id").and_then(RequestId::from_value);
            return match id {
                Some(id) => Some(jsonrpc::make_error(
                    Some(&id),
                    &JsonRpcError::invalid_request(why),
                )),
                // inside a batch an id-less invalid child is dropped
                None if in_batch => None,
                None => Some(jsonrpc::make_error(
                    None,
                    &JsonRpcError::invalid_request(why),
                )),
            };
        }

        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let params = message
            .get("params")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        match message.get("id").and_then(RequestId::from_value) {
            None => {
                self.inner
                    .dispatcher
                    .dispatch_notification(&method, params)
                    .await;
                None
            }
            Some(id) => {
                let ctx = self.install_context(&id, &params);
                let response = context::scope(
                    ctx,
                    self.inner.dispatcher.dispatch_request(&id, &method, params),
                )
                .await;
                self.inner
                    .inbound
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                Some(response)
            }
        }
    }

    fn install_context(&self, id: &RequestId, params: &Value) -> RequestContext {
        let mut ctx =
            RequestContext::new(id.clone()).with_notifier(self.inner.transport.clone());
        if let Some(token) = progress_token_of(params) {
            ctx = ctx.with_progress_token(token);
        }
        self.inner
            .inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), ctx.clone());
        ctx
    }

    fn resolve_response(&self, message: Value) {
        if let Err(why) = jsonrpc::validate_response(&message) {
            self.inner.soft_error(format!("invalid response: {}", why));
            return;
        }

        let Some(id) = message.get("id").and_then(RequestId::from_value) else {
            // null-id error responses correlate to nothing
            self.inner
                .soft_error(format!("response with unusable id: {}", message));
            return;
        };

        let entry = self
            .inner
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        let Some(entry) = entry else {
            // unmatched, or late after a cancel: dropped
            self.inner.soft_error(format!("unmatched response id: {}", id));
            return;
        };

        let outcome = match message.get("error") {
            Some(error) => Err(serde_json::from_value(error.clone())
                .unwrap_or_else(|_| JsonRpcError::internal_error("malformed error object"))),
            None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = entry.tx.send(outcome);
    }
}

fn progress_token_of(params: &Value) -> Option<ProgressToken> {
    params
        .get("_meta")
        .and_then(|meta| meta.get("progressToken"))
        .or_else(|| params.get("progressToken"))
        .and_then(ProgressToken::from_value)
}

/// Handle for one outbound request.
pub struct PendingRequest {
    id: RequestId,
    rx: oneshot::Receiver<ResponseOutcome>,
    endpoint: Endpoint,
}

impl PendingRequest {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Await the peer's response. Exactly one of result or error resolves;
    /// endpoint close resolves the error side with "transport closed".
    pub async fn wait(self) -> ResponseOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(JsonRpcError::connection_closed("transport closed")),
        }
    }

    /// Cancel this request. The waiter (if any) resolves with `-32800` and
    /// the peer is notified.
    pub async fn cancel(self) {
        self.endpoint.cancel_request(&self.id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::MockTransport;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn endpoint_with_mock() -> (Endpoint, Arc<MockTransport>) {
        let transport = MockTransport::new();
        let endpoint = Endpoint::new(transport.clone());
        (endpoint, transport)
    }

    #[tokio::test]
    async fn test_send_request_and_resolve() {
        let (endpoint, transport) = endpoint_with_mock();

        let pending = endpoint
            .send_request("test_method", Some(json!({"param": "value"})))
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["method"], "test_method");
        let id = RequestId::from_value(&sent[0]["id"]).unwrap();

        endpoint
            .receive(jsonrpc::make_result(&id, json!({"status": "ok"})))
            .await;

        let result = pending.wait().await.unwrap();
        assert_eq!(result["status"], "ok");
    }

    #[tokio::test]
    async fn test_send_request_and_resolve_error() {
        let (endpoint, transport) = endpoint_with_mock();

        let pending = endpoint.send_request("error_method", None).await.unwrap();
        let id = RequestId::from_value(&transport.sent()[0]["id"]).unwrap();

        endpoint
            .receive(jsonrpc::make_error(
                Some(&id),
                &JsonRpcError::method_not_found("error_method"),
            ))
            .await;

        let err = pending.wait().await.unwrap_err();
        assert_eq!(err.code, -32601);
    }

    #[tokio::test]
    async fn test_request_ids_are_monotonic() {
        let (endpoint, transport) = endpoint_with_mock();
        let _a = endpoint.send_request("a", None).await.unwrap();
        let _b = endpoint.send_request("b", None).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0]["id"], 1);
        assert_eq!(sent[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_send_notification_has_no_id() {
        let (endpoint, transport) = endpoint_with_mock();
        endpoint
            .send_notification("notify_event", Some(json!({"event": "test"})))
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0]["method"], "notify_event");
        assert!(sent[0].get("id").is_none());
    }

    #[tokio::test]
    async fn test_inbound_request_dispatch() {
        let (endpoint, _transport) = endpoint_with_mock();
        endpoint.dispatcher().add("echo", |params| async move {
            Ok(json!({"echo": params["input"]}))
        });

        let reply = endpoint
            .handle_message(jsonrpc::make_request(
                "req-1",
                "echo",
                Some(json!({"input": "hello"})),
            ))
            .await
            .unwrap();
        assert_eq!(reply["result"]["echo"], "hello");
    }

    #[tokio::test]
    async fn test_inbound_notification_produces_no_reply() {
        let (endpoint, _transport) = endpoint_with_mock();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        endpoint.dispatcher().add_sync("notify_me", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });

        let reply = endpoint
            .handle_message(jsonrpc::make_notification("notify_me", None))
            .await;
        assert!(reply.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_mixed_children() {
        let (endpoint, _transport) = endpoint_with_mock();
        endpoint
            .dispatcher()
            .add_sync("method1", |_| Ok(json!({"result": 1})));
        endpoint
            .dispatcher()
            .add_sync("method2", |_| Ok(json!({"result": 2})));

        let batch = json!([
            jsonrpc::make_request("req-1", "method1", None),
            jsonrpc::make_request("req-2", "method2", None),
            jsonrpc::make_notification("method1", None),
        ]);

        let reply = endpoint.handle_message(batch).await.unwrap();
        let replies = reply.as_array().unwrap();
        // responses in input order, notification contributes nothing
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], "req-1");
        assert_eq!(replies[1]["id"], "req-2");
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid_request() {
        let (endpoint, _transport) = endpoint_with_mock();
        let reply = endpoint.handle_message(json!([])).await.unwrap();
        assert_eq!(reply["error"]["code"], -32600);
        assert!(reply["id"].is_null());
    }

    #[tokio::test]
    async fn test_batch_of_notifications_yields_nothing() {
        let (endpoint, _transport) = endpoint_with_mock();
        endpoint.dispatcher().add_sync("n", |_| Ok(Value::Null));
        let batch = json!([
            jsonrpc::make_notification("n", None),
            jsonrpc::make_notification("n", None),
        ]);
        assert!(endpoint.handle_message(batch).await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_request_with_id_gets_error_response() {
        let (endpoint, _transport) = endpoint_with_mock();
        let reply = endpoint
            .handle_message(json!({"method": "test", "id": 1}))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], -32600);
        assert_eq!(reply["id"], 1);
    }

    #[tokio::test]
    async fn test_neither_request_nor_response_is_soft_error() {
        let (endpoint, transport) = endpoint_with_mock();
        let errors = Arc::new(AtomicUsize::new(0));
        let e = errors.clone();
        endpoint.on_error(Arc::new(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        }));

        let reply = endpoint.handle_message(json!({"jsonrpc": "2.0"})).await;
        assert!(reply.is_none());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(transport.is_open());
    }

    #[tokio::test]
    async fn test_unmatched_response_is_soft_error() {
        let (endpoint, _transport) = endpoint_with_mock();
        let errors = Arc::new(AtomicUsize::new(0));
        let e = errors.clone();
        endpoint.on_error(Arc::new(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        }));

        endpoint
            .receive(jsonrpc::make_result(&99.into(), json!("orphan")))
            .await;
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inbound_cancellation_mid_handler() {
        let (endpoint, _transport) = endpoint_with_mock();
        endpoint.dispatcher().add("slow", |_| async move {
            loop {
                if context::is_cancelled() {
                    return Err(Error::JsonRpc(JsonRpcError::request_cancelled(
                        "observed cancel",
                    )));
                }
                tokio::task::yield_now().await;
            }
        });

        let ep = endpoint.clone();
        let running =
            tokio::spawn(
                async move { ep.handle_message(jsonrpc::make_request(7, "slow", None)).await },
            );

        // give the handler a chance to start, then cancel it
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        endpoint
            .handle_message(jsonrpc::make_notification(
                CANCEL_REQUEST,
                Some(json!({"id": 7})),
            ))
            .await;

        let reply = running.await.unwrap().unwrap();
        assert_eq!(reply["error"]["code"], -32800);
        assert_eq!(reply["id"], 7);
    }

    #[tokio::test]
    async fn test_cancel_for_unknown_id_is_dropped() {
        let (endpoint, _transport) = endpoint_with_mock();
        let reply = endpoint
            .handle_message(jsonrpc::make_notification(
                CANCEL_REQUEST,
                Some(json!({"id": 12345})),
            ))
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_outbound_cancel_fails_waiter_and_notifies_peer() {
        let (endpoint, transport) = endpoint_with_mock();

        let pending = endpoint.send_request("slow_method", None).await.unwrap();
        let id = pending.id().clone();

        endpoint.cancel_request(&id).await;

        let err = pending.wait().await.unwrap_err();
        assert_eq!(err.code, -32800);

        let sent = transport.sent();
        let cancel = sent.last().unwrap();
        assert_eq!(cancel["method"], CANCEL_REQUEST);
        assert_eq!(cancel["params"]["id"], id.to_value());

        // a late response for the cancelled id is dropped without panic
        endpoint
            .receive(jsonrpc::make_result(&id, json!("too late")))
            .await;
    }

    #[tokio::test]
    async fn test_close_drains_outstanding() {
        let (endpoint, _transport) = endpoint_with_mock();
        let pending = endpoint.send_request("never_answered", None).await.unwrap();

        endpoint.close().await;

        let err = pending.wait().await.unwrap_err();
        assert_eq!(err.code, -32000);
        assert!(err.message.contains("transport closed"));
    }

    #[tokio::test]
    async fn test_initialized_starts_false_and_resets_on_close() {
        let (endpoint, _transport) = endpoint_with_mock();
        assert!(!endpoint.is_initialized());

        endpoint
            .initialized_flag()
            .store(true, Ordering::Release);
        assert!(endpoint.is_initialized());

        endpoint.close().await;
        assert!(!endpoint.is_initialized());
    }

    #[tokio::test]
    async fn test_progress_token_extraction() {
        assert_eq!(
            progress_token_of(&json!({"_meta": {"progressToken": "p"}})),
            Some(ProgressToken::String("p".into()))
        );
        assert_eq!(
            progress_token_of(&json!({"progressToken": 3})),
            Some(ProgressToken::Number(3))
        );
        assert_eq!(progress_token_of(&json!({})), None);
    }
}
