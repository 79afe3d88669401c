//! Shared test fixtures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::{CloseSink, ErrorSink, MessageSink, Sinks, Transport};

/// Transport that records everything sent through it, for driving the
/// endpoint without wiring a real peer. Inbound traffic is injected by
/// calling `Endpoint::receive` / `handle_message` directly.
pub(crate) struct MockTransport {
    sent: Mutex<Vec<Value>>,
    sinks: Sinks,
    open: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            sinks: Sinks::new(),
            open: AtomicBool::new(true),
        })
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Fire the close sink, as a real transport would on fatal failure.
    #[allow(dead_code)]
    pub fn simulate_close(&self) {
        self.open.store(false, Ordering::Release);
        self.sinks.emit_close();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: Value) -> Result<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(Error::Transport("transport closed".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        self.sinks.emit_close();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn on_message(&self, sink: MessageSink) {
        self.sinks.set_message(sink);
    }

    fn on_error(&self, sink: ErrorSink) {
        self.sinks.set_error(sink);
    }

    fn on_close(&self, sink: CloseSink) {
        self.sinks.set_close(sink);
    }
}
