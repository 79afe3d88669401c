//! MCP transport implementations
//!
//! A transport moves opaque JSON messages between two peers. The engine only
//! depends on the [`Transport`] trait; two reference implementations ship
//! with the crate:
//!
//! - [`line`] - one message per newline-delimited JSON line over any byte
//!   stream pair (stdio included)
//! - [`loopback`] - in-memory paired queues for tests and in-process wiring
//!
//! Transports preserve send order within a direction and deliver each
//! message at most once. Errors are advisory: a soft error (malformed frame)
//! leaves the connection open, a fatal one (EOF, broken pipe) fires the
//! close sink.

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub mod line;
pub mod loopback;

pub use line::LineTransport;
pub use loopback::LoopbackTransport;

/// Sink invoked for every inbound message.
pub type MessageSink = Arc<dyn Fn(Value) + Send + Sync>;
/// Sink invoked for transport errors. Soft errors do not close the
/// connection.
pub type ErrorSink = Arc<dyn Fn(String) + Send + Sync>;
/// Sink invoked exactly once when the transport closes.
pub type CloseSink = Arc<dyn Fn() + Send + Sync>;

/// Byte-transport abstraction consumed by the endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Enqueue one message for delivery. Returns after local acceptance, not
    /// peer receipt. Fails only when the transport is closed.
    async fn send(&self, message: Value) -> Result<()>;

    /// Begin asynchronous delivery of inbound messages to the message sink.
    /// Idempotent.
    async fn start(&self) -> Result<()>;

    /// Stop delivery, drain outstanding reader work, and fire the close sink
    /// exactly once. Idempotent.
    async fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Install (or replace) the inbound message sink.
    fn on_message(&self, sink: MessageSink);

    /// Install (or replace) the error sink.
    fn on_error(&self, sink: ErrorSink);

    /// Install (or replace) the close sink.
    fn on_close(&self, sink: CloseSink);
}

/// Shared sink storage for transport implementations.
///
/// Handles the replaceable-sink contract and guarantees the close sink fires
/// at most once regardless of how many paths reach end-of-life.
#[derive(Default)]
pub struct Sinks {
    message: RwLock<Option<MessageSink>>,
    error: RwLock<Option<ErrorSink>>,
    close: RwLock<Option<CloseSink>>,
    close_fired: AtomicBool,
}

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_message(&self, sink: MessageSink) {
        *self.message.write().unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    pub fn set_error(&self, sink: ErrorSink) {
        *self.error.write().unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    pub fn set_close(&self, sink: CloseSink) {
        *self.close.write().unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    pub fn emit_message(&self, message: Value) {
        let sink = self
            .message
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(sink) = sink {
            sink(message);
        }
    }

    pub fn emit_error(&self, error: impl Into<String>) {
        let sink = self
            .error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(sink) = sink {
            sink(error.into());
        }
    }

    /// Fire the close sink; subsequent calls are no-ops.
    pub fn emit_close(&self) {
        if self.close_fired.swap(true, Ordering::AcqRel) {
            return;
        }
        let sink = self
            .close
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(sink) = sink {
            sink();
        }
    }
}
