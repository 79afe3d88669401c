//! In-memory loopback transport
//!
//! Two paired handles, each delivering what the other sends. Used by tests
//! to exercise the endpoint and sessions without sockets, and by embedders
//! that want an in-process client/server pair.
//!
//! `send` enqueues onto the peer's queue; a per-transport worker task pops
//! and fires the message sink, so delivery is asynchronous and ordered.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::transport::{CloseSink, ErrorSink, MessageSink, Sinks, Transport};

/// One side of an in-memory transport pair.
pub struct LoopbackTransport {
    inner: Arc<Inner>,
}

struct Inner {
    sinks: Sinks,
    peer_tx: mpsc::UnboundedSender<Value>,
    inbound: StdMutex<Option<mpsc::UnboundedReceiver<Value>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    open: AtomicBool,
    shutdown: Notify,
}

impl LoopbackTransport {
    /// Create a connected pair of transports.
    ///
    /// Messages sent before the peer calls `start` are queued and delivered
    /// once it does.
    pub fn pair() -> (LoopbackTransport, LoopbackTransport) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let a = LoopbackTransport {
            inner: Arc::new(Inner {
                sinks: Sinks::new(),
                peer_tx: b_tx,
                inbound: StdMutex::new(Some(a_rx)),
                worker: Mutex::new(None),
                open: AtomicBool::new(true),
                shutdown: Notify::new(),
            }),
        };
        let b = LoopbackTransport {
            inner: Arc::new(Inner {
                sinks: Sinks::new(),
                peer_tx: a_tx,
                inbound: StdMutex::new(Some(b_rx)),
                worker: Mutex::new(None),
                open: AtomicBool::new(true),
                shutdown: Notify::new(),
            }),
        };
        (a, b)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, message: Value) -> Result<()> {
        if !self.inner.open.load(Ordering::Acquire) {
            return Err(Error::Transport("transport closed".to_string()));
        }
        self.inner
            .peer_tx
            .send(message)
            .map_err(|_| Error::Transport("transport closed".to_string()))
    }

    async fn start(&self) -> Result<()> {
        let Some(mut rx) = self
            .inner
            .inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            // already started
            return Ok(());
        };

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.shutdown.notified() => break,
                    message = rx.recv() => match message {
                        Some(message) => inner.sinks.emit_message(message),
                        // peer dropped its sender: connection is gone
                        None => break,
                    },
                }
            }
            inner.open.store(false, Ordering::Release);
            inner.sinks.emit_close();
        });

        *self.inner.worker.lock().await = Some(handle);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.open.store(false, Ordering::Release);
        self.inner.shutdown.notify_one();
        if let Some(handle) = self.inner.worker.lock().await.take() {
            let _ = handle.await;
        }
        self.inner.sinks.emit_close();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    fn on_message(&self, sink: MessageSink) {
        self.inner.sinks.set_message(sink);
    }

    fn on_error(&self, sink: ErrorSink) {
        self.inner.sinks.set_error(sink);
    }

    fn on_close(&self, sink: CloseSink) {
        self.inner.sinks.set_close(sink);
    }
}
