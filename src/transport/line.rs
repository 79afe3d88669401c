//! Line-delimited JSON transport
//!
//! One message per `\n`-terminated line over any byte stream pair. The
//! reader runs on a background task that owns the input stream: blank lines
//! are skipped, parse failures are soft errors, and EOF or a read failure
//! closes the transport. Writes hold a lock across one message and flush
//! after each, so frames are whole on the wire.
//!
//! [`LineTransport::stdio`] wires the pair to stdin/stdout for subprocess
//! MCP servers.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::transport::{CloseSink, ErrorSink, MessageSink, Sinks, Transport};

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Newline-delimited JSON transport over a byte stream pair.
pub struct LineTransport {
    inner: Arc<Inner>,
}

struct Inner {
    sinks: Sinks,
    writer: Mutex<BoxWriter>,
    reader: StdMutex<Option<BoxReader>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    open: AtomicBool,
    shutdown: Notify,
}

impl LineTransport {
    /// Create a transport over the given streams.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sinks: Sinks::new(),
                writer: Mutex::new(Box::new(writer)),
                reader: StdMutex::new(Some(Box::new(reader))),
                worker: Mutex::new(None),
                open: AtomicBool::new(true),
                shutdown: Notify::new(),
            }),
        }
    }

    /// Transport over this process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl Transport for LineTransport {
    async fn send(&self, message: Value) -> Result<()> {
        if !self.inner.open.load(Ordering::Acquire) {
            return Err(Error::Transport("transport closed".to_string()));
        }

        let frame = serde_json::to_string(&message)?;
        tracing::debug!(frame = %frame, "sending line");

        let mut writer = self.inner.writer.lock().await;
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| Error::Transport(format!("failed to write frame: {}", e)))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| Error::Transport(format!("failed to write newline: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("failed to flush: {}", e)))?;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let Some(reader) = self
            .inner
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            // already started
            return Ok(());
        };

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            tracing::debug!("line transport reader started");
            loop {
                tokio::select! {
                    _ = inner.shutdown.notified() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let trimmed = line.trim();
                            if trimmed.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<Value>(trimmed) {
                                Ok(message) => {
                                    tracing::debug!(frame = %trimmed, "received line");
                                    inner.sinks.emit_message(message);
                                }
                                // malformed frame: soft error, keep reading
                                Err(e) => {
                                    inner.sinks.emit_error(format!("JSON parse error: {}", e));
                                }
                            }
                        }
                        Ok(None) => {
                            tracing::debug!("input stream reached EOF");
                            break;
                        }
                        Err(e) => {
                            inner.sinks.emit_error(format!("read failed: {}", e));
                            break;
                        }
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
