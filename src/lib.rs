//! # mcpkit
//!
//! Transport-agnostic Model Context Protocol (MCP) engine.
//!
//! MCP is a JSON-RPC 2.0 framing spoken between a host application and
//! capability servers that expose *tools*, *prompts*, and *resources* to a
//! language-model runtime. This crate provides both sides of that
//! conversation on top of a small transport abstraction:
//!
//! - a bidirectional JSON-RPC [`Endpoint`] with request correlation,
//!   batches, request-scoped cancellation, and progress reporting
//! - [`ServerSession`]: registries plus the MCP method bindings
//! - [`ClientSession`]: the initialize handshake and typed request wrappers
//! - reference transports: newline-delimited JSON over byte streams
//!   ([`LineTransport`], including stdio) and an in-memory pair
//!   ([`LoopbackTransport`]) for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcpkit::{Content, Implementation, LineTransport, ServerSession, ToolBuilder};
//!
//! #[tokio::main]
//! async fn main() -> mcpkit::Result<()> {
//!     let server = ServerSession::new(
//!         Arc::new(LineTransport::stdio()),
//!         Implementation::new("calculator", "1.0.0"),
//!     );
//!     server.enable_tools(false);
//!
//!     server.add_tool(ToolBuilder::new("add").description("Add two numbers").handler(
//!         |args| async move {
//!             let sum = args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0);
//!             Ok(vec![Content::text(sum.to_string())])
//!         },
//!     ));
//!
//!     server.start().await?;
//!     // ... run until the host closes stdin
//!     Ok(())
//! }
//! ```
//!
//! Handlers observe their request ambiently: [`context::is_cancelled`]
//! reports peer cancellation (`$/cancelRequest`) and
//! [`context::report_progress`] emits `notifications/progress` when the
//! requester supplied a progress token. Streaming handlers get both per
//! yielded chunk.

pub mod client;
pub mod context;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod files;
pub mod jsonrpc;
pub mod protocol;
pub mod server;
pub mod tool;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use client::{ClientSession, ClientState, ToolCall};
pub use context::{CancellationToken, RequestContext};
pub use dispatch::{CancelPolicy, Dispatcher};
pub use endpoint::{Endpoint, PendingRequest};
pub use error::{Error, ErrorCode, JsonRpcError, Result};
pub use files::FileResourceServer;
pub use jsonrpc::RequestId;
pub use protocol::{
    ClientCapabilities, Content, Implementation, LogLevel, Prompt, PromptArgument, PromptMessage,
    Resource, ResourceContent, Role, ServerCapabilities, Tool, ToolInputSchema,
};
pub use server::ServerSession;
pub use tool::{ToolBuilder, ToolRegistration};
pub use transport::{LineTransport, LoopbackTransport, Transport};
