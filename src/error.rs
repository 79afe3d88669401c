//! Error types for mcpkit
//!
//! ## JSON-RPC Error Codes
//!
//! Standard JSON-RPC 2.0 error codes are defined in the specification:
//! <https://www.jsonrpc.org/specification#error_object>
//!
//! | Code   | Message           | Meaning                                      |
//! |--------|-------------------|----------------------------------------------|
//! | -32700 | Parse error       | Invalid JSON was received                    |
//! | -32600 | Invalid Request   | The JSON sent is not a valid Request         |
//! | -32601 | Method not found  | The method does not exist / is not available |
//! | -32602 | Invalid params    | Invalid method parameter(s)                  |
//! | -32603 | Internal error    | Internal JSON-RPC error                      |
//! | -32800 | Request cancelled | `$/cancelRequest` observed for this request  |
//!
//! MCP additionally reserves the server error range (-32000 to -32099);
//! [`CONNECTION_CLOSED`] is used when a transport goes away with requests
//! still outstanding.

use serde::{Deserialize, Serialize};

/// Type-erased error type for handler failure sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fixed JSON-RPC / MCP protocol error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// Invalid JSON was received
    ParseError = -32700,
    /// The JSON sent is not a valid Request object
    InvalidRequest = -32600,
    /// The method does not exist / is not available
    MethodNotFound = -32601,
    /// Invalid method parameter(s)
    InvalidParams = -32602,
    /// Internal JSON-RPC error
    InternalError = -32603,
    /// The request was cancelled via `$/cancelRequest`
    RequestCancelled = -32800,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// MCP server-error code reported when the transport closes with requests
/// still in flight.
pub const CONNECTION_CLOSED: i32 = -32000;

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn request_cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RequestCancelled, message)
    }

    /// Transport closed while the request was outstanding
    pub fn connection_closed(message: impl Into<String>) -> Self {
        Self {
            code: CONNECTION_CLOSED,
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Handler execution error with context
///
/// Raised from user tool/prompt/resource handlers; the dispatcher maps it to
/// a `-32603` error response carrying the failure description.
#[derive(Debug)]
pub struct HandlerError {
    /// The handler name that failed (tool name, resource uri, ...)
    pub handler: Option<String>,
    /// Error message
    pub message: String,
    /// Source error if any
    pub source: Option<BoxError>,
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(handler) = &self.handler {
            write!(f, "handler '{}' failed: {}", handler, self.message)
        } else {
            write!(f, "handler failed: {}", self.message)
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl HandlerError {
    /// Create a new handler error with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            handler: None,
            message: message.into(),
            source: None,
        }
    }

    /// Create a handler error carrying the handler name
    pub fn named(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            handler: Some(handler.into()),
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// mcpkit error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A protocol-level error with a JSON-RPC error code. These pass through
    /// to the peer unchanged; everything else becomes `-32603`.
    #[error("JSON-RPC error: {0}")]
    JsonRpc(JsonRpcError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Handler(#[from] HandlerError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session error: {0}")]
    Session(String),
}

impl Error {
    /// Create a simple handler error from a string
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler(HandlerError::new(message))
    }

    /// Create a handler error from any `Display` type, useful in `map_err`
    /// chains:
    ///
    /// ```rust
    /// # use mcpkit::Error;
    /// # fn example() -> Result<(), Error> {
    /// let result: Result<(), std::io::Error> = Err(std::io::Error::other("oops"));
    /// result.map_err(Error::handler_from)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn handler_from<E: std::fmt::Display>(err: E) -> Self {
        Error::Handler(HandlerError::new(err.to_string()))
    }

    /// The JSON-RPC error object this failure maps to.
    ///
    /// Declared protocol errors keep their code; any other failure becomes an
    /// internal error carrying the failure description. Translation happens
    /// exactly once.
    pub fn into_json_rpc(self) -> JsonRpcError {
        match self {
            Error::JsonRpc(e) => e,
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}

impl From<JsonRpcError> for Error {
    fn from(err: JsonRpcError) -> Self {
        Error::JsonRpc(err)
    }
}

/// Result type alias for mcpkit
pub type Result<T> = std::result::Result<T, Error>;
