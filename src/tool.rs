//! Tool definition and builder API
//!
//! A tool pairs a wire-visible [`Tool`] definition with the handler invoked
//! by `tools/call`. Three handler shapes are supported:
//!
//! 1. **Raw** - `Fn(Value) -> Future<Result<Vec<Content>>>`, arguments as-is
//! 2. **Typed** - arguments deserialized into a `schemars`-described input
//!    type; malformed input is rejected with `-32602`
//! 3. **Streaming** - a lazy stream of content chunks, driven through the
//!    streaming adapter (per-chunk progress, cancellation checkpoints)
//!
//! ```rust,ignore
//! #[derive(Deserialize, JsonSchema)]
//! struct AddInput { a: i64, b: i64 }
//!
//! let add = ToolBuilder::new("add")
//!     .description("Add two numbers")
//!     .typed_handler(|input: AddInput| async move {
//!         Ok(vec![Content::text((input.a + input.b).to_string())])
//!     });
//! server.add_tool(add);
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::dispatch::{CancelPolicy, drive_stream};
use crate::error::{JsonRpcError, Result};
use crate::protocol::{Content, Tool, ToolInputSchema};

/// Handler contract for tool execution.
pub trait ToolHandler: Send + Sync {
    fn call(&self, args: Value) -> BoxFuture<'_, Result<Vec<Content>>>;
}

/// A tool definition together with its handler, ready for registration.
pub struct ToolRegistration {
    pub definition: Tool,
    handler: Arc<dyn ToolHandler>,
}

impl ToolRegistration {
    pub fn new(definition: Tool, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            definition,
            handler,
        }
    }

    /// Pair a definition with a raw handler directly, without the builder.
    pub fn from_fn<F, Fut>(definition: Tool, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Content>>> + Send + 'static,
    {
        Self::new(definition, Arc::new(RawHandler { f }))
    }

    /// Pair a definition with a streaming handler directly.
    pub fn streaming<F>(definition: Tool, f: F, policy: CancelPolicy) -> Self
    where
        F: Fn(Value) -> BoxStream<'static, Result<Content>> + Send + Sync + 'static,
    {
        Self::new(definition, Arc::new(StreamingHandler { f, policy }))
    }

    pub fn call(&self, args: Value) -> BoxFuture<'_, Result<Vec<Content>>> {
        self.handler.call(args)
    }
}

/// Fluent builder for tools.
pub struct ToolBuilder {
    name: String,
    description: Option<String>,
    input_schema: Option<ToolInputSchema>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema explicitly.
    pub fn input_schema(mut self, schema: ToolInputSchema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Derive the input schema from a type.
    pub fn input<I: JsonSchema>(mut self) -> Self {
        self.input_schema = Some(schema_for_input::<I>());
        self
    }

    fn definition(self) -> Tool {
        Tool {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema.unwrap_or_default(),
        }
    }

    /// Finish with a raw handler receiving the arguments as JSON.
    pub fn handler<F, Fut>(self, f: F) -> ToolRegistration
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Content>>> + Send + 'static,
    {
        ToolRegistration::new(self.definition(), Arc::new(RawHandler { f }))
    }

    /// Finish with a typed handler. The input schema is derived from `I`
    /// unless one was set explicitly; arguments that fail to deserialize are
    /// rejected with `-32602`.
    pub fn typed_handler<I, F, Fut>(mut self, f: F) -> ToolRegistration
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Content>>> + Send + 'static,
    {
        if self.input_schema.is_none() {
            self.input_schema = Some(schema_for_input::<I>());
        }
        ToolRegistration::new(
            self.definition(),
            Arc::new(TypedHandler {
                f,
                _input: std::marker::PhantomData::<fn() -> I>,
            }),
        )
    }

    /// Finish with a streaming handler yielding content chunks.
    pub fn streaming_handler<F>(self, f: F, policy: CancelPolicy) -> ToolRegistration
    where
        F: Fn(Value) -> BoxStream<'static, Result<Content>> + Send + Sync + 'static,
    {
        ToolRegistration::new(self.definition(), Arc::new(StreamingHandler { f, policy }))
    }
}

fn schema_for_input<I: JsonSchema>() -> ToolInputSchema {
    let schema = schemars::schema_for!(I);
    serde_json::to_value(&schema)
        .ok()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

struct RawHandler<F> {
    f: F,
}

impl<F, Fut> ToolHandler for RawHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Content>>> + Send + 'static,
{
    fn call(&self, args: Value) -> BoxFuture<'_, Result<Vec<Content>>> {
        Box::pin((self.f)(args))
    }
}

struct TypedHandler<I, F> {
    f: F,
    _input: std::marker::PhantomData<fn() -> I>,
}

impl<I, F, Fut> ToolHandler for TypedHandler<I, F>
where
    I: DeserializeOwned + JsonSchema + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Content>>> + Send + 'static,
{
    fn call(&self, args: Value) -> BoxFuture<'_, Result<Vec<Content>>> {
        Box::pin(async move {
            let input: I = serde_json::from_value(args)
                .map_err(|e| JsonRpcError::invalid_params(format!("invalid arguments: {}", e)))?;
            (self.f)(input).await
        })
    }
}

struct StreamingHandler<F> {
    f: F,
    policy: CancelPolicy,
}

impl<F> ToolHandler for StreamingHandler<F>
where
    F: Fn(Value) -> BoxStream<'static, Result<Content>> + Send + Sync,
{
    fn call(&self, args: Value) -> BoxFuture<'_, Result<Vec<Content>>> {
        let stream = (self.f)(args);
        let policy = self.policy;
        Box::pin(drive_stream(stream, policy))
    }
}
