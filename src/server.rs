//! MCP server session
//!
//! [`ServerSession`] holds the tool, prompt, and resource registries and
//! installs the MCP method bindings on an [`Endpoint`]. On construction it
//! registers:
//!
//! - `initialize` - refuses a second call, stores the peer's info and
//!   capabilities, answers with this server's implementation, the protocol
//!   version literal, and the advertised capabilities
//! - `tools/list`, `tools/call`, `prompts/list`, `prompts/get`,
//!   `resources/list`, `resources/read`
//! - a no-op `notifications/initialized` acceptor
//!
//! Every MCP method other than `initialize` answers `-32600` until the
//! handshake has completed. Capability advertisement is mutated through
//! `enable_*`; the corresponding `notifications/*/list_changed` is an
//! explicit action the embedder triggers after changing a registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::dispatch::{CancelPolicy, drive_stream};
use crate::endpoint::Endpoint;
use crate::error::{Error, ErrorCode, JsonRpcError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, GetPromptParams, GetPromptResult,
    Implementation, InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult,
    LogLevel, LogMessageParams, PROTOCOL_VERSION, Prompt, PromptMessage, PromptsCapability,
    ReadResourceParams, ReadResourceResult, Resource, ResourceContent, ResourcesCapability,
    ServerCapabilities, Tool, ToolsCapability, notifications,
};
use crate::tool::ToolRegistration;
use crate::transport::Transport;

type PromptHandlerFn =
    Arc<dyn Fn(HashMap<String, String>) -> BoxFuture<'static, Result<Vec<PromptMessage>>> + Send + Sync>;

type ResourceReaderFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Vec<ResourceContent>>> + Send + Sync>;

struct PromptRegistration {
    definition: Prompt,
    handler: PromptHandlerFn,
}

struct ResourceRegistration {
    definition: Resource,
    reader: ResourceReaderFn,
}

struct ServerState {
    info: Implementation,
    instructions: RwLock<Option<String>>,
    capabilities: RwLock<ServerCapabilities>,
    client_info: RwLock<Option<Implementation>>,
    client_capabilities: RwLock<Option<ClientCapabilities>>,
    client_protocol_version: RwLock<Option<String>>,
    tools: RwLock<HashMap<String, Arc<ToolRegistration>>>,
    prompts: RwLock<HashMap<String, Arc<PromptRegistration>>>,
    resources: RwLock<HashMap<String, Arc<ResourceRegistration>>>,
}

/// MCP server: registries plus method bindings over an endpoint.
pub struct ServerSession {
    endpoint: Endpoint,
    state: Arc<ServerState>,
}

fn ensure_initialized(flag: &AtomicBool) -> Result<()> {
    if flag.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(JsonRpcError::invalid_request("not initialized").into())
    }
}

fn not_found(kind: &str, name: &str) -> Error {
    JsonRpcError::new(ErrorCode::MethodNotFound, format!("{} not found: {}", kind, name)).into()
}

/// Keep declared protocol errors, wrap anything else as `-32603` with the
/// failure description.
fn wrap_handler_failure(what: &str, name: &str, error: Error) -> Error {
    match error {
        Error::JsonRpc(_) => error,
        other => {
            JsonRpcError::internal_error(format!("{} '{}' failed: {}", what, name, other)).into()
        }
    }
}

impl ServerSession {
    pub fn new(transport: Arc<dyn Transport>, info: Implementation) -> Self {
        let endpoint = Endpoint::new(transport);
        let state = Arc::new(ServerState {
            info,
            instructions: RwLock::new(None),
            capabilities: RwLock::new(ServerCapabilities::default()),
            client_info: RwLock::new(None),
            client_capabilities: RwLock::new(None),
            client_protocol_version: RwLock::new(None),
            tools: RwLock::new(HashMap::new()),
            prompts: RwLock::new(HashMap::new()),
            resources: RwLock::new(HashMap::new()),
        });

        let session = Self { endpoint, state };
        session.install_methods();
        session
    }

    fn install_methods(&self) {
        let dispatcher = self.endpoint.dispatcher();

        // initialize
        let state = self.state.clone();
        let flag = self.endpoint.initialized_flag();
        dispatcher.add("initialize", move |params| {
            let state = state.clone();
            let flag = flag.clone();
            async move {
                if flag.load(Ordering::Acquire) {
                    return Err(JsonRpcError::invalid_request("already initialized").into());
                }

                // peer fields are stored tolerantly; a sparse initialize
                // still succeeds
                if let Some(info) = params
                    .get("clientInfo")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                {
                    *state.client_info.write().unwrap_or_else(|e| e.into_inner()) = Some(info);
                }
                if let Some(caps) = params
                    .get("capabilities")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                {
                    *state
                        .client_capabilities
                        .write()
                        .unwrap_or_else(|e| e.into_inner()) = Some(caps);
                }
                if let Some(version) = params.get("protocolVersion").and_then(Value::as_str) {
                    *state
                        .client_protocol_version
                        .write()
                        .unwrap_or_else(|e| e.into_inner()) = Some(version.to_string());
                }

                flag.store(true, Ordering::Release);
                tracing::info!(server = %state.info.name, "session initialized");

                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: state
                        .capabilities
                        .read()
                        .unwrap_or_else(|e| e.into_inner())
                        .clone(),
                    server_info: state.info.clone(),
                    instructions: state
                        .instructions
                        .read()
                        .unwrap_or_else(|e| e.into_inner())
                        .clone(),
                };
                Ok(serde_json::to_value(result)?)
            }
        });

        // the follow-up notification is accepted and ignored
        dispatcher.add_sync(notifications::INITIALIZED, |_| Ok(Value::Null));

        // tools/list
        let state = self.state.clone();
        let flag = self.endpoint.initialized_flag();
        dispatcher.add("tools/list", move |_params| {
            let state = state.clone();
            let flag = flag.clone();
            async move {
                ensure_initialized(&flag)?;
                let mut tools: Vec<Tool> = state
                    .tools
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .values()
                    .map(|r| r.definition.clone())
                    .collect();
                tools.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(serde_json::to_value(ListToolsResult { tools })?)
            }
        });

        // tools/call
        let state = self.state.clone();
        let flag = self.endpoint.initialized_flag();
        dispatcher.add("tools/call", move |params| {
            let state = state.clone();
            let flag = flag.clone();
            async move {
                ensure_initialized(&flag)?;
                let params: CallToolParams = serde_json::from_value(params)
                    .map_err(|e| JsonRpcError::invalid_params(format!("invalid tools/call params: {}", e)))?;

                let registration = state
                    .tools
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(&params.name)
                    .cloned();
                let Some(registration) = registration else {
                    return Err(not_found("Tool", &params.name));
                };

                let arguments = params
                    .arguments
                    .unwrap_or_else(|| Value::Object(Default::default()));
                let content = registration
                    .call(arguments)
                    .await
                    .map_err(|e| wrap_handler_failure("tool", &params.name, e))?;
                Ok(serde_json::to_value(CallToolResult { content })?)
            }
        });

        // prompts/list
        let state = self.state.clone();
        let flag = self.endpoint.initialized_flag();
        dispatcher.add("prompts/list", move |_params| {
            let state = state.clone();
            let flag = flag.clone();
            async move {
                ensure_initialized(&flag)?;
                let mut prompts: Vec<Prompt> = state
                    .prompts
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .values()
                    .map(|r| r.definition.clone())
                    .collect();
                prompts.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(serde_json::to_value(ListPromptsResult { prompts })?)
            }
        });

        // prompts/get
        let state = self.state.clone();
        let flag = self.endpoint.initialized_flag();
        dispatcher.add("prompts/get", move |params| {
            let state = state.clone();
            let flag = flag.clone();
            async move {
                ensure_initialized(&flag)?;
                let params: GetPromptParams = serde_json::from_value(params)
                    .map_err(|e| JsonRpcError::invalid_params(format!("invalid prompts/get params: {}", e)))?;

                let registration = state
                    .prompts
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(&params.name)
                    .cloned();
                let Some(registration) = registration else {
                    return Err(not_found("Prompt", &params.name));
                };

                // arguments are a string-valued map; non-string members are
                // ignored
                let mut arguments = HashMap::new();
                if let Some(Value::Object(map)) = params.arguments {
                    for (key, value) in map {
                        if let Value::String(s) = value {
                            arguments.insert(key, s);
                        }
                    }
                }

                let messages = (registration.handler)(arguments)
                    .await
                    .map_err(|e| wrap_handler_failure("prompt", &params.name, e))?;
                Ok(serde_json::to_value(GetPromptResult {
                    description: None,
                    messages,
                })?)
            }
        });

        // resources/list
        let state = self.state.clone();
        let flag = self.endpoint.initialized_flag();
        dispatcher.add("resources/list", move |_params| {
            let state = state.clone();
            let flag = flag.clone();
            async move {
                ensure_initialized(&flag)?;
                let mut resources: Vec<Resource> = state
                    .resources
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .values()
                    .map(|r| r.definition.clone())
                    .collect();
                resources.sort_by(|a, b| a.uri.cmp(&b.uri));
                Ok(serde_json::to_value(ListResourcesResult { resources })?)
            }
        });

        // resources/read
        let state = self.state.clone();
        let flag = self.endpoint.initialized_flag();
        dispatcher.add("resources/read", move |params| {
            let state = state.clone();
            let flag = flag.clone();
            async move {
                ensure_initialized(&flag)?;
                let params: ReadResourceParams = serde_json::from_value(params)
                    .map_err(|e| JsonRpcError::invalid_params(format!("invalid resources/read params: {}", e)))?;

                let registration = state
                    .resources
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(&params.uri)
                    .cloned();
                let Some(registration) = registration else {
                    return Err(not_found("Resource", &params.uri));
                };

                let contents = (registration.reader)(params.uri.clone())
                    .await
                    .map_err(|e| wrap_handler_failure("resource", &params.uri, e))?;
                Ok(serde_json::to_value(ReadResourceResult { contents })?)
            }
        });
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Start the underlying transport.
    pub async fn start(&self) -> Result<()> {
        self.endpoint.start().await
    }

    /// Close the transport; the session must re-initialize afterwards.
    pub async fn close(&self) {
        self.endpoint.close().await;
    }

    pub fn is_initialized(&self) -> bool {
        self.endpoint.is_initialized()
    }

    /// Peer implementation recorded during `initialize`.
    pub fn client_info(&self) -> Option<Implementation> {
        self.state
            .client_info
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Peer capabilities recorded during `initialize`.
    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.state
            .client_capabilities
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Protocol version the peer asked for.
    pub fn client_protocol_version(&self) -> Option<String> {
        self.state
            .client_protocol_version
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Usage instructions included in the initialize response.
    pub fn set_instructions(&self, instructions: impl Into<String>) {
        *self
            .state
            .instructions
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(instructions.into());
    }

    pub fn enable_tools(&self, list_changed: bool) {
        self.state
            .capabilities
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .tools = Some(ToolsCapability { list_changed });
    }

    pub fn enable_prompts(&self, list_changed: bool) {
        self.state
            .capabilities
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .prompts = Some(PromptsCapability { list_changed });
    }

    pub fn enable_resources(&self, subscribe: bool, list_changed: bool) {
        self.state
            .capabilities
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .resources = Some(ResourcesCapability {
            subscribe,
            list_changed,
        });
    }

    pub fn enable_logging(&self) {
        self.state
            .capabilities
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .logging = Some(Default::default());
    }

    /// Register a built tool, replacing any existing tool with the same
    /// name.
    pub fn add_tool(&self, registration: ToolRegistration) {
        let mut tools = self
            .state
            .tools
            .write()
            .unwrap_or_else(|e| e.into_inner());
        tools.insert(registration.definition.name.clone(), Arc::new(registration));
    }

    /// Register a tool from a definition and a raw handler.
    pub fn register_tool<F, Fut>(&self, definition: Tool, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<crate::protocol::Content>>> + Send + 'static,
    {
        self.add_tool(ToolRegistration::from_fn(definition, handler));
    }

    /// Register a tool whose handler yields content chunks lazily. Chunks
    /// are aggregated, progress is reported per chunk, and cancellation is
    /// observed between pulls.
    pub fn register_streaming_tool<F>(&self, definition: Tool, handler: F, policy: CancelPolicy)
    where
        F: Fn(Value) -> BoxStream<'static, Result<crate::protocol::Content>>
            + Send
            + Sync
            + 'static,
    {
        self.add_tool(ToolRegistration::streaming(definition, handler, policy));
    }

    /// Register a prompt. The handler receives the string-valued argument
    /// map from `prompts/get`.
    pub fn register_prompt<F, Fut>(&self, definition: Prompt, handler: F)
    where
        F: Fn(HashMap<String, String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<PromptMessage>>> + Send + 'static,
    {
        let handler: PromptHandlerFn = Arc::new(move |arguments| Box::pin(handler(arguments)));
        let mut prompts = self
            .state
            .prompts
            .write()
            .unwrap_or_else(|e| e.into_inner());
        prompts.insert(
            definition.name.clone(),
            Arc::new(PromptRegistration {
                definition,
                handler,
            }),
        );
    }

    /// Register a resource keyed by its uri.
    pub fn register_resource<F, Fut>(&self, definition: Resource, reader: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<ResourceContent>>> + Send + 'static,
    {
        let reader: ResourceReaderFn = Arc::new(move |uri| Box::pin(reader(uri)));
        let mut resources = self
            .state
            .resources
            .write()
            .unwrap_or_else(|e| e.into_inner());
        resources.insert(
            definition.uri.clone(),
            Arc::new(ResourceRegistration { definition, reader }),
        );
    }

    /// Register a resource whose reader yields content fragments lazily.
    pub fn register_streaming_resource<F>(
        &self,
        definition: Resource,
        reader: F,
        policy: CancelPolicy,
    ) where
        F: Fn(String) -> BoxStream<'static, Result<ResourceContent>> + Send + Sync + 'static,
    {
        let reader: ResourceReaderFn =
            Arc::new(move |uri| Box::pin(drive_stream(reader(uri), policy)));
        let mut resources = self
            .state
            .resources
            .write()
            .unwrap_or_else(|e| e.into_inner());
        resources.insert(
            definition.uri.clone(),
            Arc::new(ResourceRegistration { definition, reader }),
        );
    }

    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.endpoint.send_notification(method, params).await
    }

    pub async fn notify_tools_changed(&self) -> Result<()> {
        self.send_notification(notifications::TOOLS_LIST_CHANGED, None)
            .await
    }

    pub async fn notify_prompts_changed(&self) -> Result<()> {
        self.send_notification(notifications::PROMPTS_LIST_CHANGED, None)
            .await
    }

    pub async fn notify_resources_changed(&self) -> Result<()> {
        self.send_notification(notifications::RESOURCES_LIST_CHANGED, None)
            .await
    }

    /// Emit `notifications/message` with `{level, data}`.
    pub async fn send_log(&self, level: LogLevel, data: Value) -> Result<()> {
        let params = serde_json::to_value(LogMessageParams { level, data })?;
        self.send_notification(notifications::MESSAGE, Some(params))
            .await
    }
}
