//! MCP client session
//!
//! [`ClientSession`] layers the MCP handshake and request wrappers over an
//! [`Endpoint`]. The session walks a four-state machine:
//!
//! ```text
//! disconnected --start()--> initializing --initialize()--> ready --close()--> closed
//! ```
//!
//! Every MCP wrapper refuses with a session error before `ready`. Wrapper
//! results are projected out of the raw response (`result.tools`,
//! `result.content`, ...); peers that omit a list field yield an empty
//! vector.
//!
//! [`ClientSession::call_tools`] fans out N `tools/call` requests
//! concurrently and returns their outcomes in input order, optionally
//! cancelling the remainder after the first failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::protocol::{
    ClientCapabilities, Content, Implementation, InitializeParams, InitializeResult,
    PROTOCOL_VERSION, Prompt, PromptMessage, Resource, ResourceContent, Tool, notifications,
};
use crate::transport::Transport;

/// Client session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    Disconnected = 0,
    Initializing = 1,
    Ready = 2,
    Closed = 3,
}

impl From<u8> for ClientState {
    fn from(value: u8) -> Self {
        match value {
            0 => ClientState::Disconnected,
            1 => ClientState::Initializing,
            2 => ClientState::Ready,
            _ => ClientState::Closed,
        }
    }
}

/// One entry of a parallel tool fan-out.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// MCP client over an endpoint.
pub struct ClientSession {
    endpoint: Endpoint,
    state: AtomicU8,
    server: RwLock<Option<InitializeResult>>,
}

impl ClientSession {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint: Endpoint::new(transport),
            state: AtomicU8::new(ClientState::Disconnected as u8),
            server: RwLock::new(None),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ClientState {
        ClientState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ClientState::Ready
    }

    /// Server handshake data, available once `ready`.
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.server
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn transition(&self, from: ClientState, to: ClientState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Open the transport and move to `initializing`.
    pub async fn start(&self) -> Result<()> {
        if !self.transition(ClientState::Disconnected, ClientState::Initializing) {
            return Err(Error::Session(format!(
                "cannot start from state {:?}",
                self.state()
            )));
        }
        self.endpoint.start().await
    }

    /// Run the `initialize` handshake.
    ///
    /// On success the server handshake data is stored,
    /// `notifications/initialized` is sent, and the session becomes `ready`.
    /// On failure the session moves to `closed`.
    pub async fn initialize(
        &self,
        client_info: Implementation,
        capabilities: ClientCapabilities,
    ) -> Result<InitializeResult> {
        if self.state() != ClientState::Initializing {
            return Err(Error::Session(format!(
                "cannot initialize from state {:?}",
                self.state()
            )));
        }

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities,
            client_info,
        };

        let outcome = async {
            let pending = self
                .endpoint
                .send_request("initialize", Some(serde_json::to_value(&params)?))
                .await?;
            let result = pending.wait().await.map_err(Error::JsonRpc)?;
            let info: InitializeResult = serde_json::from_value(result)?;
            Ok::<_, Error>(info)
        }
        .await;

        let outcome = match outcome {
            Ok(info) => {
                *self.server.write().unwrap_or_else(|e| e.into_inner()) = Some(info.clone());
                self.endpoint
                    .send_notification(notifications::INITIALIZED, None)
                    .await
                    .map(|_| info)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(info) => {
                self.state
                    .store(ClientState::Ready as u8, Ordering::Release);
                tracing::info!(server = %info.server_info.name, "client session ready");
                Ok(info)
            }
            Err(e) => {
                self.state
                    .store(ClientState::Closed as u8, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Close the transport. Every outstanding request fails with
    /// "transport closed".
    pub async fn close(&self) {
        self.endpoint.close().await;
        self.state
            .store(ClientState::Closed as u8, Ordering::Release);
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::Session("client not initialized".to_string()))
        }
    }

    /// Send a raw request and await the result value.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let pending = self.endpoint.send_request(method, params).await?;
        pending.wait().await.map_err(Error::JsonRpc)
    }

    /// Fire a raw notification.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.endpoint.send_notification(method, params).await
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.ensure_ready()?;
        let result = self.request("tools/list", Some(json!({}))).await?;
        project_vec(&result, "tools")
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Vec<Content>> {
        self.ensure_ready()?;
        let params = json!({"name": name, "arguments": arguments});
        let result = self.request("tools/call", Some(params)).await?;
        project_vec(&result, "content")
    }

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        self.ensure_ready()?;
        let result = self.request("prompts/list", Some(json!({}))).await?;
        project_vec(&result, "prompts")
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<Vec<PromptMessage>> {
        self.ensure_ready()?;
        let params = json!({"name": name, "arguments": arguments});
        let result = self.request("prompts/get", Some(params)).await?;
        project_vec(&result, "messages")
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>> {
        self.ensure_ready()?;
        let result = self.request("resources/list", Some(json!({}))).await?;
        project_vec(&result, "resources")
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>> {
        self.ensure_ready()?;
        let result = self
            .request("resources/read", Some(json!({"uri": uri})))
            .await?;
        project_vec(&result, "contents")
    }

    /// Issue N tool calls concurrently and return their outcomes in input
    /// order.
    ///
    /// With `cancel_on_failure`, the first failed call cancels every call
    /// that has not yet resolved; either way the fan-out awaits full
    /// termination before returning.
    pub async fn call_tools(
        &self,
        calls: Vec<ToolCall>,
        cancel_on_failure: bool,
    ) -> Vec<Result<Vec<Content>>> {
        if self.ensure_ready().is_err() {
            return calls
                .iter()
                .map(|_| Err(Error::Session("client not initialized".to_string())))
                .collect();
        }

        let mut slots: Vec<Option<Result<Vec<Content>>>> =
            (0..calls.len()).map(|_| None).collect();
        let mut issued = Vec::new();
        let mut waiters = FuturesUnordered::new();

        for (index, call) in calls.into_iter().enumerate() {
            let params = json!({"name": call.name, "arguments": call.arguments});
            match self.endpoint.send_request("tools/call", Some(params)).await {
                Ok(pending) => {
                    issued.push((index, pending.id().clone()));
                    waiters.push(async move { (index, pending.wait().await) });
                }
                Err(e) => slots[index] = Some(Err(e)),
            }
        }

        let mut cancel_issued = false;
        while let Some((index, outcome)) = waiters.next().await {
            let failed = outcome.is_err();
            slots[index] = Some(match outcome {
                Ok(value) => project_vec(&value, "content"),
                Err(e) => Err(Error::JsonRpc(e)),
            });

            if failed && cancel_on_failure && !cancel_issued {
                cancel_issued = true;
                for (slot, id) in &issued {
                    if slots[*slot].is_none() {
                        self.endpoint.cancel_request(id).await;
                    }
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(Error::Session("request never resolved".to_string())))
            })
            .collect()
    }
}

fn project_vec<T: DeserializeOwned>(result: &Value, field: &str) -> Result<Vec<T>> {
    match result.get(field) {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(Error::from),
    }
}
