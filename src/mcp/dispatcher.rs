//! Request dispatcher.
//!
//! Each line goes through `decode → route → invoke → encode` on its own;
//! nothing carries over between requests apart from the read-only
//! registries.
//!
//! Resource and tool failures are reported differently on purpose:
//!
//! - A resource that cannot be resolved or read is a **protocol error**.
//! - A tool that cannot run (unknown name, missing argument, provider
//!   rejection) is a **successful response** whose payload is an
//!   [`InvocationResult::Failure`](crate::mcp::result::InvocationResult).

use serde::Deserialize;
use serde_json::{json, Value};

use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId, MCP_PROTOCOL_VERSION,
};
use crate::mcp::resources::{ResourceError, ResourceRegistry};
use crate::mcp::tools::{Arguments, ToolRegistry};

/// Server information for initialisation response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for resources/read request.
#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

/// Parameters for tools/call request.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Routes decoded requests to the resource and tool registries.
pub struct Dispatcher {
    info: ServerInfo,
    resources: ResourceRegistry,
    tools: ToolRegistry,
}

impl Dispatcher {
    /// Creates a dispatcher over fully populated registries.
    #[must_use]
    pub const fn new(info: ServerInfo, resources: ResourceRegistry, tools: ToolRegistry) -> Self {
        Self {
            info,
            resources,
            tools,
        }
    }

    /// The resource registry.
    #[must_use]
    pub const fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// The tool registry.
    #[must_use]
    pub const fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handles one line as read off the wire.
    ///
    /// Bytes that are not UTF-8 get a parse error with a `null` ID, like any
    /// other undecodable line.
    pub async fn handle_bytes(&self, line: &[u8]) -> Option<JsonRpcResponse> {
        match std::str::from_utf8(line) {
            Ok(text) => self.handle_line(text).await,
            Err(e) => {
                tracing::warn!(error = %e, "rejected line that is not UTF-8");
                Some(JsonRpcResponse::parse_error())
            }
        }
    }

    /// Handles one raw line.
    ///
    /// Returns `None` for notifications; every other line, including
    /// malformed ones, yields exactly one response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => Some(self.handle_request(req).await),
            Ok(IncomingMessage::Notification(notif)) => {
                Self::handle_notification(&notif);
                None
            }
            Err(error) => {
                tracing::warn!(id = ?error.id, "rejected malformed message");
                Some(error)
            }
        }
    }

    /// Handles a decoded request.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(id = %req.id, method = %req.method, "dispatching request");

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id),
            "ping" => JsonRpcResponse::success(req.id, json!({})),
            "resources/list" => self.handle_resources_list(req.id),
            "resources/templates/list" => self.handle_templates_list(req.id),
            "resources/read" => self.handle_resources_read(req).await,
            "tools/list" => self.handle_tools_list(req.id),
            "tools/call" => self.handle_tools_call(req).await,
            _ => {
                tracing::warn!(id = %req.id, method = %req.method, "method not found");
                JsonRpcResponse::method_not_found(req.id, &req.method)
            }
        }
    }

    fn handle_notification(notif: &JsonRpcNotification) {
        tracing::debug!(method = %notif.method, "notification received");
    }

    fn handle_initialize(&self, id: RequestId) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {
                    "resources": {},
                    "tools": {},
                },
                "serverInfo": self.info,
            }),
        )
    }

    fn handle_resources_list(&self, id: RequestId) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "resources": self.resources.resources() }))
    }

    fn handle_templates_list(&self, id: RequestId) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({ "resourceTemplates": self.resources.templates() }),
        )
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let tools: Vec<Value> = self.tools.tools().map(|tool| tool.definition()).collect();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_resources_read(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let params: ResourceReadParams = match decode_params(&req) {
            Ok(params) => params,
            Err(response) => return response,
        };

        let Some(resolved) = self.resources.resolve(&params.uri) else {
            tracing::warn!(uri = %params.uri, "resource not found");
            return JsonRpcResponse::resource_not_found(
                req.id,
                format!("resource not found: {}", params.uri),
            );
        };

        match resolved
            .handler
            .read(&params.uri, &resolved.placeholders)
            .await
        {
            Ok(contents) => JsonRpcResponse::success(req.id, json!({ "contents": contents })),
            Err(ResourceError::NotFound(message)) => {
                tracing::warn!(uri = %params.uri, %message, "resource read found nothing");
                JsonRpcResponse::resource_not_found(req.id, message)
            }
            Err(ResourceError::Internal(message)) => {
                tracing::error!(uri = %params.uri, %message, "resource read failed");
                JsonRpcResponse::internal_error(req.id, message)
            }
        }
    }

    async fn handle_tools_call(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let params: ToolCallParams = match decode_params(&req) {
            Ok(params) => params,
            Err(response) => return response,
        };

        let arguments = Arguments::from_value(params.arguments);
        let result = self.tools.dispatch(&params.name, &arguments).await;

        JsonRpcResponse::success(
            req.id,
            json!({
                "content": [{ "type": "text", "text": result.to_text() }],
            }),
        )
    }
}

/// Decodes `req.params` into `T`, or builds the invalid-params response.
fn decode_params<T: serde::de::DeserializeOwned>(
    req: &JsonRpcRequest,
) -> Result<T, JsonRpcResponse> {
    let params = req
        .params
        .clone()
        .ok_or_else(|| JsonRpcResponse::invalid_params(req.id.clone(), "missing params"))?;

    serde_json::from_value(params).map_err(|e| {
        JsonRpcResponse::invalid_params(req.id.clone(), format!("invalid params: {e}"))
    })
}
