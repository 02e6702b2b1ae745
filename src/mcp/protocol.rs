//! JSON-RPC 2.0 message types for MCP protocol.
//!
//! This module defines the envelopes exchanged over the transport.
//!
//! # Message Types
//!
//! - **Request**: A message expecting a response (has `id`)
//! - **Response**: A reply to a request, carrying exactly one of `result` or `error`
//! - **Notification**: A one-way message (no `id`, no response expected)
//!
//! Incoming messages may omit the `jsonrpc` member. When it is present it
//! must be `"2.0"`. Outgoing responses always carry it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Resource-not-found code used by MCP servers.
pub const RESOURCE_NOT_FOUND: i32 = -32002;

/// A JSON-RPC 2.0 request ID.
///
/// Treated as an opaque correlation token and echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
    /// Any other JSON number (fractional or beyond `i64`), kept verbatim.
    OtherNumber(serde_json::Number),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::OtherNumber(n) => write!(f, "{n}"),
        }
    }
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Unique request identifier.
    pub id: RequestId,

    /// The method to invoke.
    pub method: String,

    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A JSON-RPC 2.0 notification message (incoming).
///
/// Notifications do not have an ID and do not expect a response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    /// The notification method.
    pub method: String,

    /// Optional parameters for the notification.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// Server-defined error.
    ServerError(i32),
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(code) => code,
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "parse error",
            Self::InvalidRequest => "invalid request",
            Self::MethodNotFound => "method not found",
            Self::InvalidParams => "invalid params",
            Self::InternalError => "internal error",
            Self::ServerError(_) => "server error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }
}

/// The payload half of a response: exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseBody {
    /// Successful outcome.
    Result(Value),
    /// Protocol-level failure.
    Error(JsonRpcErrorData),
}

/// A JSON-RPC 2.0 response envelope.
///
/// `id` is `None` (serialised as `null`) only when the request could not be
/// decoded far enough to recover its ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: String,

    /// The request ID this response corresponds to.
    pub id: Option<RequestId>,

    /// `result` or `error`.
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            body: ResponseBody::Result(result),
        }
    }

    /// Creates a new error response.
    #[must_use]
    pub fn error(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            body: ResponseBody::Error(error),
        }
    }

    /// Creates a parse error response (ID cannot be determined).
    #[must_use]
    pub fn parse_error() -> Self {
        Self::error(None, JsonRpcErrorData::from_code(ErrorCode::ParseError))
    }

    /// Creates an invalid request error response.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::error(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, message),
        )
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::error(
            Some(id),
            JsonRpcErrorData::with_message(
                ErrorCode::MethodNotFound,
                format!("method not found: {method}"),
            ),
        )
    }

    /// Creates an invalid params error response.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::InvalidParams, message),
        )
    }

    /// Creates a resource not found error response.
    #[must_use]
    pub fn resource_not_found(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::ServerError(RESOURCE_NOT_FOUND), message),
        )
    }

    /// Creates an internal error response.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::InternalError, message),
        )
    }

    /// Returns the result payload, if this is a success response.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Result(value) => Some(value),
            ResponseBody::Error(_) => None,
        }
    }

    /// Returns the error object, if this is an error response.
    #[must_use]
    pub const fn error_data(&self) -> Option<&JsonRpcErrorData> {
        match &self.body {
            ResponseBody::Result(_) => None,
            ResponseBody::Error(err) => Some(err),
        }
    }
}

/// An incoming message that could be either a request or notification.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification (no response expected).
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    /// Returns the method name of this message.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request(req) => &req.method,
            Self::Notification(notif) => &notif.method,
        }
    }

    /// Returns the request ID if this is a request.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Notification(_) => None,
        }
    }
}

/// Parses a JSON line into an incoming message.
///
/// # Errors
///
/// Returns the error response to send back if the JSON is malformed or not a
/// valid message. The ID is preserved whenever it can be recovered.
pub fn parse_message(json: &str) -> Result<IncomingMessage, JsonRpcResponse> {
    let value: Value = serde_json::from_str(json).map_err(|_| JsonRpcResponse::parse_error())?;

    let obj = value
        .as_object()
        .ok_or_else(|| JsonRpcResponse::invalid_request(None, "message must be a JSON object"))?;

    // Recover the ID early so that later failures can still be correlated.
    let id = obj
        .get("id")
        .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok());

    if let Some(version) = obj.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            return Err(JsonRpcResponse::invalid_request(
                id,
                "jsonrpc field must be \"2.0\"",
            ));
        }
    }

    match obj.get("method") {
        Some(Value::String(method)) if !method.is_empty() => {}
        _ => {
            return Err(JsonRpcResponse::invalid_request(
                id,
                "method must be a non-empty string",
            ))
        }
    }

    if obj.contains_key("id") {
        if id.is_none() {
            return Err(JsonRpcResponse::invalid_request(
                None,
                "id must be a string or a number",
            ));
        }
        let request: JsonRpcRequest = serde_json::from_value(value)
            .map_err(|e| JsonRpcResponse::invalid_request(id, e.to_string()))?;
        Ok(IncomingMessage::Request(request))
    } else {
        let notification: JsonRpcNotification = serde_json::from_value(value)
            .map_err(|e| JsonRpcResponse::invalid_request(None, e.to_string()))?;
        Ok(IncomingMessage::Notification(notification))
    }
}
