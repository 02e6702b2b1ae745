//! Model Context Protocol (MCP) server implementation.
//!
//! Exposes read-only **resources** (addressed by URI) and invokable **tools**
//! (addressed by name) to an AI agent over newline-delimited JSON-RPC 2.0.
//!
//! # Architecture
//!
//! ```text
//!   ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐
//!   │  Transport  │───▶│ Dispatcher  │───▶│ ResourceRegistry │
//!   │   (lines)   │◀───│             │───▶│ ToolRegistry     │
//!   └─────────────┘    └─────────────┘    └──────────────────┘
//!          ▲                                        │
//!          │                                        ▼
//!      McpServer                          handlers ─▶ InfraClient
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod dispatcher;
pub mod protocol;
pub mod resources;
pub mod result;
pub mod server;
pub mod tools;
pub mod transport;

pub use dispatcher::{Dispatcher, ServerInfo};
pub use protocol::{JsonRpcErrorData, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use resources::{ResourceRegistry, UriTemplate};
pub use result::InvocationResult;
pub use server::{McpServer, ServerState, Shutdown, ShutdownTrigger};
pub use tools::{Arguments, ParameterSpec, Tool, ToolRegistry};
pub use transport::{LineTransport, StdioTransport};
