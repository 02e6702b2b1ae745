//! aws-infra-mcp: MCP server exposing cloud infrastructure to AI agents
//!
//! An agent connects over stdio and speaks JSON-RPC 2.0. It can:
//!
//! - **Read resources**: the EC2 instance list and per-instance details
//! - **Call tools**: create, start, stop and terminate instances
//!
//! Handlers never touch a cloud SDK directly; they go through the
//! [`infra::InfraClient`] boundary.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`infra`]: Provider boundary and the in-memory fleet
//! - [`mcp`]: Protocol, registries, dispatcher and transport loop
//! - [`ec2`]: EC2 resource and tool handlers

pub mod config;
pub mod ec2;
pub mod error;
pub mod infra;
pub mod mcp;
