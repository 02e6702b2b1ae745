//! Tool registry and argument handling.
//!
//! A tool is a named action with an ordered list of string parameters.
//! Before a handler runs, the registry checks every required parameter; a
//! missing or empty one short-circuits with
//! `Failure{"<param> is required"}` and the handler is never called.
//!
//! Argument values are lenient: a parameter whose value is not a JSON string
//! reads as absent. For a required parameter that means "is required"; for an
//! optional one the value is silently dropped.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::RegistrationError;
use crate::mcp::result::InvocationResult;

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ParameterSpec {
    /// A parameter that must be present and non-empty.
    #[must_use]
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }

    /// A parameter that may be omitted.
    #[must_use]
    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
        }
    }
}

/// A tool as advertised to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl Tool {
    /// Creates a tool with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// JSON Schema for the tool's input, as sent in `tools/list`.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({ "type": "string", "description": p.description }),
                )
            })
            .collect();

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// The `tools/list` entry for this tool.
    #[must_use]
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// Checks required parameters, returning the failure for the first
    /// missing one in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `"<param> is required"` if a required value is absent, empty
    /// or not a string.
    pub fn check_required(&self, arguments: &Arguments) -> Result<(), String> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .try_for_each(|p| arguments.required(&p.name).map(|_| ()))
    }
}

/// The `arguments` object of a `tools/call` request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    /// Wraps a JSON value. Anything but an object (including `null`) yields
    /// empty arguments.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Returns the string value of `name`, or `None` if absent or not a string.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns the string value of `name`, or `""` if absent or not a string.
    #[must_use]
    pub fn optional(&self, name: &str) -> &str {
        self.string(name).unwrap_or_default()
    }

    /// Returns the non-empty string value of `name`.
    ///
    /// # Errors
    ///
    /// Returns `"<name> is required"` otherwise.
    pub fn required(&self, name: &str) -> Result<&str, String> {
        match self.string(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(format!("{name} is required")),
        }
    }

    /// Whether no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Typed decoding of [`Arguments`] for one tool.
pub trait FromArguments: Sized {
    /// Builds the typed arguments.
    ///
    /// # Errors
    ///
    /// Returns the user-facing failure message.
    fn from_arguments(arguments: &Arguments) -> Result<Self, String>;
}

/// Executes a tool.
///
/// Handlers never fail at the protocol level: every outcome, including a
/// collaborator error, is an [`InvocationResult`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with already-checked arguments.
    async fn call(&self, arguments: &Arguments) -> InvocationResult;
}

struct ToolEntry {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Holds tools by name, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolEntry>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::DuplicateTool`] if the name is taken.
    pub fn register(
        &mut self,
        tool: Tool,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistrationError> {
        if self.tools.contains_key(&tool.name) {
            return Err(RegistrationError::DuplicateTool { name: tool.name });
        }
        tracing::debug!(tool = %tool.name, "registered tool");
        self.tools
            .insert(tool.name.clone(), ToolEntry { tool, handler });
        Ok(())
    }

    /// Looks up a tool descriptor.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name).map(|entry| &entry.tool)
    }

    /// Tools in registration order.
    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values().map(|entry| &entry.tool)
    }

    /// Validates and runs a tool.
    ///
    /// Unknown names and missing required arguments come back as
    /// [`InvocationResult::Failure`], never as protocol errors.
    pub async fn dispatch(&self, name: &str, arguments: &Arguments) -> InvocationResult {
        let Some(entry) = self.tools.get(name) else {
            tracing::warn!(tool = name, "unknown tool");
            return InvocationResult::failure(format!("unknown tool: {name}"));
        };

        if let Err(message) = entry.tool.check_required(arguments) {
            tracing::debug!(tool = name, %message, "tool arguments rejected");
            return InvocationResult::failure(message);
        }

        let result = entry.handler.call(arguments).await;
        if result.is_success() {
            tracing::info!(tool = name, "tool succeeded");
        } else {
            tracing::warn!(tool = name, error = result.message(), "tool failed");
        }
        result
    }
}
