//! Normalised outcome of a tool invocation.
//!
//! Every tool handler returns an [`InvocationResult`]. It is encoded as a
//! JSON object inside a text content block, so the calling agent always sees
//! `success`, a human-readable message and the time the result was produced:
//!
//! ```json
//! {"success": true,  "message": "...", "timestamp": "2026-01-01T00:00:00Z", "instanceId": "..."}
//! {"success": false, "error":   "...", "timestamp": "2026-01-01T00:00:00Z"}
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Success or failure of a tool, stamped with its generation time.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    /// The action was carried out.
    Success {
        /// What happened.
        message: String,
        /// Extra fields merged into the encoded object.
        data: Map<String, Value>,
        /// When the result was produced.
        timestamp: DateTime<Utc>,
    },
    /// The action was rejected or failed.
    Failure {
        /// Why it failed.
        message: String,
        /// When the result was produced.
        timestamp: DateTime<Utc>,
    },
}

impl InvocationResult {
    /// Creates a success result stamped with the current time.
    #[must_use]
    pub fn success(message: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::Success {
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failure result stamped with the current time.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Returns `true` for [`InvocationResult::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the message of either variant.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    /// Returns the generation timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Success { timestamp, .. } | Self::Failure { timestamp, .. } => *timestamp,
        }
    }

    /// Encodes the result as the pretty-printed JSON carried in a text block.
    #[must_use]
    pub fn to_text(&self) -> String {
        // Serialising a map of strings and JSON values cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Serialize for InvocationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success {
                message,
                data,
                timestamp,
            } => {
                let mut map = serializer.serialize_map(Some(3 + data.len()))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("message", message)?;
                map.serialize_entry("timestamp", &format_timestamp(timestamp))?;
                for (key, value) in data {
                    if !matches!(key.as_str(), "success" | "message" | "timestamp") {
                        map.serialize_entry(key, value)?;
                    }
                }
                map.end()
            }
            Self::Failure { message, timestamp } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", message)?;
                map.serialize_entry("timestamp", &format_timestamp(timestamp))?;
                map.end()
            }
        }
    }
}
