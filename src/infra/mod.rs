//! Infrastructure provider boundary.
//!
//! Resource and tool handlers never talk to a cloud SDK directly. They hold an
//! `Arc<dyn InfraClient>` and go through the narrow operations below, which
//! return normalised [`InfraResource`] records.

pub mod memory;

pub use memory::InMemoryFleet;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors reported by an [`InfraClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InfraError {
    /// No object with this ID exists.
    #[error("instance {0} not found")]
    NotFound(String),

    /// The provider rejected or failed the call.
    #[error("{0}")]
    Provider(String),
}

/// A normalised infrastructure object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraResource {
    /// Provider identifier (e.g. `i-0abc...`).
    pub id: String,
    /// Object kind, e.g. `ec2-instance`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Region the object lives in.
    pub region: String,
    /// Lifecycle state as reported by the provider.
    pub state: String,
    /// Key/value tags. Sorted for stable output.
    pub tags: BTreeMap<String, String>,
    /// Provider-specific attributes (`instanceType`, `publicIpAddress`, ...).
    pub details: Map<String, Value>,
    /// When this record was last refreshed from the provider.
    pub observed_at: DateTime<Utc>,
}

impl InfraResource {
    /// Returns a string-valued detail, if present.
    #[must_use]
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }
}

/// Launch parameters for [`InfraClient::create`].
///
/// Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateInstanceParams {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub security_group_id: String,
    pub subnet_id: String,
    pub name: String,
}

/// The operations handlers may perform against the provider.
///
/// Timeouts and retries are the implementation's concern.
#[async_trait]
pub trait InfraClient: Send + Sync {
    /// Lists every instance in the configured region.
    async fn list(&self) -> Result<Vec<InfraResource>, InfraError>;

    /// Fetches one instance, failing with [`InfraError::NotFound`] if unknown.
    async fn get(&self, id: &str) -> Result<InfraResource, InfraError>;

    /// Launches a new instance.
    async fn create(&self, params: CreateInstanceParams) -> Result<InfraResource, InfraError>;

    /// Starts a stopped instance.
    async fn start(&self, id: &str) -> Result<(), InfraError>;

    /// Stops a running instance.
    async fn stop(&self, id: &str) -> Result<(), InfraError>;

    /// Terminates an instance.
    async fn terminate(&self, id: &str) -> Result<(), InfraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_instance() {
        let err = InfraError::NotFound("i-12345".to_string());
        assert_eq!(err.to_string(), "instance i-12345 not found");
    }

    #[test]
    fn provider_message_is_verbatim() {
        let err = InfraError::Provider("InvalidAMIID.Malformed".to_string());
        assert_eq!(err.to_string(), "InvalidAMIID.Malformed");
    }

    #[test]
    fn resource_serialises_type_and_observed_at() {
        let resource = InfraResource {
            id: "i-1".to_string(),
            kind: "ec2-instance".to_string(),
            region: "us-west-2".to_string(),
            state: "running".to_string(),
            tags: BTreeMap::new(),
            details: Map::new(),
            observed_at: Utc::now(),
        };
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["type"], "ec2-instance");
        assert!(value.get("observedAt").is_some());
    }
}
