//! EC2 resource handlers.
//!
//! The JSON produced here is shaped for an AI reader: a compact list with
//! per-state and per-type counts, and a detail view with a friendly name and
//! environment pulled from tags.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::infra::{InfraClient, InfraError, InfraResource};
use crate::mcp::resources::{Placeholders, ResourceContents, ResourceError, ResourceHandler};

/// URI of the instance list.
pub const INSTANCES_URI: &str = "aws://ec2/instances";

/// URI template of a single instance.
pub const INSTANCE_TEMPLATE: &str = "aws://ec2/instances/{instanceId}";

/// MIME type of every EC2 resource.
pub const MIME_TYPE: &str = "application/json";

#[derive(Debug, Serialize)]
struct InstanceSummary<'a> {
    id: &'a str,
    state: &'a str,
    #[serde(rename = "type")]
    instance_type: Option<&'a Value>,
    region: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_ip: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_ip: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct InstanceList<'a> {
    total_instances: usize,
    instances: Vec<InstanceSummary<'a>>,
    summary_by_state: BTreeMap<&'a str, usize>,
    summary_by_type: BTreeMap<&'a str, usize>,
}

impl<'a> InstanceList<'a> {
    fn from_resources(resources: &'a [InfraResource]) -> Self {
        let mut summary_by_state = BTreeMap::new();
        let mut summary_by_type = BTreeMap::new();

        let instances = resources
            .iter()
            .map(|instance| {
                *summary_by_state.entry(instance.state.as_str()).or_insert(0) += 1;
                if let Some(kind) = instance.detail_str("instanceType") {
                    *summary_by_type.entry(kind).or_insert(0) += 1;
                }

                InstanceSummary {
                    id: &instance.id,
                    state: &instance.state,
                    instance_type: instance.details.get("instanceType"),
                    region: &instance.region,
                    name: instance.tags.get("Name").map(String::as_str),
                    public_ip: instance.details.get("publicIpAddress"),
                    private_ip: instance.details.get("privateIpAddress"),
                }
            })
            .collect();

        Self {
            total_instances: resources.len(),
            instances,
            summary_by_state,
            summary_by_type,
        }
    }
}

#[derive(Debug, Serialize)]
struct InstanceDetail<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    state: &'a str,
    region: &'a str,
    tags: &'a BTreeMap<String, String>,
    details: &'a Map<String, Value>,
    last_seen: String,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<&'a str>,
}

impl<'a> InstanceDetail<'a> {
    fn from_resource(instance: &'a InfraResource) -> Self {
        Self {
            id: &instance.id,
            kind: &instance.kind,
            state: &instance.state,
            region: &instance.region,
            tags: &instance.tags,
            details: &instance.details,
            last_seen: instance
                .observed_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            name: instance
                .tags
                .get("Name")
                .map_or(instance.id.as_str(), String::as_str),
            environment: instance
                .tags
                .get("Environment")
                .map(String::as_str)
                .filter(|env| !env.is_empty()),
        }
    }
}

fn json_contents(uri: &str, body: &impl Serialize) -> Result<Vec<ResourceContents>, ResourceError> {
    let text = serde_json::to_string(body)
        .map_err(|e| ResourceError::Internal(format!("failed to encode resource: {e}")))?;

    Ok(vec![ResourceContents {
        uri: uri.to_string(),
        mime_type: MIME_TYPE.to_string(),
        text,
    }])
}

/// Serves [`INSTANCES_URI`].
pub struct InstanceListResource {
    client: Arc<dyn InfraClient>,
}

impl InstanceListResource {
    /// Creates the handler.
    #[must_use]
    pub fn new(client: Arc<dyn InfraClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for InstanceListResource {
    async fn read(
        &self,
        uri: &str,
        _placeholders: &Placeholders,
    ) -> Result<Vec<ResourceContents>, ResourceError> {
        let instances = self.client.list().await.map_err(|e| {
            ResourceError::Internal(format!("failed to list EC2 instances: {e}"))
        })?;
        tracing::info!(count = instances.len(), "listed EC2 instances");

        json_contents(uri, &InstanceList::from_resources(&instances))
    }
}

/// Serves [`INSTANCE_TEMPLATE`].
pub struct InstanceDetailResource {
    client: Arc<dyn InfraClient>,
}

impl InstanceDetailResource {
    /// Creates the handler.
    #[must_use]
    pub fn new(client: Arc<dyn InfraClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceHandler for InstanceDetailResource {
    async fn read(
        &self,
        uri: &str,
        placeholders: &Placeholders,
    ) -> Result<Vec<ResourceContents>, ResourceError> {
        let instance_id = placeholders
            .get("instanceId")
            .ok_or_else(|| ResourceError::Internal("instanceId placeholder missing".to_string()))?;

        let instance = self.client.get(instance_id).await.map_err(|e| match e {
            InfraError::NotFound(_) => ResourceError::NotFound(e.to_string()),
            InfraError::Provider(_) => {
                ResourceError::Internal(format!("failed to get EC2 instance: {e}"))
            }
        })?;

        json_contents(uri, &InstanceDetail::from_resource(&instance))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn instance(id: &str, state: &str, kind: &str, tags: &[(&str, &str)]) -> InfraResource {
        let mut details = Map::new();
        details.insert("instanceType".to_string(), json!(kind));
        InfraResource {
            id: id.to_string(),
            kind: "ec2-instance".to_string(),
            region: "us-west-2".to_string(),
            state: state.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            details,
            observed_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn empty_list_starts_with_total() {
        let text = serde_json::to_string(&InstanceList::from_resources(&[])).unwrap();
        assert_eq!(
            text,
            r#"{"total_instances":0,"instances":[],"summary_by_state":{},"summary_by_type":{}}"#
        );
    }

    #[test]
    fn list_counts_by_state_and_type() {
        let mut with_ip = instance("i-2", "stopped", "t3.micro", &[]);
        with_ip
            .details
            .insert("privateIpAddress".to_string(), json!("10.0.0.7"));
        let resources = vec![
            instance("i-1", "running", "t3.micro", &[("Name", "web")]),
            with_ip,
            instance("i-3", "running", "m5.large", &[]),
        ];

        let value = serde_json::to_value(InstanceList::from_resources(&resources)).unwrap();
        assert_eq!(value["total_instances"], 3);
        assert_eq!(value["summary_by_state"], json!({"running": 2, "stopped": 1}));
        assert_eq!(value["summary_by_type"], json!({"m5.large": 1, "t3.micro": 2}));
        assert_eq!(value["instances"][0]["name"], "web");
        assert_eq!(value["instances"][0]["type"], "t3.micro");
        assert!(value["instances"][0].get("private_ip").is_none());
        assert_eq!(value["instances"][1]["private_ip"], "10.0.0.7");
    }

    #[test]
    fn detail_falls_back_to_id_for_name() {
        let resource = instance("i-9", "running", "t3.micro", &[("Environment", "prod")]);
        let value = serde_json::to_value(InstanceDetail::from_resource(&resource)).unwrap();
        assert_eq!(value["name"], "i-9");
        assert_eq!(value["environment"], "prod");
        assert_eq!(value["type"], "ec2-instance");
        assert_eq!(value["last_seen"], "2026-01-02T03:04:05Z");
        assert_eq!(value["details"]["instanceType"], "t3.micro");
    }

    #[test]
    fn detail_uses_name_tag_and_omits_missing_environment() {
        let resource = instance("i-9", "running", "t3.micro", &[("Name", "db")]);
        let value = serde_json::to_value(InstanceDetail::from_resource(&resource)).unwrap();
        assert_eq!(value["name"], "db");
        assert!(value.get("environment").is_none());
    }
}
