//! In-process EC2 fleet.
//!
//! Backs the binary when no real provider is wired in, and the test-suite.
//! Instances follow the usual EC2 lifecycle:
//!
//! ```text
//! create ──▶ pending ──▶ running ◀──▶ stopped
//!                            │           │
//!                            └──▶ terminated ◀──┘
//! ```
//!
//! `observed_at` only changes when an instance is mutated, so repeated reads
//! of unchanged state are byte-identical.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::{json, Map};
use tokio::sync::Mutex;

use super::{CreateInstanceParams, InfraClient, InfraError, InfraResource};

const KIND: &str = "ec2-instance";

/// An [`InfraClient`] holding instances in memory.
pub struct InMemoryFleet {
    region: String,
    instances: Mutex<IndexMap<String, InfraResource>>,
}

impl InMemoryFleet {
    /// Creates an empty fleet reporting the given region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            instances: Mutex::new(IndexMap::new()),
        }
    }

    /// Inserts a pre-built record, replacing any instance with the same ID.
    pub async fn insert(&self, resource: InfraResource) {
        self.instances
            .lock()
            .await
            .insert(resource.id.clone(), resource);
    }

    fn new_instance_id() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        format!("i-{}", &hex[..17])
    }

    async fn transition(
        &self,
        id: &str,
        apply: impl FnOnce(&str) -> Result<&'static str, String> + Send,
    ) -> Result<(), InfraError> {
        let mut instances = self.instances.lock().await;
        let instance = instances
            .get_mut(id)
            .ok_or_else(|| InfraError::NotFound(id.to_string()))?;

        let next = apply(&instance.state).map_err(InfraError::Provider)?;
        tracing::debug!(instance_id = id, from = %instance.state, to = next, "instance transition");
        instance.state = next.to_string();
        instance.observed_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl InfraClient for InMemoryFleet {
    async fn list(&self) -> Result<Vec<InfraResource>, InfraError> {
        Ok(self.instances.lock().await.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<InfraResource, InfraError> {
        self.instances
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| InfraError::NotFound(id.to_string()))
    }

    async fn create(&self, params: CreateInstanceParams) -> Result<InfraResource, InfraError> {
        if !params.image_id.starts_with("ami-") {
            return Err(InfraError::Provider(format!(
                "InvalidAMIID.Malformed: invalid id: \"{}\"",
                params.image_id
            )));
        }

        let mut tags = BTreeMap::new();
        if !params.name.is_empty() {
            tags.insert("Name".to_string(), params.name.clone());
        }

        let mut details = Map::new();
        details.insert("instanceType".to_string(), json!(params.instance_type));
        details.insert("imageId".to_string(), json!(params.image_id));
        for (key, value) in [
            ("keyName", &params.key_name),
            ("securityGroupId", &params.security_group_id),
            ("subnetId", &params.subnet_id),
        ] {
            if !value.is_empty() {
                details.insert(key.to_string(), json!(value));
            }
        }

        let resource = InfraResource {
            id: Self::new_instance_id(),
            kind: KIND.to_string(),
            region: self.region.clone(),
            state: "pending".to_string(),
            tags,
            details,
            observed_at: Utc::now(),
        };

        tracing::info!(instance_id = %resource.id, image_id = %params.image_id, "launched instance");
        self.insert(resource.clone()).await;
        Ok(resource)
    }

    async fn start(&self, id: &str) -> Result<(), InfraError> {
        self.transition(id, |state| match state {
            "terminated" => Err(format!(
                "IncorrectInstanceState: instance {id} is terminated and cannot be started"
            )),
            _ => Ok("running"),
        })
        .await
    }

    async fn stop(&self, id: &str) -> Result<(), InfraError> {
        self.transition(id, |state| match state {
            "terminated" => Err(format!(
                "IncorrectInstanceState: instance {id} is terminated and cannot be stopped"
            )),
            _ => Ok("stopped"),
        })
        .await
    }

    async fn terminate(&self, id: &str) -> Result<(), InfraError> {
        self.transition(id, |_| Ok("terminated")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch_params() -> CreateInstanceParams {
        CreateInstanceParams {
            image_id: "ami-12345678".to_string(),
            instance_type: "t3.micro".to_string(),
            name: "web-1".to_string(),
            ..CreateInstanceParams::default()
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let fleet = InMemoryFleet::new("us-west-2");
        let created = fleet.create(launch_params()).await.unwrap();

        assert!(created.id.starts_with("i-"));
        assert_eq!(created.id.len(), 19);
        assert_eq!(created.state, "pending");
        assert_eq!(created.region, "us-west-2");
        assert_eq!(created.tags.get("Name").map(String::as_str), Some("web-1"));
        assert_eq!(created.detail_str("instanceType"), Some("t3.micro"));
        assert!(created.details.get("keyName").is_none());

        let fetched = fleet.get(&created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_rejects_malformed_image() {
        let fleet = InMemoryFleet::new("us-west-2");
        let params = CreateInstanceParams {
            image_id: "bogus".to_string(),
            ..launch_params()
        };
        let err = fleet.create(params).await.unwrap_err();
        assert!(err.to_string().contains("InvalidAMIID.Malformed"));
        assert!(fleet.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let fleet = InMemoryFleet::new("us-west-2");
        let id = fleet.create(launch_params()).await.unwrap().id;

        fleet.stop(&id).await.unwrap();
        assert_eq!(fleet.get(&id).await.unwrap().state, "stopped");

        fleet.start(&id).await.unwrap();
        assert_eq!(fleet.get(&id).await.unwrap().state, "running");

        fleet.terminate(&id).await.unwrap();
        assert_eq!(fleet.get(&id).await.unwrap().state, "terminated");

        let err = fleet.start(&id).await.unwrap_err();
        assert!(matches!(err, InfraError::Provider(_)));
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let fleet = InMemoryFleet::new("us-west-2");
        assert_eq!(
            fleet.get("i-missing").await.unwrap_err(),
            InfraError::NotFound("i-missing".to_string())
        );
        assert!(matches!(
            fleet.stop("i-missing").await,
            Err(InfraError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_preserves_launch_order() {
        let fleet = InMemoryFleet::new("us-west-2");
        let first = fleet.create(launch_params()).await.unwrap().id;
        let second = fleet.create(launch_params()).await.unwrap().id;

        let ids: Vec<_> = fleet.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}
