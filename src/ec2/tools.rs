//! EC2 tool handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::infra::{CreateInstanceParams, InfraClient};
use crate::mcp::result::InvocationResult;
use crate::mcp::tools::{Arguments, FromArguments, ParameterSpec, Tool, ToolHandler};

/// Arguments of `create-ec2-instance`. Optional fields are `""` when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInstanceArgs {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub security_group_id: String,
    pub subnet_id: String,
    pub name: String,
}

impl FromArguments for CreateInstanceArgs {
    fn from_arguments(arguments: &Arguments) -> Result<Self, String> {
        Ok(Self {
            image_id: arguments.required("imageId")?.to_string(),
            instance_type: arguments.required("instanceType")?.to_string(),
            key_name: arguments.optional("keyName").to_string(),
            security_group_id: arguments.optional("securityGroupId").to_string(),
            subnet_id: arguments.optional("subnetId").to_string(),
            name: arguments.optional("name").to_string(),
        })
    }
}

impl From<CreateInstanceArgs> for CreateInstanceParams {
    fn from(args: CreateInstanceArgs) -> Self {
        Self {
            image_id: args.image_id,
            instance_type: args.instance_type,
            key_name: args.key_name,
            security_group_id: args.security_group_id,
            subnet_id: args.subnet_id,
            name: args.name,
        }
    }
}

/// Arguments of the lifecycle tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdArgs {
    pub instance_id: String,
}

impl FromArguments for InstanceIdArgs {
    fn from_arguments(arguments: &Arguments) -> Result<Self, String> {
        Ok(Self {
            instance_id: arguments.required("instanceId")?.to_string(),
        })
    }
}

/// Descriptor of `create-ec2-instance`.
#[must_use]
pub fn create_instance_tool() -> Tool {
    Tool::new("create-ec2-instance", "Create a new EC2 instance")
        .param(ParameterSpec::required(
            "imageId",
            "AMI ID to use for the instance",
        ))
        .param(ParameterSpec::required(
            "instanceType",
            "EC2 instance type (e.g., t2.micro, t3.small)",
        ))
        .param(ParameterSpec::optional(
            "keyName",
            "Name of the key pair to use for SSH access",
        ))
        .param(ParameterSpec::optional(
            "securityGroupId",
            "Security group ID to assign to the instance",
        ))
        .param(ParameterSpec::optional(
            "subnetId",
            "Subnet ID where the instance should be launched",
        ))
        .param(ParameterSpec::optional("name", "Name tag for the instance"))
}

/// Launches an instance.
pub struct CreateInstanceTool {
    client: Arc<dyn InfraClient>,
}

impl CreateInstanceTool {
    /// Creates the handler.
    #[must_use]
    pub fn new(client: Arc<dyn InfraClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for CreateInstanceTool {
    async fn call(&self, arguments: &Arguments) -> InvocationResult {
        let args = match CreateInstanceArgs::from_arguments(arguments) {
            Ok(args) => args,
            Err(message) => return InvocationResult::failure(message),
        };

        match self.client.create(args.into()).await {
            Ok(instance) => {
                let mut data = Map::new();
                data.insert("instanceId".to_string(), json!(instance.id));
                data.insert("state".to_string(), json!(instance.state));
                data.insert(
                    "instanceType".to_string(),
                    instance
                        .details
                        .get("instanceType")
                        .cloned()
                        .unwrap_or(Value::Null),
                );
                InvocationResult::success("EC2 instance created successfully", data)
            }
            Err(e) => InvocationResult::failure(format!("failed to create EC2 instance: {e}")),
        }
    }
}

/// A state change on an existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Stop,
    Terminate,
}

impl LifecycleAction {
    /// The `action` value reported back, and the verb in failure messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Terminate => "terminate",
        }
    }

    const fn noun(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Terminate => "termination",
        }
    }

    /// Name the tool is registered under.
    #[must_use]
    pub const fn tool_name(self) -> &'static str {
        match self {
            Self::Start => "start-ec2-instance",
            Self::Stop => "stop-ec2-instance",
            Self::Terminate => "terminate-ec2-instance",
        }
    }

    /// Descriptor of the tool for this action.
    #[must_use]
    pub fn tool(self) -> Tool {
        let description = match self {
            Self::Start => "Start a stopped EC2 instance",
            Self::Stop => "Stop a running EC2 instance",
            Self::Terminate => "Terminate an EC2 instance (permanent deletion)",
        };
        Tool::new(self.tool_name(), description).param(ParameterSpec::required(
            "instanceId",
            format!("EC2 instance ID to {}", self.verb()),
        ))
    }
}

/// Starts, stops or terminates an instance.
pub struct LifecycleTool {
    client: Arc<dyn InfraClient>,
    action: LifecycleAction,
}

impl LifecycleTool {
    /// Creates the handler for one action.
    #[must_use]
    pub fn new(client: Arc<dyn InfraClient>, action: LifecycleAction) -> Self {
        Self { client, action }
    }
}

#[async_trait]
impl ToolHandler for LifecycleTool {
    async fn call(&self, arguments: &Arguments) -> InvocationResult {
        let InstanceIdArgs { instance_id } = match InstanceIdArgs::from_arguments(arguments) {
            Ok(args) => args,
            Err(message) => return InvocationResult::failure(message),
        };

        let outcome = match self.action {
            LifecycleAction::Start => self.client.start(&instance_id).await,
            LifecycleAction::Stop => self.client.stop(&instance_id).await,
            LifecycleAction::Terminate => self.client.terminate(&instance_id).await,
        };

        if let Err(e) = outcome {
            return InvocationResult::failure(format!(
                "failed to {} EC2 instance: {e}",
                self.action.verb()
            ));
        }

        let mut data = Map::new();
        data.insert("instanceId".to_string(), json!(instance_id));
        data.insert("action".to_string(), json!(self.action.verb()));
        InvocationResult::success(
            format!("EC2 instance {} initiated successfully", self.action.noun()),
            data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryFleet;

    fn fleet() -> Arc<InMemoryFleet> {
        Arc::new(InMemoryFleet::new("us-west-2"))
    }

    fn args(value: Value) -> Arguments {
        Arguments::from_value(value)
    }

    #[test]
    fn create_args_drop_non_string_optionals() {
        let parsed = CreateInstanceArgs::from_arguments(&args(json!({
            "imageId": "ami-1",
            "instanceType": "t3.micro",
            "keyName": 42,
            "name": "web",
        })))
        .unwrap();
        assert_eq!(parsed.key_name, "");
        assert_eq!(parsed.name, "web");
        assert_eq!(parsed.subnet_id, "");
    }

    #[test]
    fn instance_id_is_required() {
        let err = InstanceIdArgs::from_arguments(&args(json!({"instanceId": ""}))).unwrap_err();
        assert_eq!(err, "instanceId is required");
    }

    #[test]
    fn lifecycle_descriptors() {
        let tool = LifecycleAction::Terminate.tool();
        assert_eq!(tool.name, "terminate-ec2-instance");
        assert_eq!(tool.parameters.len(), 1);
        assert!(tool.parameters[0].required);
        assert_eq!(create_instance_tool().parameters.len(), 6);
    }

    #[tokio::test]
    async fn create_reports_id_state_and_type() {
        let tool = CreateInstanceTool::new(fleet());
        let result = tool
            .call(&args(json!({"imageId": "ami-1", "instanceType": "t3.micro"})))
            .await;

        assert!(result.is_success());
        assert_eq!(result.message(), "EC2 instance created successfully");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["state"], "pending");
        assert_eq!(value["instanceType"], "t3.micro");
        assert!(value["instanceId"].as_str().unwrap().starts_with("i-"));
    }

    #[tokio::test]
    async fn create_failure_wraps_provider_error() {
        let tool = CreateInstanceTool::new(fleet());
        let result = tool
            .call(&args(json!({"imageId": "bogus", "instanceType": "t3.micro"})))
            .await;

        assert!(!result.is_success());
        assert!(result
            .message()
            .starts_with("failed to create EC2 instance: "));
    }

    #[tokio::test]
    async fn terminate_reports_termination() {
        let fleet = fleet();
        let created = fleet
            .create(CreateInstanceParams {
                image_id: "ami-1".to_string(),
                instance_type: "t3.micro".to_string(),
                ..CreateInstanceParams::default()
            })
            .await
            .unwrap();

        let tool = LifecycleTool::new(fleet.clone(), LifecycleAction::Terminate);
        let result = tool.call(&args(json!({"instanceId": created.id}))).await;

        assert_eq!(result.message(), "EC2 instance termination initiated successfully");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["action"], "terminate");
        assert_eq!(fleet.get(&created.id).await.unwrap().state, "terminated");
    }

    #[tokio::test]
    async fn unknown_instance_is_a_failure() {
        let tool = LifecycleTool::new(fleet(), LifecycleAction::Stop);
        let result = tool.call(&args(json!({"instanceId": "i-404"}))).await;
        assert_eq!(
            result.message(),
            "failed to stop EC2 instance: instance i-404 not found"
        );
    }
}
