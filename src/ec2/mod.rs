//! EC2 resources and tools.
//!
//! | Kind     | Address                            |
//! |----------|------------------------------------|
//! | resource | `aws://ec2/instances`              |
//! | template | `aws://ec2/instances/{instanceId}` |
//! | tool     | `create-ec2-instance`              |
//! | tool     | `start-ec2-instance`               |
//! | tool     | `stop-ec2-instance`                |
//! | tool     | `terminate-ec2-instance`           |
//!
//! Every handler shares one [`InfraClient`].

pub mod resources;
pub mod tools;

use std::sync::Arc;

use crate::error::RegistrationError;
use crate::infra::InfraClient;
use crate::mcp::dispatcher::{Dispatcher, ServerInfo};
use crate::mcp::resources::{Resource, ResourceRegistry, ResourceTemplate};
use crate::mcp::tools::ToolRegistry;

pub use resources::{InstanceDetailResource, InstanceListResource, INSTANCES_URI, INSTANCE_TEMPLATE};
pub use tools::{CreateInstanceTool, LifecycleAction, LifecycleTool};

/// Registers the instance list and instance detail resources.
///
/// # Errors
///
/// Returns an error if either address is already claimed.
pub fn register_resources(
    registry: &mut ResourceRegistry,
    client: &Arc<dyn InfraClient>,
) -> Result<(), RegistrationError> {
    registry.register_literal(
        Resource {
            uri: INSTANCES_URI.to_string(),
            name: "EC2 Instances".to_string(),
            description: "List all EC2 instances in the region".to_string(),
            mime_type: resources::MIME_TYPE.to_string(),
        },
        Arc::new(InstanceListResource::new(Arc::clone(client))),
    )?;

    registry.register_template(
        ResourceTemplate {
            pattern: INSTANCE_TEMPLATE.to_string(),
            name: "EC2 Instance Details".to_string(),
            description: "Detailed information about a specific EC2 instance".to_string(),
            mime_type: resources::MIME_TYPE.to_string(),
        },
        Arc::new(InstanceDetailResource::new(Arc::clone(client))),
    )
}

/// Registers the create, start, stop and terminate tools.
///
/// # Errors
///
/// Returns an error if a tool name is already taken.
pub fn register_tools(
    registry: &mut ToolRegistry,
    client: &Arc<dyn InfraClient>,
) -> Result<(), RegistrationError> {
    registry.register(
        tools::create_instance_tool(),
        Arc::new(CreateInstanceTool::new(Arc::clone(client))),
    )?;

    for action in [
        LifecycleAction::Start,
        LifecycleAction::Stop,
        LifecycleAction::Terminate,
    ] {
        registry.register(
            action.tool(),
            Arc::new(LifecycleTool::new(Arc::clone(client), action)),
        )?;
    }
    Ok(())
}

/// Builds a dispatcher serving every EC2 resource and tool.
///
/// # Errors
///
/// Returns an error if registration fails.
pub fn build_dispatcher(
    info: ServerInfo,
    client: Arc<dyn InfraClient>,
) -> Result<Dispatcher, RegistrationError> {
    let mut resources = ResourceRegistry::new();
    register_resources(&mut resources, &client)?;

    let mut tools = ToolRegistry::new();
    register_tools(&mut tools, &client)?;

    tracing::debug!(
        resources = resources.resources().len(),
        templates = resources.templates().len(),
        "EC2 handlers registered"
    );
    Ok(Dispatcher::new(info, resources, tools))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryFleet;

    fn client() -> Arc<dyn InfraClient> {
        Arc::new(InMemoryFleet::new("us-west-2"))
    }

    #[test]
    fn registers_everything_in_order() {
        let dispatcher = build_dispatcher(ServerInfo::default(), client()).unwrap();

        let tools: Vec<_> = dispatcher.tools().tools().map(|t| t.name.as_str()).collect();
        assert_eq!(
            tools,
            vec![
                "create-ec2-instance",
                "start-ec2-instance",
                "stop-ec2-instance",
                "terminate-ec2-instance"
            ]
        );
        assert_eq!(dispatcher.resources().resources()[0].uri, INSTANCES_URI);
        assert_eq!(
            dispatcher.resources().templates()[0].pattern,
            INSTANCE_TEMPLATE
        );
    }

    #[test]
    fn detail_template_binds_instance_id() {
        let dispatcher = build_dispatcher(ServerInfo::default(), client()).unwrap();
        let resolved = dispatcher
            .resources()
            .resolve("aws://ec2/instances/i-12345")
            .unwrap();
        assert_eq!(resolved.placeholders["instanceId"], "i-12345");
        assert_eq!(resolved.mime_type, "application/json");
    }

    #[test]
    fn registering_twice_fails() {
        let client = client();
        let mut tools = ToolRegistry::new();
        register_tools(&mut tools, &client).unwrap();
        assert!(matches!(
            register_tools(&mut tools, &client),
            Err(RegistrationError::DuplicateTool { .. })
        ));

        let mut resources = ResourceRegistry::new();
        register_resources(&mut resources, &client).unwrap();
        assert!(matches!(
            register_resources(&mut resources, &client),
            Err(RegistrationError::DuplicateResource { .. })
        ));
    }
}
