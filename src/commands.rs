use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::binder::ConfigObject;
use crate::cloudformation::{load_sdk_config, CloudFormation};
use crate::config::{self, DeployConfig, Parameters};
use crate::connect::ConnectClient;
use crate::export::export_flows;
use crate::orchestrator::Orchestrator;
use crate::stack::ResourceMap;
use crate::store::FlowStore;
use crate::templatise::{templatise_flows, FlowContentRenderer};

/// Everything a command needs: the deploy file and the operator parameters.
pub struct Workspace {
    pub config: DeployConfig,
    pub parameters: Parameters,
}

impl Workspace {
    pub fn load(config_path: &Path, env_path: &Path) -> Result<Self> {
        let config = config::parse(&config_path.to_path_buf())
            .with_context(|| format!("Could not load {}", config_path.display()))?;
        let parameters = config::read_parameters(env_path)
            .with_context(|| format!("Could not load {}", env_path.display()))?;

        return Ok(Self { config, parameters });
    }

    fn export_store(&self) -> FlowStore {
        FlowStore::new(&self.config.flows.export_directory)
    }

    fn content_store(&self) -> FlowStore {
        FlowStore::new(&self.config.flows.content_directory)
    }

    async fn connect(&self) -> Result<ConnectClient> {
        let sdk_config = load_sdk_config(self.config.region.as_deref()).await;

        let instance_alias = &self.parameters.instance_alias;

        return ConnectClient::new(&sdk_config, instance_alias)
            .await
            .with_context(|| format!("Could not find Connect instance {}", instance_alias));
    }
}

pub async fn export(workspace: &Workspace) -> Result<()> {
    let connect = workspace.connect().await?;

    let flow_names = &workspace.config.flows.names;
    export_flows(&connect, flow_names, &workspace.export_store())
        .await
        .context("Flow export failed")?;

    return Ok(());
}

pub fn templatise(workspace: &Workspace) -> Result<()> {
    templatise_flows(
        &workspace.config.flows.names,
        &workspace.export_store(),
        &workspace.content_store(),
    )
    .context("Templatising flows failed")?;

    info!("Templatised {} flows", workspace.config.flows.names.len());
    return Ok(());
}

/// The attribute bags parameters are bound against: the instance and both numbers.
async fn config_object(connect: &ConnectClient, parameters: &Parameters) -> Result<ConfigObject> {
    let phone_numbers = [
        parameters.private_number.as_str(),
        parameters.public_number.as_str(),
    ];
    let mut numbers = connect
        .phone_number_attributes(&phone_numbers)
        .await
        .context("Could not look up phone numbers")?
        .into_iter();

    let mut config = ConfigObject::new();
    config.insert("instance", connect.instance_attributes());
    if let Some(private_number) = numbers.next() {
        config.insert("private_number", private_number);
    }
    if let Some(public_number) = numbers.next() {
        config.insert("public_number", public_number);
    }

    return Ok(config);
}

async fn deploy_stacks(workspace: &Workspace, connect: &ConnectClient) -> Result<ResourceMap> {
    let sdk_config = load_sdk_config(workspace.config.region.as_deref()).await;
    let cloudformation = CloudFormation::new(&sdk_config);

    let config = config_object(connect, &workspace.parameters).await?;
    let flow_names = &workspace.config.flows.names;
    let renderer = FlowContentRenderer::new(workspace.content_store(), flow_names);

    let orchestrator = Orchestrator::new(
        &cloudformation,
        &renderer,
        &config,
        &workspace.parameters.raw,
        workspace.config.wait,
    );

    return orchestrator
        .deploy_all(&workspace.config.stacks)
        .await
        .context("Deployment failed");
}

pub async fn deploy(workspace: &Workspace) -> Result<()> {
    let connect = workspace.connect().await?;
    let resources = deploy_stacks(workspace, &connect).await?;

    info!(
        resources = resources.len(),
        "Deployment completed successfully"
    );
    return Ok(());
}

pub async fn setup(workspace: &Workspace) -> Result<()> {
    let connect = workspace.connect().await?;
    deploy_stacks(workspace, &connect).await?;

    let private_number = &workspace.parameters.private_number;
    connect
        .assign_contact_flow_number(&workspace.config.flows.inbound, private_number)
        .await
        .context("Could not assign the private number to the inbound flow")?;

    match workspace.parameters.agent_username.as_deref() {
        Some(username) => connect
            .assign_user_to_routing_profile(username, &workspace.config.routing_profile)
            .await
            .context("Could not assign the agent routing profile")?,
        None => warn!("AgentUsername is not set, skipping the routing profile"),
    }

    info!("Setup completed successfully");
    return Ok(());
}

pub async fn teardown(workspace: &Workspace) -> Result<()> {
    let connect = workspace.connect().await?;

    connect
        .unassign_contact_flow_number(&workspace.parameters.private_number)
        .await
        .context("Could not unassign the private number")?;

    let username = workspace.parameters.agent_username()?;
    let routing_profile = workspace.parameters.default_routing_profile()?;
    connect
        .assign_user_to_routing_profile(username, routing_profile)
        .await
        .context("Could not restore the agent routing profile")?;

    info!("Teardown completed successfully");
    return Ok(());
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::tempdir;

    use super::{templatise, Workspace};

    #[test]
    fn loads_workspace_and_templatises_flows() {
        let dir = tempdir().unwrap();
        let exported = dir.path().join("exported");
        let content = dir.path().join("content");
        fs::create_dir_all(&exported).unwrap();
        let template = dir.path().join("stack.yaml");
        fs::write(&template, "Resources: {}").unwrap();

        let config_path = dir.path().join("deploy.yaml");
        fs::write(
            &config_path,
            format!(
                r#"
flows:
  names: [Callback Inbound]
  inbound: Callback Inbound
  export_directory: {}
  content_directory: {}
routing_profile: Callback Routing Profile
stacks:
  - name: callback-flows
    template: {}
"#,
                exported.display(),
                content.display(),
                template.display()
            ),
        )
        .unwrap();

        let env_path = dir.path().join(".env");
        fs::write(
            &env_path,
            "InstanceAlias=callback\nPrivateNumber=+61200000000\nPublicNumber=+61300000000\n",
        )
        .unwrap();

        fs::write(
            exported.join("Callback Inbound.json"),
            json!({
                "Actions": [{
                    "Parameters": {"ContactFlowId": "arn:aws:connect:flow/1"},
                    "Metadata": {
                        "contactFlow": {"id": "arn:aws:connect:flow/1", "text": "Callback Outbound"}
                    }
                }]
            })
            .to_string(),
        )
        .unwrap();

        let workspace = Workspace::load(&config_path, &env_path).unwrap();
        templatise(&workspace).unwrap();

        let templated_path = content.join("Callback Inbound.json");
        let templated = fs::read_to_string(templated_path).unwrap();
        assert!(templated.contains("{{resources['CallbackOutbound']}}"));
        assert!(!templated.contains("arn:aws:connect:flow/1"));
    }

    #[test]
    fn load_fails_without_env_file() {
        let dir = tempdir().unwrap();

        let config_path = dir.path().join("deploy.yaml");
        let result = Workspace::load(&config_path, &dir.path().join(".env"));

        assert!(result.is_err());
    }
}
