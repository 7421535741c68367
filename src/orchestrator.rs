//! Sequential deployment of stacks, each stage feeding its resources forward.
//!
//! A stage moves through `Pending -> Validating -> Creating | Updating ->
//! Waiting -> Done`. When the provider has nothing to change the stage ends in
//! `Skipped` without waiting. Either way the stack's resources are read back so
//! later stages can bind parameters to them.

use std::collections::BTreeMap;
use std::fs;
use std::io;

use tracing::{debug, info, instrument, warn};

use crate::binder::{self, ConfigObject, ContentRenderer};
use crate::config::{StackDescriptor, WaitPolicy, WaitSettings};
use crate::stack::{self, DeployKind, DeployOutcome, ResourceMap, StackProgress, StackProvider};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Template {0} not found")]
    TemplateNotFound(String),

    #[error("Unable to read template {0}: {1}")]
    TemplateRead(String, String),

    #[error(transparent)]
    Binding(#[from] binder::Error),

    #[error(transparent)]
    Provider(#[from] stack::Error),

    #[error("Stack {stack} failed with status {status}")]
    StackFailed { stack: String, status: String },

    #[error("Stack {stack} did not complete after {attempts} attempts")]
    CompletionTimeout { stack: String, attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Validating,
    Creating,
    Updating,
    Waiting,
    Done,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stack_name: String,
    pub state: StageState,
    pub resources: ResourceMap,
}

pub struct Orchestrator<'a, P: ?Sized, R: ?Sized> {
    provider: &'a P,
    renderer: &'a R,
    config: &'a ConfigObject,
    raw_parameters: &'a BTreeMap<String, String>,
    wait: WaitSettings,
}

impl<'a, P, R> Orchestrator<'a, P, R>
where
    P: StackProvider + ?Sized,
    R: ContentRenderer + ?Sized,
{
    pub fn new(
        provider: &'a P,
        renderer: &'a R,
        config: &'a ConfigObject,
        raw_parameters: &'a BTreeMap<String, String>,
        wait: WaitSettings,
    ) -> Self {
        return Self {
            provider,
            renderer,
            config,
            raw_parameters,
            wait,
        };
    }

    /// Deploys the stacks in order and returns the union of their resources.
    pub async fn deploy_all(&self, stacks: &[StackDescriptor]) -> Result<ResourceMap, Error> {
        let mut resources = ResourceMap::new();

        for stack in stacks {
            let report = self.deploy_stage(stack, &resources).await?;
            resources.extend(report.resources);
        }

        info!(stacks = stacks.len(), "Deployment of all stacks complete");
        return Ok(resources);
    }

    #[instrument(skip_all, fields(stack = %stack.name))]
    pub async fn deploy_stage(
        &self,
        stack: &StackDescriptor,
        previous: &ResourceMap,
    ) -> Result<StageReport, Error> {
        let mut state = StageState::Pending;

        let template = read_template(stack)?;

        transition(&mut state, StageState::Validating);
        let declared = self.provider.validate(&template).await?;

        let kind = if self.provider.stack_exists(&stack.name).await? {
            transition(&mut state, StageState::Updating);
            DeployKind::Update
        } else {
            transition(&mut state, StageState::Creating);
            DeployKind::Create
        };

        let mut raw_parameters = self.raw_parameters.clone();
        raw_parameters.extend(stack.parameters.clone());
        let parameters = binder::resolve(
            &declared,
            &raw_parameters,
            self.config,
            previous,
            self.renderer,
        )?;

        info!("Starting deployment of {}...", stack.name);
        match self
            .provider
            .deploy(&stack.name, &template, &parameters, kind)
            .await?
        {
            DeployOutcome::NoChanges => {
                info!("No changes to deploy");
                transition(&mut state, StageState::Skipped);
            }
            DeployOutcome::Deployed => {
                transition(&mut state, StageState::Waiting);
                self.wait_for_completion(&stack.name, kind).await?;
                transition(&mut state, StageState::Done);
                info!("Deployment complete");
            }
        }

        let resources = self.provider.resource_map(&stack.name).await?;

        return Ok(StageReport {
            stack_name: stack.name.clone(),
            state,
            resources,
        });
    }

    async fn wait_for_completion(&self, stack_name: &str, kind: DeployKind) -> Result<(), Error> {
        let policy: WaitPolicy = match kind {
            DeployKind::Create => self.wait.create,
            DeployKind::Update => self.wait.update,
        };

        for attempt in 1..=policy.max_attempts {
            match self.provider.progress(stack_name, kind).await? {
                StackProgress::Complete => return Ok(()),
                StackProgress::Failed(status) => {
                    return Err(Error::StackFailed {
                        stack: stack_name.to_string(),
                        status,
                    })
                }
                StackProgress::InProgress => debug!(attempt, "Stack still in progress"),
            }

            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.delay()).await;
            }
        }

        warn!(
            attempts = policy.max_attempts,
            "Gave up waiting for {}", stack_name
        );
        return Err(Error::CompletionTimeout {
            stack: stack_name.to_string(),
            attempts: policy.max_attempts,
        });
    }
}

fn transition(state: &mut StageState, next: StageState) {
    debug!(from = ?state, to = ?next, "Stage transition");
    *state = next;
}

fn read_template(stack: &StackDescriptor) -> Result<String, Error> {
    let location = stack.template.display().to_string();

    return match fs::read_to_string(&stack.template) {
        Ok(template) => Ok(template),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::TemplateNotFound(location)),
            _ => Err(Error::TemplateRead(location, error.to_string())),
        },
    };
}
