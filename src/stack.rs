//! The stack provider seam used by the orchestrator.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::binder::{DeployedParameter, ParameterDeclaration};

/// Logical resource id to physical id (or ARN) of a deployed stack.
pub type ResourceMap = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("Unknown error ocurred: {0}.")]
    UnknownError(String),

    #[error("Stack {0} not found")]
    NotFoundError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployKind {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    Deployed,
    NoChanges,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackProgress {
    InProgress,
    Complete,
    Failed(String),
}

impl StackProgress {
    /// Classifies a CloudFormation stack status for the given kind of deploy.
    pub fn from_status(kind: DeployKind, status: &str) -> Self {
        let complete = match kind {
            DeployKind::Create => "CREATE_COMPLETE",
            DeployKind::Update => "UPDATE_COMPLETE",
        };

        if status == complete {
            return StackProgress::Complete;
        }
        if status.ends_with("_IN_PROGRESS") {
            return StackProgress::InProgress;
        }

        return StackProgress::Failed(status.to_string());
    }
}

#[async_trait]
pub trait StackProvider {
    /// Validates the template and returns the parameters it declares.
    async fn validate(&self, template: &str) -> Result<Vec<ParameterDeclaration>, Error>;

    /// Whether a stack with this name exists, ignoring deleted stacks.
    async fn stack_exists(&self, stack_name: &str) -> Result<bool, Error>;

    async fn deploy(
        &self,
        stack_name: &str,
        template: &str,
        parameters: &[DeployedParameter],
        kind: DeployKind,
    ) -> Result<DeployOutcome, Error>;

    async fn progress(&self, stack_name: &str, kind: DeployKind) -> Result<StackProgress, Error>;

    async fn resource_map(&self, stack_name: &str) -> Result<ResourceMap, Error>;
}
