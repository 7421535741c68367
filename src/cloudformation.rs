use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_cloudformation::model::{Parameter, StackResourceSummary, StackStatus, StackSummary};
use aws_sdk_cloudformation::types::SdkError;
use aws_sdk_cloudformation::Region;
use aws_types::SdkConfig;
use futures::TryStreamExt;
use tracing::debug;

use crate::binder::{DeployedParameter, ParameterDeclaration};
use crate::stack::{DeployKind, DeployOutcome, Error, ResourceMap, StackProgress, StackProvider};

const NO_UPDATES_MESSAGE: &str = "No updates are to be performed.";

/// Shared AWS configuration, using the given region or the default chain.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let region_provider =
        RegionProviderChain::first_try(region.map(|name| Region::new(name.to_string())))
            .or_default_provider();

    return aws_config::from_env().region(region_provider).load().await;
}

fn map_sdk_error<E>(error: SdkError<E>) -> Error
where
    E: std::error::Error + 'static,
{
    match error {
        SdkError::ServiceError { err, .. } => Error::ServiceError(err.to_string()),
        err => Error::UnknownError(err.to_string()),
    }
}

pub struct CloudFormation {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormation {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let client = aws_sdk_cloudformation::Client::new(sdk_config);

        return Self { client };
    }

    async fn stack_summary(&self, stack_name: &str) -> Result<Option<StackSummary>, Error> {
        let summaries: Vec<StackSummary> = self
            .client
            .list_stacks()
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(map_sdk_error)?;

        let summary = summaries.into_iter().find(|summary| {
            summary.stack_name() == Some(stack_name)
                && summary.stack_status() != Some(&StackStatus::DeleteComplete)
        });

        return Ok(summary);
    }
}

#[async_trait]
impl StackProvider for CloudFormation {
    async fn validate(&self, template: &str) -> Result<Vec<ParameterDeclaration>, Error> {
        let result = self
            .client
            .validate_template()
            .template_body(template)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let declared = result
            .parameters()
            .unwrap_or_else(|| &[])
            .iter()
            .filter_map(|parameter| parameter.parameter_key())
            .map(ParameterDeclaration::new)
            .collect();

        return Ok(declared);
    }

    async fn stack_exists(&self, stack_name: &str) -> Result<bool, Error> {
        return Ok(self.stack_summary(stack_name).await?.is_some());
    }

    async fn deploy(
        &self,
        stack_name: &str,
        template: &str,
        parameters: &[DeployedParameter],
        kind: DeployKind,
    ) -> Result<DeployOutcome, Error> {
        let parameters: Vec<Parameter> = parameters
            .iter()
            .map(|parameter| {
                Parameter::builder()
                    .parameter_key(&parameter.key)
                    .parameter_value(&parameter.value)
                    .build()
            })
            .collect();

        debug!(
            stack_name,
            ?kind,
            parameters = parameters.len(),
            "Sending deployment"
        );
        match kind {
            DeployKind::Create => {
                self.client
                    .create_stack()
                    .stack_name(stack_name)
                    .template_body(template)
                    .set_parameters(Some(parameters))
                    .send()
                    .await
                    .map_err(map_sdk_error)?;
            }
            DeployKind::Update => {
                let result = self
                    .client
                    .update_stack()
                    .stack_name(stack_name)
                    .template_body(template)
                    .set_parameters(Some(parameters))
                    .send()
                    .await;

                match result {
                    Ok(_) => (),
                    Err(SdkError::ServiceError { err, .. })
                        if err.message() == Some(NO_UPDATES_MESSAGE) =>
                    {
                        return Ok(DeployOutcome::NoChanges);
                    }
                    Err(err) => return Err(map_sdk_error(err)),
                }
            }
        }

        return Ok(DeployOutcome::Deployed);
    }

    async fn progress(&self, stack_name: &str, kind: DeployKind) -> Result<StackProgress, Error> {
        let result = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let stacks = result.stacks().unwrap_or_else(|| &[]);
        let stack = match stacks.first() {
            Some(stack) => stack,
            None => return Err(Error::NotFoundError(stack_name.to_string())),
        };

        let status = match stack.stack_status() {
            Some(status) => status.as_str(),
            None => {
                let message = format!("Stack {} has no status", stack_name);
                return Err(Error::UnknownError(message));
            }
        };

        return Ok(StackProgress::from_status(kind, status));
    }

    async fn resource_map(&self, stack_name: &str) -> Result<ResourceMap, Error> {
        let summaries: Vec<StackResourceSummary> = self
            .client
            .list_stack_resources()
            .stack_name(stack_name)
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(map_sdk_error)?;

        let resources = summaries
            .iter()
            .filter_map(|summary| {
                let logical_id = summary.logical_resource_id()?;
                let physical_id = summary.physical_resource_id()?;
                Some((logical_id.to_string(), physical_id.to_string()))
            })
            .collect();

        return Ok(resources);
    }
}
