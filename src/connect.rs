use async_trait::async_trait;
use aws_sdk_connect::model::{ContactFlowSummary, InstanceSummary, ListPhoneNumbersSummary};
use aws_sdk_connect::types::SdkError;
use aws_types::SdkConfig;
use futures::TryStreamExt;
use tracing::info;

use crate::binder::AttributeBag;
use crate::export::{self, FlowRegistry, FlowSummary};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("Unknown error ocurred: {0}.")]
    UnknownError(String),

    #[error("{0} not found")]
    NotFoundError(String),
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

fn required<'a>(value: Option<&'a str>, description: &str) -> Result<&'a str, Error> {
    value.ok_or_else(|| Error::NotFoundError(description.to_string()))
}

// Keys follow the Connect API field names so suffix lookups such as `Arn`
// or `Id` behave the same for every summary.
fn attribute_bag(pairs: &[(&str, Option<&str>)]) -> AttributeBag {
    pairs
        .iter()
        .filter_map(|(key, value)| {
            let value = value.as_ref()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn find_instance(
    instances: Vec<InstanceSummary>,
    instance_alias: &str,
) -> Result<(InstanceSummary, String), Error> {
    let description = format!("Instance {}", instance_alias);

    let instance = instances
        .into_iter()
        .find(|instance| instance.instance_alias() == Some(instance_alias))
        .ok_or_else(|| Error::NotFoundError(description.clone()))?;
    let arn_description = format!("Arn of {}", description);
    let arn = required(instance.arn(), &arn_description)?.to_string();

    return Ok((instance, arn));
}

fn find_phone_numbers(
    summaries: &[ListPhoneNumbersSummary],
    phone_numbers: &[&str],
) -> Result<Vec<ListPhoneNumbersSummary>, Error> {
    let mut matched = Vec::with_capacity(phone_numbers.len());

    for phone_number in phone_numbers {
        let summary = summaries
            .iter()
            .find(|summary| summary.phone_number() == Some(*phone_number))
            .ok_or_else(|| Error::NotFoundError(format!("Phone number {}", phone_number)))?;
        matched.push(summary.clone());
    }

    return Ok(matched);
}

fn phone_number_id<'a>(summaries: &'a [ListPhoneNumbersSummary]) -> Result<&'a str, Error> {
    let summary = summaries
        .first()
        .ok_or_else(|| Error::NotFoundError(String::from("Phone number")))?;

    let number = summary.phone_number().unwrap_or_default();
    let description = format!("Id of phone number {}", number);
    return required(summary.phone_number_id(), &description);
}

/// Amazon Connect operations for one instance, located by alias.
pub struct ConnectClient {
    client: aws_sdk_connect::Client,
    instance: InstanceSummary,
    instance_arn: String,
}

impl ConnectClient {
    pub async fn new(sdk_config: &SdkConfig, instance_alias: &str) -> Result<Self, Error> {
        let client = aws_sdk_connect::Client::new(sdk_config);

        let instances: Vec<InstanceSummary> = client
            .list_instances()
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(map_sdk_error)?;

        let (instance, instance_arn) = find_instance(instances, instance_alias)?;

        return Ok(Self {
            client,
            instance,
            instance_arn,
        });
    }

    pub fn instance_attributes(&self) -> AttributeBag {
        attribute_bag(&[
            ("Id", self.instance.id()),
            ("Arn", self.instance.arn()),
            ("InstanceAlias", self.instance.instance_alias()),
            ("ServiceRole", self.instance.service_role()),
        ])
    }

    async fn phone_number_summaries(
        &self,
        phone_numbers: &[&str],
    ) -> Result<Vec<ListPhoneNumbersSummary>, Error> {
        let summaries: Vec<ListPhoneNumbersSummary> = self
            .client
            .list_phone_numbers_v2()
            .target_arn(&self.instance_arn)
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(map_sdk_error)?;

        return find_phone_numbers(&summaries, phone_numbers);
    }

    /// Attribute bags of the given phone numbers, in the requested order.
    pub async fn phone_number_attributes(
        &self,
        phone_numbers: &[&str],
    ) -> Result<Vec<AttributeBag>, Error> {
        let summaries = self.phone_number_summaries(phone_numbers).await?;

        return Ok(summaries
            .iter()
            .map(|summary| {
                attribute_bag(&[
                    ("PhoneNumberId", summary.phone_number_id()),
                    ("PhoneNumberArn", summary.phone_number_arn()),
                    ("PhoneNumber", summary.phone_number()),
                    ("TargetArn", summary.target_arn()),
                ])
            })
            .collect());
    }

    async fn contact_flow_summaries(&self) -> Result<Vec<ContactFlowSummary>, Error> {
        return self
            .client
            .list_contact_flows()
            .instance_id(&self.instance_arn)
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(map_sdk_error);
    }

    pub async fn assign_contact_flow_number(
        &self,
        flow_name: &str,
        phone_number: &str,
    ) -> Result<(), Error> {
        info!("Assigning phone number to contact flow {}", flow_name);

        let flows = self.contact_flow_summaries().await?;
        let flow_id = flows
            .iter()
            .find(|flow| flow.name() == Some(flow_name))
            .and_then(|flow| flow.id())
            .ok_or_else(|| Error::NotFoundError(format!("Contact flow {}", flow_name)))?;

        let numbers = self.phone_number_summaries(&[phone_number]).await?;
        let number_id = phone_number_id(&numbers)?;

        self.client
            .associate_phone_number_contact_flow()
            .instance_id(&self.instance_arn)
            .phone_number_id(number_id)
            .contact_flow_id(flow_id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        return Ok(());
    }

    pub async fn unassign_contact_flow_number(&self, phone_number: &str) -> Result<(), Error> {
        info!("Unassigning phone number from contact flow");

        let numbers = self.phone_number_summaries(&[phone_number]).await?;
        let number_id = phone_number_id(&numbers)?;

        self.client
            .disassociate_phone_number_contact_flow()
            .instance_id(&self.instance_arn)
            .phone_number_id(number_id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        return Ok(());
    }

    pub async fn assign_user_to_routing_profile(
        &self,
        username: &str,
        routing_profile_name: &str,
    ) -> Result<(), Error> {
        info!(
            "Moving {} to routing profile {}",
            username, routing_profile_name
        );

        let users: Vec<_> = self
            .client
            .list_users()
            .instance_id(&self.instance_arn)
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(map_sdk_error)?;
        let user_id = users
            .iter()
            .find(|user| user.username() == Some(username))
            .and_then(|user| user.id())
            .ok_or_else(|| Error::NotFoundError(format!("User {}", username)))?;

        let routing_profiles: Vec<_> = self
            .client
            .list_routing_profiles()
            .instance_id(&self.instance_arn)
            .into_paginator()
            .items()
            .send()
            .try_collect()
            .await
            .map_err(map_sdk_error)?;
        let routing_profile_id = routing_profiles
            .iter()
            .find(|profile| profile.name() == Some(routing_profile_name))
            .and_then(|profile| profile.id());
        let routing_profile_id = required(
            routing_profile_id,
            &format!("Routing profile {}", routing_profile_name),
        )?;

        self.client
            .update_user_routing_profile()
            .instance_id(&self.instance_arn)
            .user_id(user_id)
            .routing_profile_id(routing_profile_id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        return Ok(());
    }
}

impl From<Error> for export::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::NotFoundError(name) => export::Error::FlowNotFound(name),
            error => export::Error::ServiceError(error.to_string()),
        }
    }
}

#[async_trait]
impl FlowRegistry for ConnectClient {
    async fn flow_summaries(
        &self,
        flow_names: &[String],
    ) -> Result<Vec<FlowSummary>, export::Error> {
        let flows = self.contact_flow_summaries().await?;

        return Ok(flows
            .iter()
            .filter_map(|flow| {
                let name = flow.name()?;
                if !flow_names.iter().any(|flow_name| flow_name == name) {
                    return None;
                }
                Some(FlowSummary {
                    name: name.to_string(),
                    id: flow.id()?.to_string(),
                    arn: flow.arn()?.to_string(),
                })
            })
            .collect());
    }

    async fn flow_content(&self, flow_arn: &str) -> Result<String, export::Error> {
        let result = self
            .client
            .describe_contact_flow()
            .instance_id(&self.instance_arn)
            .contact_flow_id(flow_arn)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let content = result.contact_flow().and_then(|flow| flow.content());
        let content = required(content, &format!("Content of contact flow {}", flow_arn))?;

        return Ok(content.to_string());
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_connect::model::{InstanceSummary, ListPhoneNumbersSummary};

    use super::{attribute_bag, find_instance, find_phone_numbers, phone_number_id, Error};
    use crate::export;

    fn phone_number(number: &str, id: Option<&str>) -> ListPhoneNumbersSummary {
        ListPhoneNumbersSummary::builder()
            .phone_number(number)
            .set_phone_number_id(id.map(String::from))
            .build()
    }

    #[test]
    fn attribute_bag_skips_missing_values() {
        let bag = attribute_bag(&[
            ("PhoneNumberId", Some("id")),
            ("PhoneNumberArn", None),
            ("TargetArn", Some("target")),
        ]);

        let keys: Vec<&String> = bag.keys().collect();
        assert_eq!(keys, vec!["PhoneNumberId", "TargetArn"]);
    }

    #[test]
    fn finds_instance_by_alias() {
        let instances = vec![
            InstanceSummary::builder()
                .instance_alias("other")
                .arn("other-arn")
                .build(),
            InstanceSummary::builder()
                .instance_alias("callback")
                .arn("callback-arn")
                .build(),
        ];

        let (instance, arn) = find_instance(instances, "callback").unwrap();
        assert_eq!(instance.instance_alias(), Some("callback"));
        assert_eq!(arn, "callback-arn");
    }

    #[test]
    fn instance_without_arn_is_not_found() {
        let instances = vec![InstanceSummary::builder().instance_alias("callback").build()];

        assert_eq!(
            find_instance(instances, "callback").err(),
            Some(Error::NotFoundError(String::from("Arn of Instance callback")))
        );
        assert_eq!(
            find_instance(vec![], "callback").err(),
            Some(Error::NotFoundError(String::from("Instance callback")))
        );
    }

    #[test]
    fn phone_numbers_keep_requested_order() {
        let summaries = vec![
            phone_number("+61200000000", Some("private-id")),
            phone_number("+61300000000", Some("public-id")),
        ];

        let requested = ["+61300000000", "+61200000000"];
        let matched = find_phone_numbers(&summaries, &requested).unwrap();
        assert_eq!(matched[0].phone_number_id(), Some("public-id"));
        assert_eq!(matched[1].phone_number_id(), Some("private-id"));

        assert_eq!(
            find_phone_numbers(&summaries, &["+61400000000"]),
            Err(Error::NotFoundError(String::from("Phone number +61400000000")))
        );
    }

    #[test]
    fn phone_number_without_id_is_not_found() {
        let summaries = vec![phone_number("+61200000000", None)];

        let missing = String::from("Id of phone number +61200000000");
        assert_eq!(
            phone_number_id(&summaries),
            Err(Error::NotFoundError(missing))
        );
        assert_eq!(
            phone_number_id(&[phone_number("+61200000000", Some("private-id"))]),
            Ok("private-id")
        );
    }

    #[test]
    fn connect_errors_convert_to_export_errors() {
        assert_eq!(
            export::Error::from(Error::NotFoundError("Contact flow X".to_string())),
            export::Error::FlowNotFound("Contact flow X".to_string())
        );
        assert_eq!(
            export::Error::from(Error::ServiceError("throttled".to_string())),
            export::Error::ServiceError("Service error ocurred: throttled.".to_string())
        );
    }
}
