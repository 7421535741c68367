use async_trait::async_trait;
use tracing::info;

use crate::document::Document;
use crate::store::{self, FlowStore};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Flow {0} not found")]
    FlowNotFound(String),

    #[error("Flow {0} content is not valid JSON: {1}")]
    InvalidContent(String, String),

    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error(transparent)]
    Store(#[from] store::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSummary {
    pub name: String,
    pub id: String,
    pub arn: String,
}

/// Where contact flows are published.
#[async_trait]
pub trait FlowRegistry {
    /// Summaries of the flows with the given names; unknown names are left out.
    async fn flow_summaries(&self, flow_names: &[String]) -> Result<Vec<FlowSummary>, Error>;

    /// The raw JSON content of a flow.
    async fn flow_content(&self, flow_arn: &str) -> Result<String, Error>;
}

pub async fn export_flow<R>(
    registry: &R,
    summary: &FlowSummary,
    store: &FlowStore,
) -> Result<(), Error>
where
    R: FlowRegistry + ?Sized,
{
    info!("Exporting flow {}...", summary.name);

    let content = registry.flow_content(&summary.arn).await?;
    let document: Document = serde_json::from_str(&content).map_err(|error| {
        Error::InvalidContent(summary.name.clone(), error.to_string())
    })?;

    // Rewritten pretty-printed so exports diff cleanly
    store.write(&summary.name, &document)?;

    info!("Flow export complete");
    return Ok(());
}

pub async fn export_flows<R>(
    registry: &R,
    flow_names: &[String],
    store: &FlowStore,
) -> Result<(), Error>
where
    R: FlowRegistry + ?Sized,
{
    let summaries = registry.flow_summaries(flow_names).await?;

    for flow_name in flow_names {
        let summary = summaries
            .iter()
            .find(|summary| &summary.name == flow_name)
            .ok_or_else(|| Error::FlowNotFound(flow_name.clone()))?;

        export_flow(registry, summary, store).await?;
    }

    info!("Export completed successfully");
    return Ok(());
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::tempdir;

    use super::{export_flows, Error, FlowRegistry, FlowSummary};
    use crate::store::FlowStore;

    struct MockRegistry {
        flows: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockRegistry {
        fn new(flows: &[(&str, &str)]) -> Self {
            MockRegistry {
                flows: flows
                    .iter()
                    .map(|(name, content)| (name.to_string(), content.to_string()))
                    .collect(),
                calls: Mutex::new(vec![]),
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl FlowRegistry for MockRegistry {
        async fn flow_summaries(&self, flow_names: &[String]) -> Result<Vec<FlowSummary>, Error> {
            self.record("flow_summaries".to_string());
            Ok(flow_names
                .iter()
                .filter(|name| self.flows.contains_key(*name))
                .map(|name| FlowSummary {
                    name: name.clone(),
                    id: format!("{} id", name),
                    arn: format!("{} arn", name),
                })
                .collect())
        }

        async fn flow_content(&self, flow_arn: &str) -> Result<String, Error> {
            self.record(format!("flow_content {}", flow_arn));
            let name = flow_arn.trim_end_matches(" arn");
            Ok(self.flows[name].clone())
        }
    }

    #[tokio::test]
    async fn exports_every_flow() {
        let dir = tempdir().unwrap();
        let store = FlowStore::new(dir.path());
        let registry = MockRegistry::new(&[
            ("CallbackInbound", r#"{"Version":"2019-10-30"}"#),
            ("CallbackOutbound", r#"{"Message":"mock flow content"}"#),
        ]);

        export_flows(
            &registry,
            &["CallbackInbound".to_string(), "CallbackOutbound".to_string()],
            &store,
        )
        .await
        .unwrap();

        assert_eq!(
            *registry.calls.lock().unwrap(),
            vec![
                "flow_summaries",
                "flow_content CallbackInbound arn",
                "flow_content CallbackOutbound arn",
            ]
        );
        assert_eq!(
            store.read("CallbackOutbound").unwrap(),
            json!({"Message": "mock flow content"})
        );
        let written_path = store.path("CallbackInbound");
        let written = std::fs::read_to_string(written_path).unwrap();
        assert!(written.starts_with("{\n  \"Version\": \"2019-10-30\""));
    }

    #[tokio::test]
    async fn fails_on_unknown_flow() {
        let dir = tempdir().unwrap();
        let registry = MockRegistry::new(&[("CallbackInbound", "{}")]);

        let result = export_flows(
            &registry,
            &["CallbackInbound".to_string(), "Missing".to_string()],
            &FlowStore::new(dir.path()),
        )
        .await;

        assert_eq!(result, Err(Error::FlowNotFound("Missing".to_string())));
    }

    #[tokio::test]
    async fn fails_on_invalid_content() {
        let dir = tempdir().unwrap();
        let registry = MockRegistry::new(&[("CallbackInbound", "not json")]);
        let store = FlowStore::new(dir.path());

        let flow_names = ["CallbackInbound".to_string()];
        let result = export_flows(&registry, &flow_names, &store).await;

        match result {
            Err(Error::InvalidContent(name, _)) => assert_eq!(name, "CallbackInbound"),
            other => panic!("Expected `InvalidContent` error, got {:?}", other),
        }
    }
}
