//! Replaces hardcoded resource ids in exported flows with late-bound
//! references, and resolves those references again at deploy time.
//!
//! Exported flows carry `{"id": <arn>, "text": <name>}` pairs next to the raw
//! ARNs they use. The pairs give a map from ARN to display name; every ARN is
//! then rewritten to `{{resources['<LogicalId>']}}`, where the logical id is
//! the normalized display name of the resource.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, info};

use crate::binder::ContentRenderer;
use crate::document::{walk, walk_mut, Document, Position};
use crate::logical_id::normalize;
use crate::stack::ResourceMap;
use crate::store::{self, FlowStore};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*resources\['([^']+)'\]\s*\}\}")
        .expect("placeholder pattern is valid")
});

/// Resource id to display name.
pub type ReferenceMap = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Reference {0} has no owning container")]
    MalformedReference(String),

    #[error("Resource {0} is referenced but was not deployed")]
    UnknownResource(String),

    #[error(transparent)]
    Store(#[from] store::Error),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

pub fn placeholder(logical_id: &str) -> String {
    format!("{{{{resources['{}']}}}}", logical_id)
}

pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER.is_match(value)
}

pub fn build_reference_map(document: &Document) -> ReferenceMap {
    let mut references = ReferenceMap::new();

    walk(
        Position::Root,
        document,
        &mut references,
        &mut |_position, node: &Document, references: &mut ReferenceMap| {
            Ok::<bool, Infallible>(record_reference(node, references))
        },
    )
    .unwrap_or_else(|never| match never {});

    return references;
}

// A {id, text} mapping is a single reference, never a container to explore.
fn record_reference(node: &Document, references: &mut ReferenceMap) -> bool {
    let Some(mapping) = node.as_object() else {
        return true;
    };

    let id = mapping.get("id").and_then(Value::as_str);
    let text = mapping.get("text").and_then(Value::as_str);
    let (Some(id), Some(text)) = (id, text) else {
        return true;
    };

    if !is_placeholder(id) {
        references.insert(id.to_string(), text.to_string());
    }

    return false;
}

/// Rewrites every scalar found in `references` into a placeholder and returns
/// how many were replaced.
pub fn substitute_references(
    document: &mut Document,
    references: &ReferenceMap,
) -> Result<usize, Error> {
    let mut replaced = 0;

    walk_mut(
        Position::Root,
        document,
        &mut replaced,
        &mut |position, node: &mut Document, replaced: &mut usize| {
            let Some(id) = node.as_str() else {
                return Ok(true);
            };
            let Some(display_name) = references.get(id) else {
                return Ok(true);
            };
            if position == Position::Root {
                return Err(Error::MalformedReference(id.to_string()));
            }

            debug!(
                ?position,
                id,
                display_name = display_name.as_str(),
                "Replacing reference"
            );
            *node = Value::String(placeholder(&normalize(display_name)));
            *replaced += 1;

            Ok(false)
        },
    )?;

    return Ok(replaced);
}

/// Resolves every placeholder in the document against `resources`.
pub fn render_references(document: &mut Document, resources: &ResourceMap) -> Result<(), Error> {
    walk_mut(
        Position::Root,
        document,
        &mut (),
        &mut |_position, node: &mut Document, _: &mut ()| {
            if let Value::String(text) = node {
                if is_placeholder(text) {
                    *text = render_text(text, resources)?;
                }
                return Ok(false);
            }

            Ok(true)
        },
    )
}

fn render_text(text: &str, resources: &ResourceMap) -> Result<String, Error> {
    let mut missing: Option<String> = None;

    let rendered = PLACEHOLDER.replace_all(text, |captures: &Captures<'_>| {
        let name = &captures[1];
        match resources.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    return match missing {
        Some(name) => Err(Error::UnknownResource(name)),
        None => Ok(rendered.into_owned()),
    };
}

/// Templatises one exported flow and writes it to the content store.
pub fn templatise_flow(
    flow_name: &str,
    exported: &FlowStore,
    content: &FlowStore,
) -> Result<usize, Error> {
    info!("Templatising flow {}...", flow_name);

    let mut document = exported.read(flow_name)?;

    let references = build_reference_map(&document);
    let replaced = substitute_references(&mut document, &references)?;

    content.write(flow_name, &document)?;

    info!(
        references = references.len(),
        replaced, "Flow templatise complete"
    );
    return Ok(replaced);
}

pub fn templatise_flows(
    flow_names: &[String],
    exported: &FlowStore,
    content: &FlowStore,
) -> Result<(), Error> {
    for flow_name in flow_names {
        templatise_flow(flow_name, exported, content)?;
    }

    info!("Templatise completed successfully");
    return Ok(());
}

/// Renders templated flows from a store into flow content strings.
///
/// Content parameters are named after the logical id of the flow, so each
/// requested name is matched against the normalized flow names first.
pub struct FlowContentRenderer {
    store: FlowStore,
    flow_names: HashMap<String, String>,
}

impl FlowContentRenderer {
    pub fn new(store: FlowStore, flow_names: &[String]) -> Self {
        let flow_names = flow_names
            .iter()
            .map(|flow_name| (normalize(flow_name), flow_name.clone()))
            .collect();

        return Self { store, flow_names };
    }
}

impl ContentRenderer for FlowContentRenderer {
    fn render(
        &self,
        names: &[String],
        resources: &ResourceMap,
    ) -> Result<BTreeMap<String, String>, Error> {
        let mut rendered = BTreeMap::new();

        for name in names {
            let flow_name = self.flow_names.get(name).unwrap_or(name);

            let mut document = self.store.read(flow_name)?;
            render_references(&mut document, resources)?;

            let content = match serde_json::to_string_pretty(&document) {
                Ok(content) => Ok(content),
                Err(error) => Err(Error::Unknown(error.to_string())),
            }?;
            rendered.insert(name.clone(), content);
        }

        return Ok(rendered);
    }
}
