//! Binds a template's declared parameters by naming convention.
//!
//! A declared parameter is `<Field1>...<FieldN><Attribute>` in camel case. The
//! field words, lower-cased and joined with `_`, name an attribute bag on the
//! [`ConfigObject`]; the attribute picks the first key in that bag ending with
//! it (`PrivateNumberArn` reads `private_number["PhoneNumberArn"]`). The
//! attribute `Content` is reserved for rendered flow content.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stack::ResourceMap;
use crate::templatise;

const CONTENT_ATTRIBUTE: &str = "Content";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Unable to resolve stack parameter {0}")]
    UnresolvableParameter(String),

    #[error("Parameter {0} does not follow the `<Field><Attribute>` naming convention")]
    InvalidParameterName(String),

    #[error("Unable to render content: {0}")]
    Render(#[from] templatise::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub name: String,
}

impl ParameterDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        return Self { name: name.into() };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedParameter {
    pub key: String,
    pub value: String,
}

impl DeployedParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        return Self {
            key: key.into(),
            value: value.into(),
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameDecomposition {
    pub tokens: Vec<String>,
    pub trailing_attribute: String,
}

impl NameDecomposition {
    /// Splits a camel case name in front of every upper-case letter.
    pub fn parse(name: &str) -> Result<Self, Error> {
        let mut tokens: Vec<String> = vec![];

        for character in name.chars() {
            if character.is_uppercase() || tokens.is_empty() {
                tokens.push(String::new());
            }
            if let Some(token) = tokens.last_mut() {
                token.push(character);
            }
        }

        let Some(trailing_attribute) = tokens.pop() else {
            return Err(Error::InvalidParameterName(name.to_string()));
        };
        if tokens.is_empty() {
            return Err(Error::InvalidParameterName(name.to_string()));
        }

        return Ok(Self {
            tokens,
            trailing_attribute,
        });
    }

    pub fn field_name(&self) -> String {
        self.tokens
            .iter()
            .map(|token| token.to_lowercase())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The declared name without its trailing attribute.
    pub fn base_name(&self) -> String {
        self.tokens.concat()
    }
}

pub type AttributeBag = IndexMap<String, String>;

/// Attribute bags keyed by field name, e.g. `instance` or `private_number`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigObject {
    fields: IndexMap<String, AttributeBag>,
}

impl ConfigObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field_name: impl Into<String>, attributes: AttributeBag) -> Self {
        self.insert(field_name, attributes);
        self
    }

    pub fn insert(&mut self, field_name: impl Into<String>, attributes: AttributeBag) {
        self.fields.insert(field_name.into(), attributes);
    }

    pub fn field(&self, field_name: &str) -> Option<&AttributeBag> {
        self.fields.get(field_name)
    }

    /// First attribute of the field whose key ends with `attribute`.
    pub fn attribute(&self, field_name: &str, attribute: &str) -> Option<&str> {
        let field = self.field(field_name)?;

        field
            .iter()
            .find(|(key, _)| key.ends_with(attribute))
            .map(|(_, value)| value.as_str())
    }
}

pub trait ContentRenderer {
    /// Renders the content for every name, using the resources deployed so far.
    fn render(
        &self,
        names: &[String],
        resources: &ResourceMap,
    ) -> Result<BTreeMap<String, String>, templatise::Error>;
}

impl<F> ContentRenderer for F
where
    F: Fn(&[String], &ResourceMap) -> Result<BTreeMap<String, String>, templatise::Error>,
{
    fn render(
        &self,
        names: &[String],
        resources: &ResourceMap,
    ) -> Result<BTreeMap<String, String>, templatise::Error> {
        self(names, resources)
    }
}

/// Resolves every declared parameter, or fails without a partial list.
///
/// Literal parameters win, then previously deployed resources, then the
/// configuration object. Content parameters are rendered in one batch and
/// appended after all the others.
pub fn resolve<R>(
    declared: &[ParameterDeclaration],
    raw_parameters: &BTreeMap<String, String>,
    config: &ConfigObject,
    previous_resources: &ResourceMap,
    renderer: &R,
) -> Result<Vec<DeployedParameter>, Error>
where
    R: ContentRenderer + ?Sized,
{
    let mut parameters = Vec::with_capacity(declared.len());
    let mut pending_content: Vec<String> = vec![];

    for declaration in declared {
        let name = declaration.name.as_str();

        if let Some(value) = raw_parameters.get(name) {
            debug!(parameter = name, "Bound to literal value");
            parameters.push(DeployedParameter::new(name, value.as_str()));
            continue;
        }

        let decomposition = NameDecomposition::parse(name)?;
        let base_name = decomposition.base_name();

        if decomposition.trailing_attribute == CONTENT_ATTRIBUTE {
            pending_content.push(base_name);
            continue;
        }

        if let Some(value) = previous_resources.get(&base_name) {
            debug!(
                parameter = name,
                resource = base_name.as_str(),
                "Bound to deployed resource"
            );
            parameters.push(DeployedParameter::new(name, value.as_str()));
            continue;
        }

        let field_name = decomposition.field_name();
        let value = config
            .attribute(&field_name, &decomposition.trailing_attribute)
            .ok_or_else(|| Error::UnresolvableParameter(name.to_string()))?;

        debug!(
            parameter = name,
            field = field_name.as_str(),
            "Bound to configuration"
        );
        parameters.push(DeployedParameter::new(name, value));
    }

    if !pending_content.is_empty() {
        let mut rendered = renderer.render(&pending_content, previous_resources)?;

        for base_name in pending_content {
            let key = format!("{}{}", base_name, CONTENT_ATTRIBUTE);
            let content = rendered
                .remove(&base_name)
                .ok_or_else(|| Error::UnresolvableParameter(key.clone()))?;
            parameters.push(DeployedParameter::new(key, content));
        }
    }

    return Ok(parameters);
}
