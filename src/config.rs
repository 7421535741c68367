use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, io, path::Path, path::PathBuf, time::Duration};
use validator::{Validate, ValidationError};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Missing parameter {0}")]
    MissingParameter(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StackDescriptor {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(custom = "validate_template_file")]
    pub template: PathBuf,

    /// Literal values for declared parameters, bound before any lookup.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FlowSettings {
    #[validate(length(min = 1))]
    pub names: Vec<String>,

    /// The flow the private number is associated with during setup.
    #[validate(length(min = 1))]
    pub inbound: String,

    pub export_directory: PathBuf,

    pub content_directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WaitPolicy {
    pub delay_seconds: u64,

    #[validate(range(min = 1))]
    pub max_attempts: u32,
}

impl WaitPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }
}

impl Default for WaitPolicy {
    // 5 minutes
    fn default() -> Self {
        return Self {
            delay_seconds: 5,
            max_attempts: 60,
        };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSettings {
    #[serde(default)]
    pub create: WaitPolicy,

    #[serde(default)]
    pub update: WaitPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeployConfig {
    pub region: Option<String>,

    pub flows: FlowSettings,

    #[validate(length(min = 1))]
    pub routing_profile: String,

    #[validate(length(min = 1))]
    pub stacks: Vec<StackDescriptor>,

    #[serde(default)]
    pub wait: WaitSettings,
}

pub fn parse(path: &PathBuf) -> Result<DeployConfig, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let config: DeployConfig = match serde_yaml::from_str(&contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    validate(&config)?;

    return Ok(config);
}

fn validate(config: &DeployConfig) -> Result<(), Error> {
    let validation_error =
        |error: validator::ValidationErrors| Error::ValidationError(error.to_string());

    config.validate().map_err(validation_error)?;
    config.flows.validate().map_err(validation_error)?;
    config.wait.create.validate().map_err(validation_error)?;
    config.wait.update.validate().map_err(validation_error)?;
    for stack in &config.stacks {
        stack.validate().map_err(validation_error)?;
    }

    if !config.flows.names.contains(&config.flows.inbound) {
        return Err(Error::ValidationError(format!(
            "inbound flow {} is not one of the configured flows",
            config.flows.inbound
        )));
    }

    return Ok(());
}

fn validate_template_file(template: &PathBuf) -> Result<(), ValidationError> {
    let file_extension = match template.extension() {
        Some(extension) => extension,
        None => {
            return Err(ValidationError::new(
                "Unable to parse the extension of the template file location",
            ))
        }
    };
    if file_extension != "yaml" && file_extension != "yml" && file_extension != "json" {
        return Err(ValidationError::new(
            "The template file location has to end with `.yaml`, `.yml` or `.json`",
        ));
    }

    return Ok(());
}

/// Operator supplied values read from a `.env` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub instance_alias: String,
    pub private_number: String,
    pub public_number: String,
    pub agent_username: Option<String>,
    pub default_routing_profile: Option<String>,

    /// Every entry of the file, used as literal stack parameters.
    pub raw: BTreeMap<String, String>,
}

impl Parameters {
    pub fn from_map(raw: BTreeMap<String, String>) -> Result<Self, Error> {
        let required = |name: &str| {
            raw.get(name)
                .cloned()
                .ok_or_else(|| Error::MissingParameter(name.to_string()))
        };

        let instance_alias = required("InstanceAlias")?;
        let private_number = required("PrivateNumber")?;
        let public_number = required("PublicNumber")?;

        return Ok(Self {
            instance_alias,
            private_number,
            public_number,
            agent_username: raw.get("AgentUsername").cloned(),
            default_routing_profile: raw.get("DefaultRoutingProfile").cloned(),
            raw,
        });
    }

    pub fn agent_username(&self) -> Result<&str, Error> {
        self.agent_username
            .as_deref()
            .ok_or_else(|| Error::MissingParameter("AgentUsername".to_string()))
    }

    pub fn default_routing_profile(&self) -> Result<&str, Error> {
        self.default_routing_profile
            .as_deref()
            .ok_or_else(|| Error::MissingParameter("DefaultRoutingProfile".to_string()))
    }
}

pub fn read_parameters(path: &Path) -> Result<Parameters, Error> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => Ok(entries),
        Err(dotenvy::Error::Io(error)) if error.kind() == io::ErrorKind::NotFound => {
            Err(Error::FileNotFound(path.display().to_string()))
        }
        Err(error) => Err(Error::Unknown(error.to_string())),
    }?;

    let mut raw = BTreeMap::new();
    for entry in entries {
        let (key, value) = entry.map_err(|error| Error::ParsingError(error.to_string()))?;
        raw.insert(key, value);
    }

    return Parameters::from_map(raw);
}
