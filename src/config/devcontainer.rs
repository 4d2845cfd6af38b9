use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::parser::{ConfigFormat, ConfigParser, ConfigParserOptions};
use crate::core::{ProvisionError, ProvisionResult};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DevContainerConfig {
    #[serde(rename = "name")]
    pub name: String,

    #[serde(rename = "image")]
    pub image: String,

    #[serde(rename = "customizations", skip_serializing_if = "Option::is_none")]
    pub customizations: Option<CustomizationsConfig>,

    #[serde(rename = "forwardPorts", skip_serializing_if = "Option::is_none")]
    pub forward_ports: Option<Vec<u16>>,

    #[serde(rename = "postCreateCommand", skip_serializing_if = "Option::is_none")]
    pub post_create_command: Option<String>,

    #[serde(rename = "remoteUser", skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,

    /// Keys the provisioner does not interpret, kept so the record survives a round trip.
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CustomizationsConfig {
    #[serde(rename = "vscode", skip_serializing_if = "Option::is_none")]
    pub vscode: Option<VSCodeConfig>,

    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct VSCodeConfig {
    #[serde(rename = "settings", default)]
    pub settings: BTreeMap<String, serde_json::Value>,

    #[serde(rename = "extensions", default)]
    pub extensions: Vec<String>,

    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl DevContainerConfig {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            customizations: None,
            forward_ports: None,
            post_create_command: None,
            remote_user: None,
            other: BTreeMap::new(),
        }
    }

    pub async fn from_file(path: &Path) -> ProvisionResult<Self> {
        let config_str = fs::read_to_string(path).await?;
        Self::from_str(&config_str).map_err(|e| e.at_path(path))
    }

    /// Parses a descriptor. Line comments, block comments and trailing commas are accepted.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ProvisionResult<Self> {
        let options = ConfigParserOptions {
            format: ConfigFormat::JsonC,
            ..Default::default()
        };
        let config: DevContainerConfig = ConfigParser::parse_str(content, options)
            .map_err(|e| ProvisionError::malformed(format!("{:#}", e)))?;

        if !config.other.is_empty() {
            debug!(
                keys = ?config.other.keys().collect::<Vec<_>>(),
                "Descriptor carries keys the provisioner does not interpret"
            );
        }

        Ok(config)
    }

    pub fn to_json_string(&self) -> ProvisionResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Hex SHA-256 of the canonical serialization.
    pub fn fingerprint(&self) -> ProvisionResult<String> {
        let canonical = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&canonical);
        Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    fn vscode(&self) -> Option<&VSCodeConfig> {
        self.customizations.as_ref().and_then(|c| c.vscode.as_ref())
    }

    pub fn settings(&self) -> BTreeMap<String, serde_json::Value> {
        self.vscode().map(|v| v.settings.clone()).unwrap_or_default()
    }

    pub fn extensions(&self) -> &[String] {
        self.vscode().map(|v| v.extensions.as_slice()).unwrap_or(&[])
    }

    pub fn validate(&self, privileged_users: &[String]) -> ProvisionResult<()> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("name must not be empty".to_string());
        }

        if self.image.trim().is_empty() {
            problems.push("image must not be empty".to_string());
        } else if self.image.chars().any(char::is_whitespace) {
            problems.push(format!("image reference '{}' contains whitespace", self.image));
        }

        match self.remote_user.as_deref() {
            None => problems.push("remoteUser must be set".to_string()),
            Some(user) if user.trim().is_empty() => {
                problems.push("remoteUser must not be empty".to_string())
            }
            Some(user) if user.chars().any(char::is_whitespace) => {
                problems.push(format!("remoteUser '{}' contains whitespace", user))
            }
            Some(user) if privileged_users.iter().any(|p| p == user) => {
                problems.push(format!("remoteUser '{}' is a privileged account", user))
            }
            Some(_) => {}
        }

        let mut seen = HashSet::new();
        for extension in self.extensions() {
            if extension.trim().is_empty() {
                problems.push("extension identifiers must not be empty".to_string());
            } else if !seen.insert(extension.as_str()) {
                problems.push(format!("extension '{}' is listed more than once", extension));
            }
        }

        if let Some(ports) = &self.forward_ports {
            if ports.contains(&0) {
                problems.push("forwardPorts must not contain port 0".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ProvisionError::InvalidDescriptor(problems))
        }
    }
}
