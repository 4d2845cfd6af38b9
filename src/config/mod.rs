pub mod devcontainer;
pub mod parser;

pub use devcontainer::{CustomizationsConfig, DevContainerConfig, VSCodeConfig};
pub use parser::{
    ConfigFormat, ConfigParser, ConfigParserOptions, ConfigSource, EnvConfigSource,
    FileConfigSource,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "DEVPROV_";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageCheckMode {
    Docker,
    Skip,
}

/// Settings of the provisioner itself, as opposed to the descriptor it reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvisionerSettings {
    pub log_level: String,
    pub shell: String,
    /// Directory, relative to the workdir, holding the run-once state.
    pub state_dir: String,
    pub image_check: ImageCheckMode,
    pub privileged_users: Vec<String>,
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            shell: "/bin/sh".to_string(),
            state_dir: ".devprov".to_string(),
            image_check: ImageCheckMode::Docker,
            privileged_users: vec!["root".to_string()],
        }
    }
}

impl ProvisionerSettings {
    /// Defaults, then the user config file, then `DEVPROV_*` variables.
    pub fn load() -> Result<Self> {
        let file = Self::config_path().map(FileConfigSource::new);
        let env = EnvConfigSource {
            prefix: ENV_PREFIX.to_string(),
        };
        Self::from_sources(file.as_ref(), &env)
    }

    pub fn from_sources<F, E>(file: Option<&F>, env: &E) -> Result<Self>
    where
        F: ConfigSource<Output = serde_json::Value>,
        E: ConfigSource<Output = serde_json::Value>,
    {
        let defaults = serde_json::to_value(Self::default())?;

        let file_value = match file {
            Some(file) => file.load_config()?,
            None => None,
        };
        let layered = ConfigParser::merge_configs(Some(defaults), file_value)?;

        let env_value = env.load_config()?.map(Self::known_overrides);
        let layered = ConfigParser::merge_configs(Some(layered), env_value)?;

        serde_json::from_value(layered).context("Invalid provisioner settings")
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("devprov").join("config.toml"))
    }

    /// Environment values are plain strings; keep only the keys they can set.
    fn known_overrides(env_value: serde_json::Value) -> serde_json::Value {
        let mut overrides = serde_json::Map::new();
        if let serde_json::Value::Object(vars) = env_value {
            for (key, value) in vars {
                match key.as_str() {
                    "log_level" | "shell" | "state_dir" | "image_check" => {
                        overrides.insert(key, value);
                    }
                    "privileged_users" => {
                        let users: Vec<serde_json::Value> = value
                            .as_str()
                            .unwrap_or_default()
                            .split(',')
                            .map(str::trim)
                            .filter(|u| !u.is_empty())
                            .map(|u| serde_json::Value::String(u.to_string()))
                            .collect();
                        overrides.insert(key, serde_json::Value::Array(users));
                    }
                    _ => {}
                }
            }
        }
        serde_json::Value::Object(overrides)
    }
}
