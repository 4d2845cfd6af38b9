use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Supported configuration file formats
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigFormat {
    Json,
    JsonC, // JSON with comments
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            Some("jsonc") | Some("json5") => ConfigFormat::JsonC,
            _ => ConfigFormat::Json,
        }
    }
}

/// Configuration parsing options
#[derive(Debug, Clone)]
pub struct ConfigParserOptions {
    pub format: ConfigFormat,
    pub allow_comments: bool,
}

impl Default for ConfigParserOptions {
    fn default() -> Self {
        Self {
            format: ConfigFormat::Json,
            allow_comments: true,
        }
    }
}

pub struct ConfigParser;

impl ConfigParser {
    /// Parse configuration from a file
    pub fn parse_file<T>(path: &Path, options: Option<ConfigParserOptions>) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let options = options.unwrap_or_else(|| ConfigParserOptions {
            format: ConfigFormat::from_path(path),
            ..Default::default()
        });
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        Self::parse_str(&content, options)
    }

    /// Parse configuration from a string
    pub fn parse_str<T>(content: &str, options: ConfigParserOptions) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        match options.format {
            ConfigFormat::Json if !options.allow_comments => {
                serde_json::from_str(content).context("Failed to parse JSON configuration")
            }
            ConfigFormat::Json | ConfigFormat::JsonC => {
                json5::from_str(content).context("Failed to parse JSON5 configuration")
            }
            ConfigFormat::Toml => toml::from_str(content).context("Failed to parse TOML configuration"),
        }
    }

    /// Merge two configuration layers; fields set in `overlay_config` win.
    pub fn merge_configs<T>(base_config: Option<T>, overlay_config: Option<T>) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        match (base_config, overlay_config) {
            (Some(base), Some(overlay)) => {
                let mut base_value = serde_json::to_value(&base)?;
                let overlay_value = serde_json::to_value(&overlay)?;
                json_patch::merge(&mut base_value, &overlay_value);
                Ok(serde_json::from_value(base_value)?)
            }
            (Some(base), None) => Ok(base),
            (None, Some(overlay)) => Ok(overlay),
            (None, None) => Err(anyhow::anyhow!("No configuration provided")),
        }
    }
}

/// Trait for configuration sources
pub trait ConfigSource {
    type Output: DeserializeOwned;

    fn load_config(&self) -> Result<Option<Self::Output>>;
}

/// File-based configuration source. A missing file is not an error.
pub struct FileConfigSource {
    pub path: PathBuf,
    pub options: ConfigParserOptions,
}

impl FileConfigSource {
    pub fn new(path: PathBuf) -> Self {
        let options = ConfigParserOptions {
            format: ConfigFormat::from_path(&path),
            ..Default::default()
        };
        Self { path, options }
    }
}

impl ConfigSource for FileConfigSource {
    type Output = serde_json::Value;

    fn load_config(&self) -> Result<Option<Self::Output>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let config = ConfigParser::parse_file(&self.path, Some(self.options.clone()))
            .with_context(|| format!("Failed to parse config file: {}", self.path.display()))?;

        Ok(Some(config))
    }
}

/// Environment variable configuration source
pub struct EnvConfigSource {
    pub prefix: String,
}

impl EnvConfigSource {
    fn collect<I>(&self, vars: I) -> Option<serde_json::Value>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config_json = serde_json::Map::new();
        for (key, value) in vars {
            if let Some(name) = key.strip_prefix(&self.prefix) {
                if name.is_empty() {
                    continue;
                }
                config_json.insert(name.to_lowercase(), serde_json::Value::String(value));
            }
        }

        if config_json.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(config_json))
        }
    }
}

impl ConfigSource for EnvConfigSource {
    type Output = serde_json::Value;

    fn load_config(&self) -> Result<Option<Self::Output>> {
        Ok(self.collect(std::env::vars()))
    }
}
