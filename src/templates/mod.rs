use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::{CustomizationsConfig, DevContainerConfig, VSCodeConfig};
use crate::core::{ProvisionError, ProvisionResult};

pub const PYTHON_POST_CREATE: &str = "pip install --user -r requirements.txt && pre-commit install";

/// Starting points for new descriptors.
pub struct DescriptorTemplate;

impl DescriptorTemplate {
    /// Python project with black/flake8/mypy/pytest wired into the editor.
    pub fn python(name: &str, image: &str, remote_user: &str) -> DevContainerConfig {
        let mut settings = BTreeMap::new();
        settings.insert("python.defaultInterpreterPath".to_string(), json!("/usr/local/bin/python"));
        settings.insert("python.linting.enabled".to_string(), json!(true));
        settings.insert("python.linting.flake8Enabled".to_string(), json!(true));
        settings.insert("python.linting.flake8Path".to_string(), json!("/usr/local/py-utils/bin/flake8"));
        settings.insert("python.linting.mypyEnabled".to_string(), json!(true));
        settings.insert("python.linting.mypyPath".to_string(), json!("/usr/local/py-utils/bin/mypy"));
        settings.insert("python.formatting.provider".to_string(), json!("black"));
        settings.insert("python.formatting.blackPath".to_string(), json!("/usr/local/py-utils/bin/black"));
        settings.insert("python.testing.pytestEnabled".to_string(), json!(true));
        settings.insert("python.testing.pytestArgs".to_string(), json!(["tests"]));
        settings.insert("editor.formatOnSave".to_string(), json!(true));

        let mut config = DevContainerConfig::new(name, image);
        config.customizations = Some(CustomizationsConfig {
            vscode: Some(VSCodeConfig {
                settings,
                extensions: vec![
                    "ms-python.python".to_string(),
                    "ms-python.vscode-pylance".to_string(),
                ],
                other: BTreeMap::new(),
            }),
            other: BTreeMap::new(),
        });
        config.post_create_command = Some(PYTHON_POST_CREATE.to_string());
        config.remote_user = Some(remote_user.to_string());
        config
    }

    /// Writes a new descriptor; an existing file is never overwritten.
    pub async fn write_new(config: &DevContainerConfig, path: &Path) -> ProvisionResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => ProvisionError::ConfigError(format!(
                    "{} already exists; descriptors are never overwritten",
                    path.display()
                )),
                _ => ProvisionError::IoError(e),
            })?;

        let mut contents = config.to_json_string()?;
        contents.push('\n');
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::ProvisioningPlan;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_python_template_is_valid() {
        let config = DescriptorTemplate::python("Odoo Connect", "python:3.11", "vscode");

        config.validate(&["root".to_string()]).unwrap();
        ProvisioningPlan::from_descriptor(&config)
            .unwrap()
            .check_install_then_hooks()
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_new_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".devcontainer").join("devcontainer.json");
        let config = DescriptorTemplate::python("demo", "python:3.11", "vscode");

        DescriptorTemplate::write_new(&config, &path).await.unwrap();
        let written = DevContainerConfig::from_file(&path).await.unwrap();
        assert_eq!(written, config);

        let err = DescriptorTemplate::write_new(&config, &path).await.unwrap_err();
        assert!(matches!(err, ProvisionError::ConfigError(_)));
    }
}
