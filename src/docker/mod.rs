use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::{ImageResolver, ProvisionError, ProvisionResult};

fn pull_error(image: &str, reason: impl Into<String>) -> ProvisionError {
    ProvisionError::ImagePull {
        image: image.to_string(),
        reason: reason.into(),
    }
}

/// Resolves images through the `docker` command line client.
///
/// The binary is looked up on `PATH` at the first image check, not at construction.
#[derive(Debug, Default, Clone)]
pub struct DockerCliResolver {
    binary: Option<PathBuf>,
}

impl DockerCliResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    fn binary(&self, image: &str) -> ProvisionResult<PathBuf> {
        match &self.binary {
            Some(binary) => Ok(binary.clone()),
            None => which::which("docker")
                .map_err(|e| pull_error(image, format!("docker executable not found: {}", e))),
        }
    }

    async fn is_present(&self, binary: &Path, image: &str) -> ProvisionResult<bool> {
        let status = Command::new(binary)
            .args(["image", "inspect", image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| pull_error(image, format!("failed to run {}: {}", binary.display(), e)))?;
        Ok(status.success())
    }
}

#[async_trait]
impl ImageResolver for DockerCliResolver {
    async fn ensure_image(&self, image: &str) -> ProvisionResult<()> {
        let binary = self.binary(image)?;
        if self.is_present(&binary, image).await? {
            debug!(image, "Image already present locally");
            return Ok(());
        }

        info!(image, "Pulling base image");
        let output = Command::new(&binary)
            .args(["pull", image])
            .output()
            .await
            .map_err(|e| pull_error(image, format!("failed to run {}: {}", binary.display(), e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
                .unwrap_or_else(|| format!("docker pull exited with {}", output.status));
            Err(pull_error(image, reason))
        }
    }
}

/// Accepts every image without contacting a container runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipImageCheck;

#[async_trait]
impl ImageResolver for SkipImageCheck {
    async fn ensure_image(&self, image: &str) -> ProvisionResult<()> {
        debug!(image, "Image check skipped");
        Ok(())
    }
}

#[cfg(feature = "docker")]
pub use api::BollardResolver;

#[cfg(feature = "docker")]
mod api {
    use super::*;
    use bollard::{image::CreateImageOptions, Docker};
    use futures_util::StreamExt;

    /// Resolves images through the Docker Engine API.
    pub struct BollardResolver {
        client: Docker,
    }

    impl BollardResolver {
        pub fn new() -> ProvisionResult<Self> {
            let client = Docker::connect_with_local_defaults().map_err(|e| {
                ProvisionError::ConfigError(format!("Failed to connect to Docker daemon: {}", e))
            })?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl ImageResolver for BollardResolver {
        async fn ensure_image(&self, image: &str) -> ProvisionResult<()> {
            if self.client.inspect_image(image).await.is_ok() {
                debug!(image, "Image already present locally");
                return Ok(());
            }

            info!(image, "Pulling base image");
            let options = CreateImageOptions {
                from_image: image,
                ..Default::default()
            };
            let mut pull_stream = self.client.create_image(Some(options), None, None);

            while let Some(pull_result) = pull_stream.next().await {
                let pull_info = pull_result.map_err(|e| pull_error(image, e.to_string()))?;
                if let Some(error) = pull_info.error {
                    return Err(pull_error(image, error));
                }
                if let Some(status) = pull_info.status {
                    debug!(image, "{}", status);
                }
            }

            Ok(())
        }
    }
}
