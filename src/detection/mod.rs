use std::path::{Path, PathBuf};

use crate::core::{ProvisionError, ProvisionResult};

/// Finds the environment descriptor in a workspace.
#[derive(Debug, Clone)]
pub struct DescriptorLocator {
    pub base_path: PathBuf,
}

impl DescriptorLocator {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Candidate locations, in lookup order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        vec![
            self.base_path.join(".devcontainer").join("devcontainer.json"),
            self.base_path.join(".devcontainer.json"),
        ]
    }

    pub fn locate(&self) -> ProvisionResult<PathBuf> {
        self.candidates()
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| ProvisionError::DescriptorNotFound(self.base_path.clone()))
    }

    /// An explicit path wins; otherwise look in the workspace.
    pub fn resolve(&self, explicit: Option<&Path>) -> ProvisionResult<PathBuf> {
        match explicit {
            Some(path) if path.is_file() => Ok(path.to_path_buf()),
            Some(path) => Err(ProvisionError::DescriptorNotFound(path.to_path_buf())),
            None => self.locate(),
        }
    }
}
