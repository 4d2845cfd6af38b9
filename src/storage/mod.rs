use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::{EnvironmentStatus, ProvisionResult};

const STATE_FILE: &str = "state.json";

/// What the provisioner remembers about one environment instance.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProvisionState {
    pub fingerprint: String,
    pub status: EnvironmentStatus,
    pub completed_steps: usize,
    pub total_steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ProvisionState {
    pub fn creating(fingerprint: impl Into<String>, total_steps: usize) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            status: EnvironmentStatus::Creating,
            completed_steps: 0,
            total_steps,
            failure: None,
        }
    }
}

/// JSON state file under `<workdir>/<state_dir>/`.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(workdir: &Path, state_dir: &str) -> Self {
        Self {
            dir: workdir.join(state_dir),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub async fn load(&self) -> ProvisionResult<Option<ProvisionState>> {
        let path = self.path();
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Writes through a temporary file so a crash never leaves half a state file behind.
    pub async fn save(&self, state: &ProvisionState) -> ProvisionResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let tmp = self.dir.join(format!("{}.tmp", STATE_FILE));
        fs::write(&tmp, serde_json::to_vec_pretty(state)?).await?;
        fs::rename(&tmp, self.path()).await?;
        Ok(())
    }

    /// Returns whether a state existed.
    pub async fn remove(&self) -> ProvisionResult<bool> {
        let path = self.path();
        if !fs::try_exists(&path).await? {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        Ok(true)
    }
}
