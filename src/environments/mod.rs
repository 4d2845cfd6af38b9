use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{DevContainerConfig, ProvisionerSettings};
use crate::core::{CommandRunner, EnvironmentStatus, ImageResolver, ProvisionError, ProvisionResult};
use crate::provision::{ProvisionReport, Provisioner, ProvisioningPlan};
use crate::storage::{ProvisionState, StateStore};

#[derive(Debug, Clone, PartialEq)]
pub enum BringUpOutcome {
    Provisioned(ProvisionReport),
    /// The same descriptor was already provisioned in this environment.
    AlreadyProvisioned,
}

/// Brings an environment up from its descriptor: parse, validate, check the
/// image, then run the provisioning plan exactly once.
pub struct EnvironmentManager {
    settings: Arc<ProvisionerSettings>,
    images: Arc<dyn ImageResolver>,
    provisioner: Provisioner,
}

impl EnvironmentManager {
    pub fn new(
        settings: Arc<ProvisionerSettings>,
        images: Arc<dyn ImageResolver>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            settings,
            images,
            provisioner: Provisioner::new(runner),
        }
    }

    fn store(&self, workdir: &Path) -> StateStore {
        StateStore::new(workdir, &self.settings.state_dir)
    }

    /// Parses and validates a descriptor and derives its plan without running anything.
    pub async fn prepare(&self, descriptor: &Path) -> ProvisionResult<(DevContainerConfig, ProvisioningPlan)> {
        let config = DevContainerConfig::from_file(descriptor).await?;
        config.validate(&self.settings.privileged_users)?;
        let plan = ProvisioningPlan::from_descriptor(&config)?;
        Ok((config, plan))
    }

    pub async fn bring_up(&self, descriptor: &Path, workdir: &Path) -> ProvisionResult<BringUpOutcome> {
        let (config, plan) = self.prepare(descriptor).await?;
        let fingerprint = config.fingerprint()?;
        let store = self.store(workdir);

        if let Some(state) = store.load().await? {
            if state.fingerprint != fingerprint {
                return Err(ProvisionError::DescriptorChanged {
                    recorded: state.fingerprint,
                    found: fingerprint,
                });
            }
            match state.status {
                EnvironmentStatus::Provisioned => {
                    info!(name = %config.name, "Environment already provisioned; nothing to do");
                    return Ok(BringUpOutcome::AlreadyProvisioned);
                }
                _ => {
                    return Err(ProvisionError::PartiallyProvisioned {
                        completed: state.completed_steps,
                        total: state.total_steps,
                    });
                }
            }
        }

        info!(name = %config.name, image = %config.image, "Checking base image");
        self.images.ensure_image(&config.image).await?;

        let mut state = ProvisionState::creating(fingerprint, plan.len());
        store.save(&state).await?;

        info!(
            name = %config.name,
            steps = plan.len(),
            remote_user = config.remote_user.as_deref().unwrap_or_default(),
            "Provisioning environment"
        );

        match self.provisioner.run(&plan, workdir).await {
            Ok(report) => {
                state.status = EnvironmentStatus::Provisioned;
                state.completed_steps = report.completed.len();
                store.save(&state).await?;
                Ok(BringUpOutcome::Provisioned(report))
            }
            Err(e) => {
                let completed = match &e {
                    ProvisionError::StepFailed { index, .. } => *index,
                    _ => 0,
                };
                state.status = if completed > 0 {
                    EnvironmentStatus::PartiallyProvisioned
                } else {
                    EnvironmentStatus::Failed
                };
                state.completed_steps = completed;
                state.failure = Some(e.to_string());
                if let Err(save_err) = store.save(&state).await {
                    warn!("Could not record provisioning failure: {}", save_err);
                }
                Err(e)
            }
        }
    }

    pub async fn status(&self, workdir: &Path) -> ProvisionResult<Option<ProvisionState>> {
        self.store(workdir).load().await
    }

    /// Forgets the environment instance so the next bring-up starts from scratch.
    pub async fn reset(&self, workdir: &Path) -> ProvisionResult<bool> {
        self.store(workdir).remove().await
    }

    pub fn state_path(&self, workdir: &Path) -> PathBuf {
        self.store(workdir).path()
    }
}
