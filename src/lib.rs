//! Reads development-environment descriptors (`devcontainer.json`) and runs
//! their one-shot post-create provisioning sequence.

pub mod cli;
pub mod config;
pub mod core;
pub mod detection;
pub mod docker;
pub mod environments;
pub mod provision;
pub mod storage;
pub mod templates;

pub use crate::config::{DevContainerConfig, ProvisionerSettings};
pub use crate::core::{ProvisionError, ProvisionResult};
pub use crate::environments::{BringUpOutcome, EnvironmentManager};
pub use crate::provision::{ProvisioningPlan, Provisioner};
