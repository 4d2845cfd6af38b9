use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnvironmentStatus {
    Creating,
    Provisioned,
    PartiallyProvisioned,
    Failed,
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentStatus::Creating => write!(f, "Creating"),
            EnvironmentStatus::Provisioned => write!(f, "Provisioned"),
            EnvironmentStatus::PartiallyProvisioned => write!(f, "Partially provisioned"),
            EnvironmentStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Result of running a plan's statements in one shell session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Statements that ran to completion, counted from the start of the plan.
    pub completed: usize,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl SessionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
