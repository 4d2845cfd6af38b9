pub mod error;
pub mod types;

pub use error::{ProvisionError, ProvisionResult};
pub use types::{EnvironmentStatus, SessionOutcome};

use async_trait::async_trait;
use std::path::Path;

use crate::provision::plan::Statement;

/// Makes a base image available before an environment is provisioned.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn ensure_image(&self, image: &str) -> ProvisionResult<()>;
}

/// Executes provisioning statements, in order, inside the environment's working directory.
///
/// All statements share one session: directory changes and exported variables
/// carry over to later statements. The session stops at the first failure.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, statements: &[Statement], workdir: &Path) -> ProvisionResult<SessionOutcome>;
}
