pub mod plan;
pub mod runner;

pub use plan::{ProvisioningPlan, Statement, StepKind};
pub use runner::ShellRunner;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::core::{CommandRunner, ProvisionError, ProvisionResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionReport {
    pub completed: Vec<Statement>,
    pub duration: Duration,
}

impl ProvisionReport {
    pub fn total_duration(&self) -> Duration {
        self.duration
    }
}

/// Runs a plan in order and stops at the first failure.
///
/// There is no retry and no rollback: steps that already ran stay applied.
pub struct Provisioner {
    runner: Arc<dyn CommandRunner>,
}

impl Provisioner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn run(&self, plan: &ProvisioningPlan, workdir: &Path) -> ProvisionResult<ProvisionReport> {
        let statements = plan.statements();
        let Some(first) = statements.first() else {
            return Ok(ProvisionReport::default());
        };

        for statement in statements {
            info!(step = statement.index + 1, total = statements.len(), kind = %statement.kind, "Queued: {}", statement.text);
        }

        let outcome = match self.runner.run(statements, workdir).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Could not start provisioning session: {}", e);
                return Err(ProvisionError::StepFailed {
                    index: first.index,
                    statement: first.text.clone(),
                    exit_code: None,
                });
            }
        };

        let completed = outcome.completed.min(statements.len());
        if outcome.success() && completed == statements.len() {
            info!(steps = completed, elapsed = ?outcome.duration, "Provisioning finished");
            return Ok(ProvisionReport {
                completed: statements.to_vec(),
                duration: outcome.duration,
            });
        }

        // A session that exits early with status 0 still leaves the remaining steps unrun.
        let failed = &statements[completed.min(statements.len() - 1)];
        error!(
            step = failed.index + 1,
            exit_code = ?outcome.exit_code,
            "Provisioning step failed; remaining steps skipped"
        );
        Err(ProvisionError::StepFailed {
            index: failed.index,
            statement: failed.text.clone(),
            exit_code: outcome.exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every statement it is asked to run and fails the ones listed.
    #[derive(Default)]
    struct ScriptedRunner {
        invoked: Mutex<Vec<String>>,
        failing: Vec<usize>,
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, statements: &[Statement], _workdir: &Path) -> ProvisionResult<SessionOutcome> {
            let mut completed = 0;
            for statement in statements {
                self.invoked.lock().unwrap().push(statement.text.clone());
                if self.failing.contains(&statement.index) {
                    return Ok(SessionOutcome {
                        completed,
                        exit_code: Some(1),
                        duration: Duration::from_millis(5),
                    });
                }
                completed += 1;
            }
            Ok(SessionOutcome {
                completed,
                exit_code: Some(0),
                duration: Duration::from_millis(10),
            })
        }
    }

    fn reference_plan() -> ProvisioningPlan {
        ProvisioningPlan::from_command("pip install --user -r requirements.txt && pre-commit install")
            .unwrap()
    }

    #[tokio::test]
    async fn test_statements_run_in_order() {
        let runner = Arc::new(ScriptedRunner::default());
        let provisioner = Provisioner::new(runner.clone());

        let report = provisioner
            .run(&reference_plan(), Path::new("."))
            .await
            .unwrap();

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.total_duration(), Duration::from_millis(10));
        assert_eq!(
            *runner.invoked.lock().unwrap(),
            vec!["pip install --user -r requirements.txt", "pre-commit install"]
        );
    }

    #[tokio::test]
    async fn test_first_failure_skips_the_rest() {
        let runner = Arc::new(ScriptedRunner {
            failing: vec![0],
            ..Default::default()
        });
        let provisioner = Provisioner::new(runner.clone());

        let err = provisioner
            .run(&reference_plan(), Path::new("."))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::StepFailed { index: 0, exit_code: Some(1), .. }
        ));
        assert_eq!(runner.invoked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_plan_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::default());
        let provisioner = Provisioner::new(runner.clone());

        let report = provisioner
            .run(&ProvisioningPlan::default(), Path::new("."))
            .await
            .unwrap();

        assert!(report.completed.is_empty());
        assert!(runner.invoked.lock().unwrap().is_empty());
    }

    struct EarlyExitRunner;

    #[async_trait]
    impl CommandRunner for EarlyExitRunner {
        async fn run(&self, _statements: &[Statement], _workdir: &Path) -> ProvisionResult<SessionOutcome> {
            Ok(SessionOutcome {
                completed: 1,
                exit_code: Some(0),
                duration: Duration::ZERO,
            })
        }
    }

    #[tokio::test]
    async fn test_session_ending_early_is_a_failure() {
        let provisioner = Provisioner::new(Arc::new(EarlyExitRunner));

        let err = provisioner
            .run(&reference_plan(), Path::new("."))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::StepFailed { index: 1, exit_code: Some(0), .. }
        ));
    }
}
