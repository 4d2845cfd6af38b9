use anyhow::Result;
use async_trait::async_trait;
use dev_env_provisioner::{
    config::{DevContainerConfig, ProvisionerSettings},
    core::{CommandRunner, EnvironmentStatus, ProvisionError, ProvisionResult, SessionOutcome},
    docker::SkipImageCheck,
    environments::{BringUpOutcome, EnvironmentManager},
    provision::{ProvisioningPlan, ShellRunner, Statement, StepKind},
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const FIXTURE: &str = include_str!("fixtures/devcontainer.json");
const MALFORMED: &str = include_str!("fixtures/malformed.json");

/// Records statements instead of executing them.
#[derive(Default)]
struct RecordingRunner {
    invoked: Mutex<Vec<String>>,
    fail_first: bool,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, statements: &[Statement], _workdir: &Path) -> ProvisionResult<SessionOutcome> {
        let mut completed = 0;
        for statement in statements {
            self.invoked.lock().unwrap().push(statement.text.clone());
            if self.fail_first && statement.index == 0 {
                return Ok(SessionOutcome {
                    completed,
                    exit_code: Some(1),
                    duration: Duration::ZERO,
                });
            }
            completed += 1;
        }
        Ok(SessionOutcome {
            completed,
            exit_code: Some(0),
            duration: Duration::ZERO,
        })
    }
}

fn workspace(descriptor: &str) -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let path = dir.path().join(".devcontainer").join("devcontainer.json");
    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(&path, descriptor)?;
    Ok((dir, path))
}

fn manager(runner: Arc<dyn CommandRunner>) -> EnvironmentManager {
    EnvironmentManager::new(
        Arc::new(ProvisionerSettings::default()),
        Arc::new(SkipImageCheck),
        runner,
    )
}

/// Descriptor parsing and the properties every valid descriptor must hold
mod descriptor_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixture_round_trips() -> Result<()> {
        let parsed = DevContainerConfig::from_str(FIXTURE)?;
        let reparsed = DevContainerConfig::from_str(&parsed.to_json_string()?)?;

        assert_eq!(parsed, reparsed);
        assert_eq!(parsed.forward_ports, None);
        assert_eq!(
            parsed.extensions(),
            ["ms-python.python", "ms-python.vscode-pylance"]
        );
        Ok(())
    }

    #[test]
    fn test_remote_user_is_unprivileged() -> Result<()> {
        let parsed = DevContainerConfig::from_str(FIXTURE)?;
        let user = parsed.remote_user.as_deref().unwrap_or_default();

        assert!(!user.is_empty());
        assert_ne!(user, "root");
        parsed.validate(&ProvisionerSettings::default().privileged_users)?;
        Ok(())
    }

    #[test]
    fn test_post_create_command_is_install_then_hooks() -> Result<()> {
        let parsed = DevContainerConfig::from_str(FIXTURE)?;
        let plan = ProvisioningPlan::from_descriptor(&parsed)?;

        let kinds: Vec<&StepKind> = plan.statements().iter().map(|s| &s.kind).collect();
        assert_eq!(
            kinds,
            vec![&StepKind::PackageInstall { user_scoped: true }, &StepKind::HookInstall]
        );
        assert!(plan.statements().iter().all(|s| !s.text.is_empty()));
        plan.check_install_then_hooks()?;
        Ok(())
    }

    #[test]
    fn test_malformed_fixture_yields_no_plan() {
        let err = DevContainerConfig::from_str(MALFORMED).unwrap_err();
        assert!(matches!(err, ProvisionError::MalformedDescriptor { .. }));
    }
}

/// End-to-end bring-up through the public manager
mod bring_up_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_statements_run_strictly_in_order() -> Result<()> {
        let (dir, descriptor) = workspace(FIXTURE)?;
        let runner = Arc::new(RecordingRunner::default());

        let outcome = manager(runner.clone()).bring_up(&descriptor, dir.path()).await?;

        assert!(matches!(outcome, BringUpOutcome::Provisioned(_)));
        assert_eq!(
            *runner.invoked.lock().unwrap(),
            vec![
                "pip3 install --user -r requirements.txt".to_string(),
                "pre-commit install".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_install_never_invokes_hooks() -> Result<()> {
        let (dir, descriptor) = workspace(FIXTURE)?;
        let runner = Arc::new(RecordingRunner {
            fail_first: true,
            ..Default::default()
        });
        let manager = manager(runner.clone());

        let err = manager.bring_up(&descriptor, dir.path()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::StepFailed { index: 0, .. }));
        assert_eq!(runner.invoked.lock().unwrap().len(), 1);
        let state = manager.status(dir.path()).await?.expect("state recorded");
        assert_eq!(state.status, EnvironmentStatus::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_descriptor_executes_nothing() -> Result<()> {
        let (dir, descriptor) = workspace(MALFORMED)?;
        let runner = Arc::new(RecordingRunner::default());

        let err = manager(runner.clone())
            .bring_up(&descriptor, dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::MalformedDescriptor { .. }));
        assert!(runner.invoked.lock().unwrap().is_empty());
        Ok(())
    }
}

/// Real shell execution
#[cfg(unix)]
mod shell_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn descriptor_with(command: &str) -> String {
        serde_json::json!({
            "name": "shell",
            "image": "alpine:3",
            "postCreateCommand": command,
            "remoteUser": "dev"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_shell_steps_run_in_workdir_in_order() -> Result<()> {
        let (dir, descriptor) = workspace(&descriptor_with("echo one >> log; echo two >> log"))?;

        manager(Arc::new(ShellRunner::default()))
            .bring_up(&descriptor, dir.path())
            .await?;

        let log = std::fs::read_to_string(dir.path().join("log"))?;
        assert_eq!(log, "one\ntwo\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_shell_session_keeps_directory_and_environment() -> Result<()> {
        let (dir, descriptor) = workspace(&descriptor_with(
            "cd sub && export STEP_NOTE=kept && echo \"$STEP_NOTE\" > marker",
        ))?;
        std::fs::create_dir(dir.path().join("sub"))?;

        manager(Arc::new(ShellRunner::default()))
            .bring_up(&descriptor, dir.path())
            .await?;

        assert_eq!(std::fs::read_to_string(dir.path().join("sub").join("marker"))?, "kept\n");
        assert!(!dir.path().join("marker").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_shell_failure_stops_sequence() -> Result<()> {
        let (dir, descriptor) = workspace(&descriptor_with("touch first && exit 7 && touch second"))?;
        let manager = manager(Arc::new(ShellRunner::default()));

        let err = manager.bring_up(&descriptor, dir.path()).await.unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::StepFailed { index: 1, exit_code: Some(7), .. }
        ));
        assert!(dir.path().join("first").exists());
        assert!(!dir.path().join("second").exists());

        let state = manager.status(dir.path()).await?.expect("state recorded");
        assert_eq!(state.status, EnvironmentStatus::PartiallyProvisioned);
        assert_eq!((state.completed_steps, state.total_steps), (1, 3));
        Ok(())
    }
}
