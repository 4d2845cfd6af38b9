use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

use crate::core::{CommandRunner, ProvisionError, ProvisionResult, SessionOutcome};
use crate::provision::plan::Statement;

const MARKERS_VAR: &str = "DEVPROV_STEP_MARKERS";
const STATUS_VAR: &str = "__devprov_status";

/// Runs every statement in a single `<shell> -c` session, inheriting the terminal.
///
/// After each statement the session checks its exit status and appends the
/// statement index to a marker file, which is how completed steps are counted.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("/bin/sh")
    }
}

fn session_script(statements: &[Statement]) -> String {
    let mut script = String::new();
    for statement in statements {
        script.push_str(&statement.text);
        script.push('\n');
        script.push_str(&format!(
            "{status}=$?; [ \"${status}\" -eq 0 ] || exit \"${status}\"\n",
            status = STATUS_VAR
        ));
        script.push_str(&format!(
            "printf '%s\\n' {} >> \"${}\"\n",
            statement.index, MARKERS_VAR
        ));
    }
    script
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, statements: &[Statement], workdir: &Path) -> ProvisionResult<SessionOutcome> {
        let markers = tempfile::NamedTempFile::new()?;
        let script = session_script(statements);
        debug!(shell = %self.shell, workdir = %workdir.display(), "Session script:\n{}", script);

        let start = Instant::now();
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(&script)
            .current_dir(workdir)
            .env(MARKERS_VAR, markers.path())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                ProvisionError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to spawn {}: {}", self.shell, e),
                ))
            })?;

        let recorded = tokio::fs::read_to_string(markers.path()).await?;
        let completed = recorded.lines().filter(|l| !l.trim().is_empty()).count();

        Ok(SessionOutcome {
            completed,
            exit_code: status.code(),
            duration: start.elapsed(),
        })
    }
}
