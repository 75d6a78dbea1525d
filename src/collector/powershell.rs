//! PowerShell-backed command runner.
//!
//! Each call imports the forensic module into a fresh PowerShell process
//! and invokes one cmdlet, capturing stdout, stderr and the exit status.

use super::task::escape_double_quoted;
use super::{CollectorError, CommandRunner, ForensicTask, TaskParameters};
use crate::models::TaskResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs forensic cmdlets through a PowerShell executable.
#[derive(Debug, Clone)]
pub struct PowerShellRunner {
    /// Executable to launch (`powershell` or `pwsh`).
    program: String,
    /// Absolute path to the `.psm1` module.
    module_path: PathBuf,
}

impl PowerShellRunner {
    /// Creates a runner, failing if the module file does not exist.
    pub fn new(program: impl Into<String>, module_path: &Path) -> Result<Self, CollectorError> {
        let module_path =
            std::path::absolute(module_path).map_err(|source| CollectorError::InvalidPath {
                path: module_path.to_path_buf(),
                source,
            })?;

        if !module_path.is_file() {
            return Err(CollectorError::ModuleNotFound(module_path));
        }

        let program = program.into();
        info!(
            "Using PowerShell module {} via {}",
            module_path.display(),
            program
        );

        Ok(Self {
            program,
            module_path,
        })
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    /// Builds the script passed to `-Command`.
    pub fn build_script(&self, task: ForensicTask, parameters: &TaskParameters) -> String {
        let module = escape_double_quoted(&self.module_path.to_string_lossy());
        let arguments = parameters.encode();

        let invocation = if arguments.is_empty() {
            task.cmdlet().to_string()
        } else {
            format!("{} {}", task.cmdlet(), arguments)
        };

        format!("Import-Module \"{}\" -Force\n{}", module, invocation)
    }
}

#[async_trait]
impl CommandRunner for PowerShellRunner {
    async fn run(&self, task: ForensicTask, parameters: &TaskParameters) -> TaskResult {
        let script = self.build_script(task, parameters);
        debug!("Running {} with script:\n{}", task, script);

        let output = Command::new(&self.program)
            .args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command"])
            .arg(&script)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to start {}: {}", self.program, e);
                return TaskResult::spawn_failure(format!(
                    "Failed to start {}: {}",
                    self.program, e
                ));
            }
        };

        // Terminated by a signal: no exit code to report.
        let exit_code = output.status.code().unwrap_or(-1);
        let result = TaskResult {
            success: output.status.success(),
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
            error: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        };

        if result.success {
            info!("{} finished ({} bytes of output)", task, result.output.len());
        } else {
            warn!("{} exited with code {}", task, exit_code);
        }

        result
    }
}
