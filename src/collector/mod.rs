//! Forensic collection routines.
//!
//! This module names the PowerShell routines the tool can run, encodes
//! their parameters, and executes them through a [`CommandRunner`].

pub mod powershell;
pub mod task;

pub use powershell::PowerShellRunner;
pub use task::{ForensicTask, ParamValue, TaskParameters};

use crate::models::TaskResult;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while setting up a runner.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("PowerShell module not found at: {}", .0.display())]
    ModuleNotFound(PathBuf),

    #[error("Cannot resolve module path {}: {source}", .path.display())]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Executes a named collection routine and captures its output.
///
/// Implementations never interpret the captured text and never fail:
/// problems are reported through [`TaskResult::success`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, task: ForensicTask, parameters: &TaskParameters) -> TaskResult;
}
