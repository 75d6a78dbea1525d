//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::collector::ForensicTask;
use crate::report::ReportFormat;
use clap::Parser;
use std::path::PathBuf;

/// AutoForense - AI-assisted forensic collection for Windows
///
/// Runs the routines of a forensic PowerShell module, optionally sends
/// their output to Google Gemini for analysis, and writes PDF reports.
/// Without --task or --full an interactive menu is shown.
///
/// Examples:
///   autoforense
///   autoforense --task unsigned
///   autoforense --task events --max-events 500 --analyze
///   autoforense --full --format markdown --output-dir ./casos
///   autoforense --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .autoforense.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// PowerShell module exporting the forensic cmdlets
    #[arg(long, value_name = "FILE", env = "AUTOFORENSE_MODULE")]
    pub module: Option<PathBuf>,

    /// Directory where reports are written
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report format (pdf, markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ReportFormat>,

    /// Gemini model to use for analysis
    #[arg(short, long, env = "AUTOFORENSE_MODEL")]
    pub model: Option<String>,

    /// Google API key for Gemini
    ///
    /// Without a key the tool still runs collections, but AI analysis is disabled.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Instruction template prepended to every prompt
    #[arg(long, value_name = "FILE")]
    pub prompt: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Require the model to reply with a JSON object only
    #[arg(long)]
    pub strict_json: bool,

    /// Run a single collection task and exit
    ///
    /// Accepts a cmdlet name (Get-UnsignedProcesses) or an alias:
    /// events, internet, unsigned, suspicious-ips, full.
    #[arg(short, long, value_name = "TASK")]
    pub task: Option<String>,

    /// Analyze the --task output with AI and write a report
    #[arg(short, long)]
    pub analyze: bool,

    /// Run the full pipeline (collect, analyze, consolidated report) and exit
    #[arg(long)]
    pub full: bool,

    /// MaxEvents for Get-SuspiciousEvents
    #[arg(long, value_name = "COUNT")]
    pub max_events: Option<i64>,

    /// Threshold (0-100) for Get-SuspiciousInternetProcesses
    #[arg(long, value_name = "SCORE")]
    pub threshold: Option<i64>,

    /// CSV path passed as -OutputPath to routines that save their own report
    #[arg(long, value_name = "FILE")]
    pub routine_output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .autoforense.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(max_events) = self.max_events {
            if max_events < 1 {
                return Err("Max events must be at least 1".to_string());
            }
        }

        if let Some(threshold) = self.threshold {
            if !(0..=100).contains(&threshold) {
                return Err("Threshold must be between 0 and 100".to_string());
            }
        }

        if let Some(ref task) = self.task {
            task.parse::<ForensicTask>()?;

            if self.full {
                return Err("Cannot use both --task and --full".to_string());
            }
        } else if self.analyze {
            return Err("--analyze requires --task".to_string());
        }

        Ok(())
    }

    /// The task selected with `--task`, if any.
    pub fn selected_task(&self) -> Option<ForensicTask> {
        self.task.as_deref().and_then(|t| t.parse().ok())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
