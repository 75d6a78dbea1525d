//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.autoforense.toml` files.

use crate::analysis::Limits;
use crate::collector::task::{DEFAULT_MAX_EVENTS, DEFAULT_THRESHOLD};
use crate::report::ReportFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".autoforense.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// PowerShell collector settings.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Character caps for model input.
    #[serde(default)]
    pub limits: Limits,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Report format.
    #[serde(default)]
    pub format: ReportFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: ReportFormat::default(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reportes")
}

/// LLM model settings.
///
/// The API key is never stored here. It only comes from the command line or
/// the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Gemini model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the Gemini REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Require a pure JSON reply from the model.
    #[serde(default)]
    pub strict_json: bool,

    /// Instruction template prepended to every prompt.
    #[serde(default = "default_prompt_path")]
    pub prompt_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            strict_json: false,
            prompt_path: default_prompt_path(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    300
}

fn default_prompt_path() -> PathBuf {
    PathBuf::from("Prompt.txt")
}

/// Collector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// PowerShell executable.
    #[serde(default = "default_program")]
    pub program: String,

    /// Module exporting the collection cmdlets.
    #[serde(default = "default_module_path")]
    pub module_path: PathBuf,

    /// Default `MaxEvents` for `Get-SuspiciousEvents`.
    #[serde(default = "default_max_events")]
    pub max_events: i64,

    /// Default `Threshold` for `Get-SuspiciousInternetProcesses`.
    #[serde(default = "default_threshold")]
    pub threshold: i64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            module_path: default_module_path(),
            max_events: default_max_events(),
            threshold: default_threshold(),
        }
    }
}

fn default_program() -> String {
    "powershell".to_string()
}

fn default_module_path() -> PathBuf {
    PathBuf::from("FuncionesForenses.psm1")
}

fn default_max_events() -> i64 {
    DEFAULT_MAX_EVENTS
}

fn default_threshold() -> i64 {
    DEFAULT_THRESHOLD
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.clone();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(ref prompt) = args.prompt {
            self.model.prompt_path = prompt.clone();
        }
        if args.strict_json {
            self.model.strict_json = true;
        }

        if let Some(ref module) = args.module {
            self.collector.module_path = module.clone();
        }
        if let Some(max_events) = args.max_events {
            self.collector.max_events = max_events;
        }
        if let Some(threshold) = args.threshold {
            self.collector.threshold = threshold;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
