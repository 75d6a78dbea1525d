//! AutoForense - AI-assisted forensic collection for Windows
//!
//! A CLI tool that runs the routines of a forensic PowerShell module,
//! sends their output to Google Gemini for analysis, and writes PDF
//! reports of the findings.
//!
//! Exit codes:
//!   0 - Success, or the interactive menu was left normally
//!   1 - Startup error (arguments, config, module not found) or a failed
//!       --task / --full run

mod analysis;
mod cli;
mod collector;
mod config;
mod llm;
mod menu;
mod models;
mod pipeline;
mod report;

use analysis::{ForensicAnalyzer, SystemPrompt};
use anyhow::{Context, Result};
use cli::Args;
use collector::PowerShellRunner;
use config::{Config, DEFAULT_CONFIG_FILE};
use llm::{GeminiClient, GeminiConfig};
use menu::Session;
use pipeline::Capabilities;
use report::ReportRenderer;
use tokio::io::BufReader;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const BANNER: &str = r"
    _         _        _____
   / \  _   _| |_ ___ |  ___|__  _ __ ___ _ __  ___  ___
  / _ \| | | | __/ _ \| |_ / _ \| '__/ _ \ '_ \/ __|/ _ \
 / ___ \ |_| | || (_) |  _| (_) | | |  __/ | | \__ \  __/
/_/   \_\__,_|\__\___/|_|  \___/|_|  \___|_| |_|___/\___|
";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("AutoForense v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("AutoForense failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .autoforense.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   The API key is not stored there; set GOOGLE_API_KEY instead.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected mode. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    if !args.quiet {
        println!("\x1b[32m{}\x1b[0m", BANNER);
    }

    let runner = PowerShellRunner::new(&config.collector.program, &config.collector.module_path)
        .context("Cannot load the forensic PowerShell module")?;
    println!("✓ Módulo PowerShell cargado: {}", runner.module_path().display());

    let capabilities = build_capabilities(&args, &config);
    match capabilities.analyzer() {
        Ok(analyzer) => println!("✓ Análisis con IA disponible ({})", analyzer.model_name()),
        Err(reason) => println!("✗ Análisis con IA no disponible: {}", reason),
    }
    println!();

    let renderer = ReportRenderer::new(config.general.output_dir.clone(), config.general.format);
    info!(
        "Reports go to {} as {:?}",
        renderer.output_dir().display(),
        config.general.format
    );

    let session = Session {
        runner: &runner,
        capabilities: &capabilities,
        renderer: &renderer,
        max_events: config.collector.max_events,
        threshold: config.collector.threshold,
        routine_output: args
            .routine_output
            .as_ref()
            .map(|p| p.display().to_string()),
    };

    if args.full {
        let ok = session.run_full_pipeline().await;
        return Ok(exit_code(ok));
    }

    if let Some(task) = args.selected_task() {
        let parameters = session.parameters(
            task,
            config.collector.max_events,
            config.collector.threshold,
            args.analyze,
        );
        let ok = if args.analyze {
            session.run_analysis(task, &parameters).await
        } else {
            session.run_collection(task, &parameters).await
        };
        return Ok(exit_code(ok));
    }

    let mut stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = session.run_menu(&mut stdin) => {
            result.context("Failed to read from standard input")?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nSaliendo...");
        }
    }

    Ok(0)
}

fn exit_code(ok: bool) -> i32 {
    if ok {
        0
    } else {
        1
    }
}

/// Create the analyzer, or record why AI analysis is unavailable.
fn build_capabilities(args: &Args, config: &Config) -> Capabilities {
    let gemini_config = GeminiConfig {
        api_url: config.model.api_url.clone(),
        model: config.model.name.clone(),
        api_key: args.api_key.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
        json_response: config.model.strict_json,
    };

    match GeminiClient::new(gemini_config) {
        Ok(client) => {
            let analyzer = ForensicAnalyzer::new(
                Box::new(client),
                SystemPrompt::load(&config.model.prompt_path),
                config.limits,
            )
            .with_strict_json(config.model.strict_json)
            .with_progress(!args.quiet);
            Capabilities::with_analyzer(analyzer)
        }
        Err(e) => {
            warn!("AI analysis disabled: {}", e);
            Capabilities::collection_only(e.to_string())
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
