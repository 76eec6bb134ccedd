//! Stepwright CLI - Main Entry Point

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use stepwright_cli::output::{self, OutputFormat, StepDefinitionRow};
use stepwright_cli::{exit_code, select_scenarios, steps};
use stepwright_core::{Feature, PlaywrightDriver, RunConfig, Runner, Scenario};

/// Stepwright - BDD scenarios against a real browser
#[derive(Parser)]
#[command(name = "stepwright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(long, default_value = "stepwright.toml", env = "STEPWRIGHT_CONFIG", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios
    Run(RunArgs),

    /// List scenarios found in the features directory
    List(SelectArgs),

    /// List registered step patterns
    Steps,

    /// Show version information
    Version,
}

#[derive(Args)]
struct SelectArgs {
    /// Directory containing .feature files
    #[arg(long, env = "STEPWRIGHT_FEATURES")]
    features: Option<PathBuf>,

    /// Only scenarios with this tag
    #[arg(short, long)]
    tag: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    select: SelectArgs,

    /// Only the scenario with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Browser engine: chromium, firefox or edge
    #[arg(short, long, env = "STEPWRIGHT_BROWSER")]
    browser: Option<String>,

    /// Directory for run-report.json
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Node binary used for the Playwright bridge
    #[arg(long, env = "STEPWRIGHT_NODE")]
    node: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            2
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    let mut config = RunConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Run(args) => run(args, config, cli.format).await,
        Commands::List(args) => {
            if let Some(dir) = &args.features {
                config.features_dir = dir.clone();
            }
            let scenarios = select_scenarios(&load_scenarios(&config)?, args.tag.as_deref(), None);
            output::print_list(&scenarios, cli.format);
            Ok(0)
        }
        Commands::Steps => {
            let registry = steps::registry()?;
            let rows: Vec<StepDefinitionRow> =
                registry.definitions().iter().map(StepDefinitionRow::from).collect();
            output::print_list(&rows, cli.format);
            Ok(0)
        }
        Commands::Version => {
            println!("Stepwright CLI v{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

async fn run(args: RunArgs, mut config: RunConfig, format: OutputFormat) -> anyhow::Result<i32> {
    if let Some(dir) = args.select.features {
        config.features_dir = dir;
    }
    if let Some(browser) = args.browser {
        config.browser = browser;
    }
    if let Some(dir) = args.output {
        config.output_dir = dir;
    }
    if let Some(node) = args.node {
        config.playwright.node_binary = node.to_string_lossy().into_owned();
    }
    config.validate()?;

    let scenarios = select_scenarios(
        &load_scenarios(&config)?,
        args.select.tag.as_deref(),
        args.name.as_deref(),
    );
    if let (Some(name), true) = (&args.name, scenarios.is_empty()) {
        anyhow::bail!("Scenario not found: {}", name);
    }
    if scenarios.is_empty() {
        output::print_warning(&format!(
            "No scenarios found in {}",
            config.features_dir.display()
        ));
        return Ok(0);
    }
    let driver = Arc::new(
        PlaywrightDriver::start(&config.playwright)
            .await
            .context("Failed to start Playwright")?,
    );

    let output_dir = config.output_dir.clone();
    let mut runner = Runner::new(driver.clone(), config, steps::registry()?, steps::hooks());
    let report = runner.run(&scenarios).await;

    if let Err(e) = driver.shutdown().await {
        warn!("Playwright bridge shutdown failed: {}", e);
    }

    let path = report.write_json(&output_dir)?;
    output::print_report(&report, format);
    output::print_info(&format!("Report written to {}", path.display()));
    Ok(exit_code(&report))
}

fn load_scenarios(config: &RunConfig) -> anyhow::Result<Vec<Scenario>> {
    let features = Feature::load_all(&config.features_dir).with_context(|| {
        format!("Failed to load features from {}", config.features_dir.display())
    })?;
    Ok(Feature::scenarios(&features))
}
