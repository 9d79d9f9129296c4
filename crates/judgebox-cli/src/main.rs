//! Judgebox CLI
//!
//! A command-line tool for running submissions through the judgebox sandbox.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use judgebox::backend::ContainerExecutor;
use judgebox::{
    Config, EXAMPLE_CONFIG, ExecutionRequest, ExecutionResult, IsolationMode, Runner,
    sandbox_available,
};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "judgebox")]
#[command(about = "Run untrusted submissions in a locked-down sandbox")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: judgebox.toml)
        #[arg(short, long, default_value = "judgebox.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a source file (compile if needed, then execute)
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (python, javascript, java, cpp, c)
        #[arg(short, long)]
        language: String,

        /// File fed to the program's standard input
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available languages
    Languages,

    /// Check whether the container runtime is usable
    Probe {
        /// Pull every configured language image
        #[arg(long)]
        pull: bool,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // Logs go to stderr so program output on stdout stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            source,
            language,
            input,
            json,
        } => {
            let config = load_config(config_path)?;
            run_source(config, &source, &language, input.as_deref(), json).await
        }
        Commands::Languages => list_languages(load_config(config_path)?),
        Commands::Probe { pull } => probe(&load_config(config_path)?, pull).await,
        Commands::ShowConfig => {
            show_config(&load_config(config_path)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!(?path, "loading configuration");
            Config::from_file(path).context("failed to load configuration")
        }
        None => {
            debug!("using default configuration");
            Ok(Config::default())
        }
    }
}

async fn run_source(
    config: Config,
    source: &Path,
    language: &str,
    input: Option<&Path>,
    json: bool,
) -> Result<()> {
    let source_content = tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("failed to read source file '{}'", source.display()))?;

    let mut request = ExecutionRequest::new(source_content, language);
    if let Some(input_path) = input {
        let data = tokio::fs::read_to_string(input_path)
            .await
            .with_context(|| format!("failed to read input file '{}'", input_path.display()))?;
        request = request.with_stdin(data);
    }

    let runner = Runner::new(config).context("invalid configuration")?;
    info!(language, "running program");
    let result = runner.execute(&request).await.context("execution rejected")?;

    if result.is_native() {
        warn!("ran without container isolation");
    }

    if json {
        let rendered =
            serde_json::to_string_pretty(&result).context("failed to serialize result")?;
        println!("{rendered}");
    } else {
        print_result(&result);
    }

    if result.is_success() {
        Ok(())
    } else {
        std::process::exit(result.exit_code.filter(|&code| code != 0).unwrap_or(1));
    }
}

fn print_result(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }

    // Execution info goes through tracing (stderr), keeping stdout clean
    info!(
        status = ?result.status,
        isolation = ?result.isolation,
        elapsed = format_args!("{}ms", result.elapsed_ms),
        memory_kb = result.memory_estimate_kb,
        exit_code = result.exit_code,
        "execution result"
    );
}

fn list_languages(config: Config) -> Result<()> {
    let runner = Runner::new(config).context("invalid configuration")?;
    println!("Available languages:\n");

    for profile in runner.registry().iter() {
        let kind = if profile.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!(
            "  {:<12} {:<24} .{:<6} {} ({})",
            profile.id.as_str(),
            profile.name,
            profile.extension,
            profile.image,
            kind
        );
    }
    Ok(())
}

async fn probe(config: &Config, pull: bool) -> Result<()> {
    let runtime = &config.container.runtime;
    if sandbox_available(runtime, config.container.probe_timeout()).await {
        println!("Container runtime '{}' is available", runtime.display());
        if pull {
            pull_images(config).await?;
        }
        return Ok(());
    }
    if pull {
        anyhow::bail!(
            "cannot pull images: container runtime '{}' is unavailable",
            runtime.display()
        );
    }

    match config.isolation {
        IsolationMode::Sandboxed => anyhow::bail!(
            "container runtime '{}' is unavailable and isolation is set to sandboxed",
            runtime.display()
        ),
        IsolationMode::Auto | IsolationMode::Native => {
            println!(
                "Container runtime '{}' is unavailable; executions will run natively",
                runtime.display()
            );
            Ok(())
        }
    }
}

/// Executions never pull, so images must be present beforehand
async fn pull_images(config: &Config) -> Result<()> {
    let runner = Runner::new(config.clone()).context("invalid configuration")?;
    let images: BTreeSet<&str> = runner
        .registry()
        .iter()
        .map(|profile| profile.image.as_str())
        .collect();

    let executor = ContainerExecutor::new(
        config.container.clone(),
        config.compile_timeout(),
        config.max_output_bytes,
    );
    for image in images {
        println!("Pulling {image}");
        executor
            .pull(image)
            .await
            .with_context(|| format!("failed to pull '{image}'"))?;
    }
    Ok(())
}

fn show_config(config: &Config) {
    println!("Workspace root: {}", config.workspace_root.display());
    println!("Isolation: {:?}", config.isolation);
    println!("Max source length: {} characters", config.max_source_chars);
    println!("Max output: {} bytes", config.max_output_bytes);
    println!("Compile timeout: {}ms", config.compile_timeout_ms);
    println!();
    let c = &config.container;
    println!("Container runtime: {}", c.runtime.display());
    println!("  Memory: {} MB", c.memory_mb);
    println!("  CPUs: {}", c.cpus);
    println!("  Pids limit: {}", c.pids_limit);
    println!("  User: {}", c.user);
    println!("  Tmpfs size: {} MB", c.tmpfs_size_mb);
    println!();
    match &config.throttle {
        Some(t) => println!(
            "Throttle: {} attempts per {}s",
            t.max_attempts, t.window_secs
        ),
        None => println!("Throttle: disabled"),
    }
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
