//! ccshell - compile shell for the mini C compiler
//!
//! ## Commands
//!
//! - `compile`: compile a C source file and load its AST image
//! - `shell`: interactive editing session (open, compile, exit)
//! - `config`: print the effective configuration

mod console;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use ccshell_core::{CompileOrchestrator, RunOutcome, ShellConfig, ShellSession};

use crate::console::ConsoleLogSink;

#[derive(Parser)]
#[command(name = "ccshell")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile shell for the mini C compiler", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Colorize the compile log
    #[arg(long, global = true, value_enum, default_value = "auto")]
    color: ColorChoice,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "CCSHELL_CONFIG")]
    config: Option<PathBuf>,

    /// Compiler executable (overrides the config file)
    #[arg(long, global = true, env = "CCSHELL_COMPILER")]
    compiler: Option<String>,

    /// Graph renderer executable (overrides the config file)
    #[arg(long, global = true, env = "CCSHELL_RENDERER")]
    renderer: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a C source file and render its AST
    Compile {
        /// Source file to compile
        file: PathBuf,

        /// Write the loaded AST image to this PNG path
        #[arg(short, long)]
        preview: Option<PathBuf>,
    },

    /// Interactive session: type source, `:open`, `:compile`, `:exit`
    Shell {
        /// Source file to load before the first prompt
        file: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    ccshell_core::init_tracing(cli.json, level);

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Compile { file, preview } => cmd_compile(config, file, preview).await,
        Commands::Shell { file } => cmd_shell(config, file).await,
        Commands::Config => cmd_config(&config),
    }
}

fn load_config(cli: &Cli) -> Result<ShellConfig> {
    let mut config = match &cli.config {
        Some(path) => ShellConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ShellConfig::default(),
    };

    if let Some(compiler) = &cli.compiler {
        config.compiler = compiler.clone();
    }
    if let Some(renderer) = &cli.renderer {
        config.renderer = renderer.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn new_session(config: ShellConfig) -> ShellSession {
    let sink = Arc::new(ConsoleLogSink::stdout());
    ShellSession::new(Arc::new(CompileOrchestrator::new(config, sink)))
}

async fn cmd_compile(config: ShellConfig, file: PathBuf, preview: Option<PathBuf>) -> Result<()> {
    let mut session = new_session(config);
    session
        .open_file(&file)
        .await
        .with_context(|| format!("failed to open {}", file.display()))?;

    let report = session.compile().await.context("compile failed")?;
    info!(
        request_id = %report.request_id,
        outcome = report.outcome.name(),
        duration_ms = report.duration_ms,
        "Compile complete"
    );

    if let RunOutcome::ImageLoaded { image, .. } = &report.outcome {
        println!(
            "AST image: {}x{} from {}",
            image.width,
            image.height,
            image.source.display()
        );
        if let Some(path) = preview {
            session
                .save_image(&path)
                .with_context(|| format!("failed to write preview {}", path.display()))?;
            println!("Preview written to {}", path.display());
        }
    }
    Ok(())
}

async fn cmd_shell(config: ShellConfig, file: Option<PathBuf>) -> Result<()> {
    let mut session = new_session(config);
    if let Some(path) = file {
        // Already reported through the log sink.
        let _ = session.open_file(&path).await;
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    repl::run(&mut session, stdin, std::io::stdout()).await
}

fn cmd_config(config: &ShellConfig) -> Result<()> {
    let text = config
        .to_toml_string()
        .context("failed to render configuration")?;
    print!("{text}");
    Ok(())
}
