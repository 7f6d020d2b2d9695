//! # LocalBook CLI
//!
//! Streams grounded answers and generated diagrams from a LocalBook backend.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use localbook_core::StreamConfig;
use std::path::PathBuf;
use tracing::debug;

mod commands;
mod logging;
mod ui;

use commands::interrupt::Interrupts;
use commands::{ask, sanitize, visual};

#[derive(Parser, Debug)]
#[command(
    name = "localbook",
    version,
    about = "Ask questions about a notebook and generate diagrams from it"
)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend base URL, overrides the config file
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Config file (default: <config dir>/localbook/stream.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question and stream the answer
    Ask {
        #[command(flatten)]
        args: ask::AskArgs,
        question: String,
    },

    /// Interactive chat over one notebook
    Chat {
        #[command(flatten)]
        args: ask::AskArgs,
    },

    /// Generate a diagram about a topic
    Visual {
        #[command(flatten)]
        args: visual::VisualArgs,
        topic: String,
    },

    /// Rework an existing diagram with an instruction
    Refine {
        #[command(flatten)]
        args: visual::VisualArgs,

        /// File holding the current diagram code or SVG
        #[arg(long)]
        code_file: PathBuf,

        /// Title of the current diagram
        #[arg(long)]
        title: Option<String>,

        instruction: String,
    },

    /// Repair diagram code and print it
    Sanitize {
        /// Input file, `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Also check the result with the renderer
        #[arg(long)]
        validate: bool,
    },
}

fn load_config(cli: &Cli) -> Result<StreamConfig> {
    let mut config = match &cli.config {
        Some(path) => StreamConfig::from_file(path)?,
        None => StreamConfig::load()?,
    };
    if let Some(url) = &cli.backend_url {
        config.backend_url = url.clone();
    }
    config.validate().context("invalid configuration")?;
    debug!("Config loaded: backend_url={}", config.backend_url);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = logging::init_logging(cli.verbose);
    debug!(
        "LocalBook CLI {} started, log_level={}",
        localbook_core::VERSION,
        logging::level_to_str(level)
    );

    let config = load_config(&cli)?;
    let interrupts = Interrupts::install();

    match cli.command {
        Commands::Ask { args, question } => {
            ask::run(&args, &question, config, &interrupts).await
        }
        Commands::Chat { args } => ask::chat(&args, config, &interrupts).await,
        Commands::Visual { args, topic } => {
            visual::generate(&args, &topic, config, &interrupts).await
        }
        Commands::Refine {
            args,
            code_file,
            title,
            instruction,
        } => {
            visual::refine(&args, &code_file, title, &instruction, config, &interrupts).await
        }
        Commands::Sanitize { input, validate } => sanitize::run(&input, validate, config).await,
    }
}
