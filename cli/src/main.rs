//! # research CLI
//!
//! Command-line interface for the research agent: ask a research question,
//! get a structured answer.
//!
//! ## Usage
//!
//! - `research` - Prompt for a query on stdin and answer it
//! - `research "query"` - Answer the given query
//! - `research tools` - Show available tools

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use research_core::ToolWiring;
use std::path::PathBuf;

mod commands;
mod config;
mod output;

use commands::{run_command, tools_command, RunOptions};
use config::CliConfigLoader;

/// research - an LLM research assistant
#[derive(Parser)]
#[command(name = "research")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Answer a research query with web search, Wikipedia and a save-to-file tool")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dotenv file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Protocol to use (google_ai, openai, anthropic, deepseek)
    #[arg(long)]
    protocol: Option<String>,

    /// API key override
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL override
    #[arg(long)]
    base_url: Option<String>,

    /// Model name override
    #[arg(long)]
    model: Option<String>,

    /// Print the agent chain trace (model replies, tool calls, observations).
    /// Off by default: only the structured response is printed
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    debug_output: bool,

    /// Maximum number of agent iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// File the save tool appends to
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Output trajectory file
    #[arg(long)]
    trajectory_file: Option<PathBuf>,

    /// Bind the search tool name to the save handler
    #[arg(long)]
    legacy_tool_wiring: bool,

    /// The research query (read from stdin when omitted)
    query: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show available tools
    Tools,
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(protocol) = &cli.protocol {
        loader = loader.with_protocol_override(protocol.clone());
    }

    if let Some(api_key) = &cli.api_key {
        loader = loader.with_api_key_override(api_key.clone());
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(model) = &cli.model {
        loader = loader.with_model_override(model.clone());
    }

    loader
}

/// Load the dotenv file; a missing default `.env` is not an error
fn load_env_file(env_file: Option<&PathBuf>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file: {}", path.display()))?;
        }
        None => {
            if let Err(e) = dotenvy::dotenv() {
                if !e.not_found() {
                    return Err(e).context("Failed to load .env");
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_env_file(cli.env_file.as_ref())?;
    research_core::init_tracing_with_debug(cli.debug_output);

    let config_loader = build_config_loader(&cli);

    match (cli.query, cli.command) {
        (Some(_), Some(_)) => {
            tracing::error!("Error: Cannot specify both a query and a subcommand");
            std::process::exit(1);
        }
        (None, Some(Commands::Tools)) => {
            let wiring = if cli.legacy_tool_wiring {
                ToolWiring::Legacy
            } else {
                ToolWiring::Intended
            };
            tools_command(wiring).await
        }
        (query, None) => {
            let options = RunOptions {
                query,
                verbose: cli.verbose,
                max_iterations: cli.max_iterations,
                output_file: cli.output_file,
                trajectory_file: cli.trajectory_file,
                legacy_tool_wiring: cli.legacy_tool_wiring,
            };
            run_command(options, config_loader).await
        }
    }
}
