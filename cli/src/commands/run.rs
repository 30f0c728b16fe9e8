//! Single query execution command

use crate::config::CliConfigLoader;
use crate::output::cli_handler::CliOutputHandler;
use anyhow::{anyhow, Context, Result};
use research_core::output::{AgentOutput, NullOutput};
use research_core::{coerce_response, AgentBuilder, AgentRun, ToolSettings, ToolWiring};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

const QUERY_PROMPT: &str = "Enter your research query: ";

/// Options for one research run, collected from flags
#[derive(Debug, Default)]
pub struct RunOptions {
    pub query: Option<String>,
    pub verbose: bool,
    pub max_iterations: Option<usize>,
    pub output_file: Option<PathBuf>,
    pub trajectory_file: Option<PathBuf>,
    pub legacy_tool_wiring: bool,
}

/// Answer one research query and print the structured response
pub async fn run_command(options: RunOptions, config_loader: CliConfigLoader) -> Result<()> {
    // Credentials are resolved before the query is read so a missing key fails fast
    let config = config_loader.load().await?;
    info!("Using protocol: {}", config.llm.protocol);
    info!("Using model: {}", config.llm.model);

    let query = match options.query {
        Some(query) => query,
        None => read_query().await?,
    };

    let wiring = if options.legacy_tool_wiring {
        ToolWiring::Legacy
    } else {
        config.tool_wiring
    };
    let tools = ToolSettings {
        output_file: options.output_file.unwrap_or(config.output_file),
        wiring,
        ..ToolSettings::default()
    };
    debug!("Saving to {}", tools.output_file.display());

    let output: Box<dyn AgentOutput> = if options.verbose {
        Box::new(CliOutputHandler::default())
    } else {
        Box::new(NullOutput)
    };

    let mut builder = AgentBuilder::new(config.llm)
        .with_tool_settings(tools)
        .with_trajectory_file(options.trajectory_file.clone());
    if let Some(max_iterations) = options.max_iterations.or(config.max_iterations) {
        builder = builder.with_max_iterations(max_iterations);
    }
    let agent = builder
        .build_with_output(output)
        .context("Failed to create the research agent")?;

    let run = agent.invoke(&query).await?;
    debug!(
        "Run finished after {} iteration(s) in {}ms",
        run.iterations, run.duration_ms
    );

    if let Some(trajectory_file) = &options.trajectory_file {
        info!("Trajectory saved to: {}", trajectory_file.display());
    }

    println!("{}", render_response(&run));

    Ok(())
}

/// The line printed for a finished run: the structured response, or why it could not be parsed
fn render_response(run: &AgentRun) -> String {
    match coerce_response(&run.raw_response()) {
        Ok(response) => format!("Structured Response: {}", response),
        Err(failure) => format!(
            "Error parsing response: {} Raw response: {}",
            failure, failure.raw
        ),
    }
}

/// Prompt on stdout and read one line from stdin
async fn read_query() -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(QUERY_PROMPT.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read the research query from stdin")?;

    let query = line.trim_end_matches(['\r', '\n']).to_string();
    if query.trim().is_empty() {
        return Err(anyhow!("No research query given"));
    }
    Ok(query)
}
