//! CLI output handler implementation
//!
//! Prints the agent chain trace (model replies, tool invocations and their
//! observations) to stdout when the CLI runs in verbose mode.

use async_trait::async_trait;
use colored::Colorize;
use research_core::agent::MAX_ITERATIONS_MESSAGE;
use research_core::output::{
    AgentEvent, AgentOutput, MessageLevel, OutputError, ToolExecutionInfo, ToolExecutionStatus,
};
use std::io::Write;
use tracing::{debug, error, info, warn};

/// Observations longer than this are cut in the trace
const MAX_OBSERVATION_CHARS: usize = 1200;

/// CLI output configuration
#[derive(Debug, Clone)]
pub struct CliOutputConfig {
    /// Print token totals when the chain finishes
    pub show_token_usage: bool,
}

impl Default for CliOutputConfig {
    fn default() -> Self {
        Self {
            show_token_usage: true,
        }
    }
}

/// CLI output handler that formats events for terminal display
pub struct CliOutputHandler {
    config: CliOutputConfig,
}

impl CliOutputHandler {
    pub fn new(config: CliOutputConfig) -> Self {
        Self { config }
    }

    fn format_invocation(tool_info: &ToolExecutionInfo) -> String {
        format!(
            "Invoking: `{}` with `{}`",
            tool_info.tool_name, tool_info.parameters
        )
    }

    fn format_observation(tool_info: &ToolExecutionInfo) -> Option<String> {
        let result = tool_info.result.as_ref()?;
        Some(truncate_chars(&result.content, MAX_OBSERVATION_CHARS))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl AgentOutput for CliOutputHandler {
    async fn emit_event(&self, event: AgentEvent) -> Result<(), OutputError> {
        match event {
            AgentEvent::ChainStarted { context } => {
                debug!(
                    "Answering with {} ({}), max {} iterations",
                    context.model, context.provider, context.max_iterations
                );
                println!();
                println!("{}", "> Entering new AgentExecutor chain...".bold());
            }

            AgentEvent::LlmReply {
                iteration,
                text,
                tool_calls,
            } => {
                debug!("Iteration {}: {} tool call(s)", iteration, tool_calls);
                if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
                    println!("{}", text.green());
                }
            }

            AgentEvent::ToolExecutionStarted { tool_info } => {
                println!("{}", Self::format_invocation(&tool_info).cyan());
            }

            AgentEvent::ToolExecutionCompleted { tool_info } => {
                if let Some(observation) = Self::format_observation(&tool_info) {
                    match tool_info.status {
                        ToolExecutionStatus::Error => println!("{}", observation.red()),
                        _ => println!("{}", observation.yellow()),
                    }
                }
            }

            AgentEvent::ChainFinished {
                context,
                output: _,
                stopped_early,
            } => {
                if stopped_early {
                    println!("{}", MAX_ITERATIONS_MESSAGE.red());
                }
                println!("{}", "> Finished chain.".bold());

                if self.config.show_token_usage && context.token_usage.total_tokens > 0 {
                    let usage = &context.token_usage;
                    info!(
                        "Tokens: {} input + {} output = {} total over {} iteration(s)",
                        usage.input_tokens, usage.output_tokens, usage.total_tokens, context.iterations
                    );
                }
            }

            AgentEvent::TokenUsageUpdated { token_usage: _ } => {}

            AgentEvent::Message { level, content } => match level {
                MessageLevel::Debug => debug!("{}", content),
                MessageLevel::Info => info!("{}", content),
                MessageLevel::Warning => warn!("{}", content),
                MessageLevel::Error => error!("{}", content),
            },
        }

        Ok(())
    }

    async fn flush(&self) -> Result<(), OutputError> {
        std::io::stdout().flush().map_err(|e| e.into())
    }
}

impl Default for CliOutputHandler {
    fn default() -> Self {
        Self::new(CliOutputConfig::default())
    }
}
