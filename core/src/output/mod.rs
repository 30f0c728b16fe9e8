//! Output abstraction for agent runs
//!
//! The executor reports what it is doing through [`AgentOutput`]; the CLI
//! decides how (and whether) to show it.

use crate::tools::{ToolCall, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type returned by output handlers
pub type OutputError = Box<dyn std::error::Error + Send + Sync>;

/// Output handler that discards all events
pub struct NullOutput;

#[async_trait]
impl AgentOutput for NullOutput {
    async fn emit_event(&self, _event: AgentEvent) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Status of tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolExecutionStatus {
    Executing,
    Success,
    Error,
}

/// Tool execution information attached to tool events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionInfo {
    /// ID of the tool call
    pub execution_id: String,
    pub tool_name: String,
    /// Arguments as sent by the model
    pub parameters: serde_json::Value,
    pub status: ToolExecutionStatus,
    /// Tool result, once completed
    pub result: Option<ToolResult>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ToolExecutionInfo {
    pub fn new(call: &ToolCall, status: ToolExecutionStatus, result: Option<&ToolResult>) -> Self {
        Self {
            execution_id: call.id.clone(),
            tool_name: call.name.clone(),
            parameters: call.parameters.clone(),
            status,
            result: result.cloned(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Token usage statistics accumulated over a run
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Execution context shared by the chain start/finish events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainContext {
    /// Research query being answered
    pub query: String,
    pub model: String,
    pub provider: String,
    pub max_iterations: usize,
    /// Iterations used so far
    pub iterations: usize,
    pub token_usage: TokenUsage,
}

/// Events emitted during a research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// The executor chain was entered
    ChainStarted { context: ChainContext },
    /// The executor chain finished, with or without a final answer
    ChainFinished {
        context: ChainContext,
        output: String,
        stopped_early: bool,
    },
    /// The model replied; `text` is any prose that came with the reply
    LlmReply {
        iteration: usize,
        text: Option<String>,
        tool_calls: usize,
    },
    ToolExecutionStarted { tool_info: ToolExecutionInfo },
    ToolExecutionCompleted { tool_info: ToolExecutionInfo },
    /// Token usage updated (emitted after each LLM call)
    TokenUsageUpdated { token_usage: TokenUsage },
    /// General message or log
    Message { level: MessageLevel, content: String },
}

/// Message severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Abstract output interface for agent execution
#[async_trait]
pub trait AgentOutput: Send + Sync {
    /// Emit an agent event
    async fn emit_event(&self, event: AgentEvent) -> Result<(), OutputError>;

    /// Emit a message with specified level
    async fn emit_message(&self, level: MessageLevel, content: &str) -> Result<(), OutputError> {
        self.emit_event(AgentEvent::Message {
            level,
            content: content.to_string(),
        })
        .await
    }

    async fn debug(&self, content: &str) -> Result<(), OutputError> {
        self.emit_message(MessageLevel::Debug, content).await
    }

    async fn warning(&self, content: &str) -> Result<(), OutputError> {
        self.emit_message(MessageLevel::Warning, content).await
    }

    async fn error(&self, content: &str) -> Result<(), OutputError> {
        self.emit_message(MessageLevel::Error, content).await
    }

    /// Flush any buffered output
    async fn flush(&self) -> Result<(), OutputError> {
        Ok(())
    }
}
