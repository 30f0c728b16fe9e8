//! Trajectory entries

use crate::llm::{LlmMessage, Usage};
use crate::tools::{ToolCall, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded event of a research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    pub timestamp: DateTime<Utc>,
    /// Executor iteration the entry belongs to; 0 outside the loop
    pub iteration: usize,
    #[serde(flatten)]
    pub entry_type: EntryType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryType {
    QueryStart {
        query: String,
        model: String,
        provider: String,
    },
    LlmRequest {
        messages: Vec<LlmMessage>,
    },
    LlmResponse {
        message: LlmMessage,
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },
    ToolCall {
        call: ToolCall,
    },
    ToolResult {
        result: ToolResult,
    },
    Error {
        message: String,
    },
    QueryComplete {
        output: serde_json::Value,
        stopped_early: bool,
        duration_ms: u64,
    },
}

impl TrajectoryEntry {
    fn new(iteration: usize, entry_type: EntryType) -> Self {
        Self {
            timestamp: Utc::now(),
            iteration,
            entry_type,
        }
    }

    pub fn query_start(query: String, model: String, provider: String) -> Self {
        Self::new(
            0,
            EntryType::QueryStart {
                query,
                model,
                provider,
            },
        )
    }

    pub fn llm_request(messages: Vec<LlmMessage>, iteration: usize) -> Self {
        Self::new(iteration, EntryType::LlmRequest { messages })
    }

    pub fn llm_response(
        message: LlmMessage,
        usage: Option<Usage>,
        finish_reason: Option<String>,
        iteration: usize,
    ) -> Self {
        Self::new(
            iteration,
            EntryType::LlmResponse {
                message,
                usage,
                finish_reason,
            },
        )
    }

    pub fn tool_call(call: ToolCall, iteration: usize) -> Self {
        Self::new(iteration, EntryType::ToolCall { call })
    }

    pub fn tool_result(result: ToolResult, iteration: usize) -> Self {
        Self::new(iteration, EntryType::ToolResult { result })
    }

    pub fn error(message: String, iteration: usize) -> Self {
        Self::new(iteration, EntryType::Error { message })
    }

    pub fn query_complete(
        output: serde_json::Value,
        stopped_early: bool,
        duration_ms: u64,
        iteration: usize,
    ) -> Self {
        Self::new(
            iteration,
            EntryType::QueryComplete {
                output,
                stopped_early,
                duration_ms,
            },
        )
    }
}
