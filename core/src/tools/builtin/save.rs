//! Save-to-file tool
//!
//! Appends a timestamped banner block to a local text file. The file is an
//! append-only log: nothing in the program reads it back.

use crate::error::Result;
use crate::tools::{Tool, ToolCall, ToolExample, ToolResult};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Banner line that opens every saved block
pub const SAVE_BANNER: &str = "--- Research Output ---";

/// Format one saved-output block
pub fn format_saved_block(timestamp: &str, data: &str) -> String {
    format!("{}\nTimestamp: {}\n\n{}\n\n", SAVE_BANNER, timestamp, data)
}

/// Append `data` to `path` under a timestamp banner
///
/// Creates the file if it does not exist. Filesystem failures are returned
/// as-is; there is no retry and no locking.
pub async fn save_to_txt(data: &str, path: &Path) -> Result<String> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
    let block = format_saved_block(&timestamp, data);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(block.as_bytes()).await?;
    file.flush().await?;

    tracing::debug!("Appended {} bytes to {}", block.len(), path.display());

    Ok(format!("Data successfully saved to {}", path.display()))
}

/// Tool that persists text through [`save_to_txt`]
///
/// The name and description are supplied by the caller so the same handler can
/// be registered under more than one name.
pub struct SaveTool {
    name: &'static str,
    description: &'static str,
    path: PathBuf,
}

impl SaveTool {
    pub fn new(name: &'static str, description: &'static str, path: PathBuf) -> Self {
        Self {
            name,
            description,
            path,
        }
    }

    /// File this tool appends to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Tool for SaveTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "data": {
                    "type": "string",
                    "description": "The text to save"
                }
            },
            "required": ["data"]
        })
    }

    async fn execute(&self, call: ToolCall) -> Result<ToolResult> {
        let data = call.text_input("data")?;
        let message = save_to_txt(&data, &self.path).await?;

        Ok(ToolResult::success(call.id, message).with_data(json!({
            "path": self.path.display().to_string(),
            "bytes": data.len(),
        })))
    }

    fn examples(&self) -> Vec<ToolExample> {
        vec![ToolExample {
            description: "Save a finished summary".to_string(),
            parameters: json!({
                "data": "Topic: Photosynthesis\nSummary: Plants convert light into chemical energy."
            }),
            expected_result: format!("Data successfully saved to {}", self.path.display()),
        }]
    }
}
