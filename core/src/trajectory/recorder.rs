//! Trajectory recorder implementation

use crate::error::{Result, TrajectoryError};
use crate::trajectory::{EntryType, TrajectoryEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

const TRAJECTORY_VERSION: &str = "1.0";

/// Records the steps of a research run as JSON
pub struct TrajectoryRecorder {
    id: String,
    entries: RwLock<Vec<TrajectoryEntry>>,
    file_path: Option<PathBuf>,
}

/// Complete trajectory data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    pub metadata: TrajectoryMetadata,
    pub entries: Vec<TrajectoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryMetadata {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Version of the trajectory format
    pub version: String,
    pub query: Option<String>,
    /// Whether the run produced a final answer before the iteration limit
    pub finished: Option<bool>,
    pub total_entries: usize,
    pub duration_ms: Option<u64>,
}

impl TrajectoryRecorder {
    /// Create an in-memory recorder
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entries: RwLock::new(Vec::new()),
            file_path: None,
        }
    }

    /// Create a recorder that rewrites `path` after every entry
    pub fn with_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_path: Some(path.as_ref().to_path_buf()),
            ..Self::new()
        }
    }

    /// Record a trajectory entry
    pub async fn record(&self, entry: TrajectoryEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        self.save().await
    }

    /// Get all recorded entries
    pub async fn get_entries(&self) -> Vec<TrajectoryEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Save the trajectory to file, if one is set
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        let trajectory = self.build_trajectory().await;
        let json = serde_json::to_string_pretty(&trajectory).map_err(|e| {
            TrajectoryError::RecordingFailed {
                message: format!("Failed to serialize trajectory: {}", e),
            }
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, json).await?;

        Ok(())
    }

    /// Load a trajectory from file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Trajectory> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .await
            .map_err(|_| TrajectoryError::LoadFailed {
                path: path.to_string_lossy().to_string(),
            })?;

        serde_json::from_str(&content).map_err(|_| TrajectoryError::InvalidFormat.into())
    }

    async fn build_trajectory(&self) -> Trajectory {
        let entries = self.entries.read().await.clone();

        let started_at = entries
            .first()
            .map(|e| e.timestamp)
            .unwrap_or_else(Utc::now);
        let completed_at = entries.last().map(|e| e.timestamp);
        let duration_ms =
            completed_at.map(|end| (end - started_at).num_milliseconds().max(0) as u64);

        let mut query = None;
        let mut finished = None;
        for entry in &entries {
            match &entry.entry_type {
                EntryType::QueryStart { query: q, .. } => query = Some(q.clone()),
                EntryType::QueryComplete { stopped_early, .. } => finished = Some(!stopped_early),
                _ => {}
            }
        }

        Trajectory {
            metadata: TrajectoryMetadata {
                id: self.id.clone(),
                started_at,
                completed_at,
                version: TRAJECTORY_VERSION.to_string(),
                query,
                finished,
                total_entries: entries.len(),
                duration_ms,
            },
            entries,
        }
    }

    /// Get the file path if set
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

impl Default for TrajectoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCall;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_record_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs").join("trajectory.json");
        let recorder = TrajectoryRecorder::with_file(&path);

        recorder
            .record(TrajectoryEntry::query_start(
                "what is rust".to_string(),
                "gemini-2.5-flash".to_string(),
                "google_ai".to_string(),
            ))
            .await
            .unwrap();
        recorder
            .record(TrajectoryEntry::tool_call(
                ToolCall::new("wikipedia", json!({"query": "Rust"})),
                1,
            ))
            .await
            .unwrap();
        recorder
            .record(TrajectoryEntry::query_complete(json!("done"), false, 12, 2))
            .await
            .unwrap();

        let trajectory = TrajectoryRecorder::load(&path).await.unwrap();
        assert_eq!(trajectory.entries.len(), 3);
        assert_eq!(trajectory.metadata.query.as_deref(), Some("what is rust"));
        assert_eq!(trajectory.metadata.finished, Some(true));
        assert!(matches!(
            trajectory.entries[1].entry_type,
            EntryType::ToolCall { .. }
        ));
    }

    #[tokio::test]
    async fn test_in_memory_recorder_writes_nothing() {
        let recorder = TrajectoryRecorder::new();
        recorder
            .record(TrajectoryEntry::error("boom".to_string(), 1))
            .await
            .unwrap();
        assert_eq!(recorder.entry_count().await, 1);
        assert!(recorder.file_path().is_none());
    }

    #[tokio::test]
    async fn test_load_missing_and_invalid() {
        let dir = tempdir().unwrap();
        let missing = TrajectoryRecorder::load(dir.path().join("nope.json")).await;
        assert!(matches!(
            missing,
            Err(crate::error::Error::Trajectory(TrajectoryError::LoadFailed { .. }))
        ));

        let bad = dir.path().join("bad.json");
        tokio::fs::write(&bad, "not json").await.unwrap();
        assert!(matches!(
            TrajectoryRecorder::load(&bad).await,
            Err(crate::error::Error::Trajectory(TrajectoryError::InvalidFormat))
        ));
    }
}
