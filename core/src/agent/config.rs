//! Agent configuration structures

use crate::config::{ResolvedLlmConfig, ToolSettings};
use crate::error::{ConfigError, Result};
use crate::llm::{create_client, LlmClient};
use crate::output::{AgentOutput, NullOutput};
use crate::trajectory::TrajectoryRecorder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Default cap on decide/act iterations per query
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Configuration for an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of LLM calls before the executor gives up
    pub max_iterations: usize,

    /// Replaces the default instruction text of the system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Settings the built-in tools are created with
    #[serde(default)]
    pub tools: ToolSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: None,
            tools: ToolSettings::default(),
        }
    }
}

/// Builder for creating agent executors with resolved LLM configuration
pub struct AgentBuilder {
    llm_config: ResolvedLlmConfig,
    agent_config: AgentConfig,
    trajectory_file: Option<PathBuf>,
}

impl AgentBuilder {
    pub fn new(llm_config: ResolvedLlmConfig) -> Self {
        Self {
            llm_config,
            agent_config: AgentConfig::default(),
            trajectory_file: None,
        }
    }

    pub fn with_agent_config(mut self, agent_config: AgentConfig) -> Self {
        self.agent_config = agent_config;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.agent_config.max_iterations = max_iterations;
        self
    }

    pub fn with_tool_settings(mut self, tools: ToolSettings) -> Self {
        self.agent_config.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.agent_config.system_prompt = system_prompt;
        self
    }

    /// Record the run's trajectory as JSON at `path`
    pub fn with_trajectory_file(mut self, path: Option<PathBuf>) -> Self {
        self.trajectory_file = path;
        self
    }

    /// Build the executor with the given output handler
    ///
    /// Fails before any tool exists when the LLM client cannot be created,
    /// for example because the API key is missing.
    pub fn build_with_output(self, output: Box<dyn AgentOutput>) -> Result<super::AgentExecutor> {
        self.llm_config
            .validate()
            .map_err(|message| ConfigError::Invalid { message })?;
        let client = create_client(&self.llm_config)?;
        Ok(self.build_with_client(client, output))
    }

    /// Build the executor around an existing client
    pub fn build_with_client(
        self,
        client: Arc<dyn LlmClient>,
        output: Box<dyn AgentOutput>,
    ) -> super::AgentExecutor {
        let options = crate::llm::ChatOptions::from_params(&self.llm_config.params);
        let mut executor =
            super::AgentExecutor::new(self.agent_config, client, output).with_chat_options(options);
        if let Some(path) = self.trajectory_file {
            executor.set_trajectory_recorder(TrajectoryRecorder::with_file(path));
        }
        executor
    }

    /// Build the executor with null output
    pub fn build(self) -> Result<super::AgentExecutor> {
        self.build_with_output(Box::new(NullOutput))
    }
}
