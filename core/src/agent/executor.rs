//! The decide → call → observe loop
//!
//! Each iteration sends the rendered prompt plus the scratchpad to the model.
//! When the reply asks for tools they are run in order and their observations
//! are appended to the scratchpad; a reply without tool calls ends the run.

use super::config::AgentConfig;
use super::prompt::PromptTemplate;
use crate::error::{AgentError, Result};
use crate::llm::{ChatOptions, ContentBlock, LlmClient, LlmMessage, LlmResponse};
use crate::output::{
    AgentEvent, AgentOutput, ChainContext, TokenUsage, ToolExecutionInfo, ToolExecutionStatus,
};
use crate::tools::{ToolCall, ToolExecutor, ToolRegistry, ToolResult};
use crate::trajectory::{TrajectoryEntry, TrajectoryRecorder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Output of a run that hit the iteration limit
pub const MAX_ITERATIONS_MESSAGE: &str = "Agent stopped due to max iterations.";

/// A tool call together with the observation it produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediateStep {
    pub call: ToolCall,
    pub observation: ToolResult,
}

/// Result of answering one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub query: String,
    /// The final reply content: a string, or a list of content blocks
    pub output: Value,
    pub intermediate_steps: Vec<IntermediateStep>,
    /// Number of LLM calls made
    pub iterations: usize,
    /// Whether the run ended on the iteration limit instead of a final answer
    pub stopped_early: bool,
    pub duration_ms: u64,
    pub token_usage: TokenUsage,
}

impl AgentRun {
    /// The `{query, output}` record handed to output coercion
    pub fn raw_response(&self) -> Value {
        json!({
            "query": self.query,
            "output": self.output,
        })
    }
}

/// Runs research queries against an LLM with the built-in tools
pub struct AgentExecutor {
    config: AgentConfig,
    llm_client: Arc<dyn LlmClient>,
    tool_executor: ToolExecutor,
    prompt: PromptTemplate,
    options: ChatOptions,
    chat_history: Vec<LlmMessage>,
    output: Box<dyn AgentOutput>,
    trajectory_recorder: Option<TrajectoryRecorder>,
}

impl AgentExecutor {
    /// Create an executor with the built-in tools described by `config.tools`
    pub fn new(
        config: AgentConfig,
        llm_client: Arc<dyn LlmClient>,
        output: Box<dyn AgentOutput>,
    ) -> Self {
        let tool_executor = ToolRegistry::with_builtins(&config.tools).create_executor_with_all();
        let prompt = match &config.system_prompt {
            Some(instructions) => PromptTemplate::with_instructions(instructions.clone()),
            None => PromptTemplate::new(),
        };

        Self {
            config,
            llm_client,
            tool_executor,
            prompt,
            options: ChatOptions::default(),
            chat_history: Vec::new(),
            output,
            trajectory_recorder: None,
        }
    }

    pub fn with_chat_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the tool set
    pub fn with_tool_executor(mut self, tool_executor: ToolExecutor) -> Self {
        self.tool_executor = tool_executor;
        self
    }

    /// Prior conversation rendered between the system prompt and the query
    pub fn with_chat_history(mut self, chat_history: Vec<LlmMessage>) -> Self {
        self.chat_history = chat_history;
        self
    }

    pub fn set_trajectory_recorder(&mut self, recorder: TrajectoryRecorder) {
        self.trajectory_recorder = Some(recorder);
    }

    pub fn trajectory_recorder(&self) -> Option<&TrajectoryRecorder> {
        self.trajectory_recorder.as_ref()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Names of the registered tools, in the order the model sees them
    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_executor.list_tools()
    }

    /// Answer one query
    ///
    /// Tool failures other than unknown names and bad arguments abort the run
    /// with the error; nothing is retried.
    pub async fn invoke(&self, query: &str) -> Result<AgentRun> {
        if query.trim().is_empty() {
            return Err(AgentError::InvalidQuery {
                message: "query must not be empty".to_string(),
            }
            .into());
        }

        let start_time = Instant::now();
        let mut context = ChainContext {
            query: query.to_string(),
            model: self.llm_client.model_name().to_string(),
            provider: self.llm_client.provider_name().to_string(),
            max_iterations: self.config.max_iterations,
            iterations: 0,
            token_usage: TokenUsage::default(),
        };

        tracing::info!(
            "Starting research run with {} ({})",
            context.model,
            context.provider
        );
        self.emit(AgentEvent::ChainStarted {
            context: context.clone(),
        })
        .await;
        self.record(TrajectoryEntry::query_start(
            query.to_string(),
            context.model.clone(),
            context.provider.clone(),
        ))
        .await?;

        let mut scratchpad: Vec<LlmMessage> = Vec::new();
        let mut intermediate_steps = Vec::new();
        let mut final_output = None;

        while context.iterations < self.config.max_iterations {
            context.iterations += 1;
            let iteration = context.iterations;

            let response = match self.call_llm(query, &scratchpad, iteration).await {
                Ok(response) => response,
                Err(e) => {
                    self.fail(&e, iteration).await;
                    return Err(e);
                }
            };

            if let Some(usage) = &response.usage {
                context.token_usage.input_tokens += usage.prompt_tokens;
                context.token_usage.output_tokens += usage.completion_tokens;
                context.token_usage.total_tokens += usage.total_tokens;
                self.emit(AgentEvent::TokenUsageUpdated {
                    token_usage: context.token_usage.clone(),
                })
                .await;
            }

            let tool_calls: Vec<ToolCall> = response
                .message
                .get_tool_uses()
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        parameters: input.clone(),
                        metadata: None,
                    }),
                    _ => None,
                })
                .collect();

            self.emit(AgentEvent::LlmReply {
                iteration,
                text: response
                    .message
                    .get_text()
                    .filter(|text| !text.trim().is_empty()),
                tool_calls: tool_calls.len(),
            })
            .await;

            if tool_calls.is_empty() {
                final_output = Some(serde_json::to_value(&response.message.content)?);
                break;
            }

            scratchpad.push(response.message);
            for call in tool_calls {
                let observation = match self.run_tool(call.clone(), iteration).await {
                    Ok(observation) => observation,
                    Err(e) => {
                        self.fail(&e, iteration).await;
                        return Err(e);
                    }
                };
                scratchpad.push(LlmMessage::tool_result(
                    observation.tool_call_id.clone(),
                    observation.content.clone(),
                    !observation.success,
                ));
                intermediate_steps.push(IntermediateStep { call, observation });
            }
        }

        let stopped_early = final_output.is_none();
        if stopped_early {
            tracing::warn!(
                "Stopping after {} iterations without a final answer",
                context.iterations
            );
        }
        let output =
            final_output.unwrap_or_else(|| Value::String(MAX_ITERATIONS_MESSAGE.to_string()));
        let duration_ms = start_time.elapsed().as_millis() as u64;

        self.record(TrajectoryEntry::query_complete(
            output.clone(),
            stopped_early,
            duration_ms,
            context.iterations,
        ))
        .await?;
        self.emit(AgentEvent::ChainFinished {
            context: context.clone(),
            output: display_output(&output),
            stopped_early,
        })
        .await;
        if let Err(e) = self.output.flush().await {
            tracing::debug!("Failed to flush output: {}", e);
        }

        Ok(AgentRun {
            query: query.to_string(),
            output,
            intermediate_steps,
            iterations: context.iterations,
            stopped_early,
            duration_ms,
            token_usage: context.token_usage,
        })
    }

    async fn call_llm(
        &self,
        query: &str,
        scratchpad: &[LlmMessage],
        iteration: usize,
    ) -> Result<LlmResponse> {
        let messages = self
            .prompt
            .format_messages(&self.chat_history, query, scratchpad)?;
        self.record(TrajectoryEntry::llm_request(messages.clone(), iteration))
            .await?;

        tracing::debug!("Iteration {}: sending {} messages", iteration, messages.len());
        let response = self
            .llm_client
            .chat_completion(
                messages,
                Some(self.tool_executor.get_tool_definitions()),
                Some(self.options.clone()),
            )
            .await?;

        self.record(TrajectoryEntry::llm_response(
            response.message.clone(),
            response.usage.clone(),
            response.finish_reason.as_ref().map(|r| format!("{:?}", r)),
            iteration,
        ))
        .await?;

        Ok(response)
    }

    async fn run_tool(&self, call: ToolCall, iteration: usize) -> Result<ToolResult> {
        tracing::info!("Invoking `{}` with {}", call.name, call.parameters);
        self.emit(AgentEvent::ToolExecutionStarted {
            tool_info: ToolExecutionInfo::new(&call, ToolExecutionStatus::Executing, None),
        })
        .await;
        self.record(TrajectoryEntry::tool_call(call.clone(), iteration))
            .await?;

        let result = self.tool_executor.execute(call.clone()).await?;

        let status = if result.success {
            ToolExecutionStatus::Success
        } else {
            ToolExecutionStatus::Error
        };
        self.emit(AgentEvent::ToolExecutionCompleted {
            tool_info: ToolExecutionInfo::new(&call, status, Some(&result)),
        })
        .await;
        self.record(TrajectoryEntry::tool_result(result.clone(), iteration))
            .await?;

        Ok(result)
    }

    /// Report a fatal error; the caller returns `error` whatever happens here
    async fn fail(&self, error: &crate::error::Error, iteration: usize) {
        tracing::error!("Research run failed at iteration {}: {}", iteration, error);
        if let Err(e) = self.output.error(&error.to_string()).await {
            tracing::debug!("Failed to emit error message: {}", e);
        }
        if let Err(e) = self
            .record(TrajectoryEntry::error(error.to_string(), iteration))
            .await
        {
            tracing::warn!("Failed to record error in trajectory: {}", e);
        }
    }

    async fn emit(&self, event: AgentEvent) {
        if let Err(e) = self.output.emit_event(event).await {
            tracing::debug!("Failed to emit agent event: {}", e);
        }
    }

    async fn record(&self, entry: TrajectoryEntry) -> Result<()> {
        match &self.trajectory_recorder {
            Some(recorder) => recorder.record(entry).await,
            None => Ok(()),
        }
    }
}

/// Flatten an output value to text for display
fn display_output(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ToolSettings, ToolWiring};
    use crate::llm::{FinishReason, MessageContent, MessageRole, ToolDefinition, Usage};
    use crate::output::NullOutput;
    use crate::error::ToolError;
    use crate::research::coerce_response;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    const ANSWER: &str = r#"{"topic": "Tides", "summary": "The moon pulls the oceans.", "sources": ["https://en.wikipedia.org/wiki/Tide"], "tools": ["save_text_to_file"]}"#;

    /// Replays a fixed list of replies and records what it was sent
    struct ScriptedLlmClient {
        replies: Mutex<Vec<LlmMessage>>,
        seen: Mutex<Vec<Vec<LlmMessage>>>,
        tool_names: Mutex<Vec<String>>,
    }

    impl ScriptedLlmClient {
        fn new(mut replies: Vec<LlmMessage>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
                tool_names: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn chat_completion(
            &self,
            messages: Vec<LlmMessage>,
            tools: Option<Vec<ToolDefinition>>,
            _options: Option<ChatOptions>,
        ) -> Result<LlmResponse> {
            self.seen.lock().unwrap().push(messages);
            *self.tool_names.lock().unwrap() = tools
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.function.name)
                .collect();

            let message = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| tool_use("call_again", "wikipedia", json!({"query": "again"})));

            Ok(LlmResponse {
                message,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 2,
                    total_tokens: 12,
                }),
                model: "scripted".to_string(),
                finish_reason: Some(FinishReason::Stop),
                metadata: None,
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    fn tool_use(id: &str, name: &str, input: Value) -> LlmMessage {
        LlmMessage {
            role: MessageRole::Assistant,
            content: MessageContent::MultiModal(vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }]),
            metadata: None,
        }
    }

    fn final_blocks(text: &str) -> LlmMessage {
        LlmMessage {
            role: MessageRole::Assistant,
            content: MessageContent::MultiModal(vec![ContentBlock::Text {
                text: text.to_string(),
            }]),
            metadata: None,
        }
    }

    fn executor(
        client: Arc<ScriptedLlmClient>,
        settings: ToolSettings,
        max_iterations: usize,
    ) -> AgentExecutor {
        let config = AgentConfig {
            max_iterations,
            tools: settings,
            ..AgentConfig::default()
        };
        AgentExecutor::new(config, client, Box::new(NullOutput))
    }

    fn settings_in(dir: &std::path::Path, wiring: ToolWiring) -> ToolSettings {
        ToolSettings {
            output_file: dir.join("research_output.txt"),
            wiring,
            ..ToolSettings::default()
        }
    }

    #[tokio::test]
    async fn test_save_then_final_answer() {
        let dir = tempdir().unwrap();
        let client = Arc::new(ScriptedLlmClient::new(vec![
            tool_use("call_1", "save_text_to_file", json!({"data": "tides notes"})),
            final_blocks(ANSWER),
        ]));
        let executor = executor(client.clone(), settings_in(dir.path(), ToolWiring::Intended), 15);

        let run = executor.invoke("why are there tides").await.unwrap();

        assert!(!run.stopped_early);
        assert_eq!(run.iterations, 2);
        assert_eq!(run.intermediate_steps.len(), 1);
        assert!(run.intermediate_steps[0]
            .observation
            .content
            .starts_with("Data successfully saved to "));
        assert_eq!(run.token_usage.total_tokens, 24);

        let saved = std::fs::read_to_string(dir.path().join("research_output.txt")).unwrap();
        assert!(saved.contains("tides notes"));

        let response = coerce_response(&run.raw_response()).unwrap();
        assert_eq!(response.topic, "Tides");
        assert_eq!(response.tools, vec!["save_text_to_file"]);

        // second call carries the tool use and its observation after the query
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let second = &seen[1];
        assert_eq!(second[0].role, MessageRole::System);
        assert_eq!(second[1].get_text().as_deref(), Some("why are there tides"));
        assert!(second[2].has_tool_use());
        assert_eq!(second[3].role, MessageRole::Tool);
        assert_eq!(
            *client.tool_names.lock().unwrap(),
            vec!["web_search", "wikipedia", "save_text_to_file"]
        );
    }

    #[tokio::test]
    async fn test_legacy_search_name_saves_instead_of_searching() {
        let dir = tempdir().unwrap();
        let client = Arc::new(ScriptedLlmClient::new(vec![
            tool_use(
                "call_1",
                "search_text_to_file",
                json!({"data": "latest on tidal power"}),
            ),
            final_blocks(ANSWER),
        ]));
        let executor = executor(client, settings_in(dir.path(), ToolWiring::Legacy), 15);

        let run = executor.invoke("tidal power news").await.unwrap();

        assert!(run.intermediate_steps[0].observation.success);
        let saved = std::fs::read_to_string(dir.path().join("research_output.txt")).unwrap();
        assert!(saved.contains("--- Research Output ---"));
        assert!(saved.contains("latest on tidal power"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let dir = tempdir().unwrap();
        let client = Arc::new(ScriptedLlmClient::new(vec![
            tool_use("call_1", "calculator", json!({"expr": "1+1"})),
            final_blocks(ANSWER),
        ]));
        let executor = executor(client, settings_in(dir.path(), ToolWiring::Intended), 15);

        let run = executor.invoke("add numbers").await.unwrap();

        let observation = &run.intermediate_steps[0].observation;
        assert!(!observation.success);
        assert_eq!(
            observation.content,
            "calculator is not a valid tool, try one of [web_search, wikipedia, save_text_to_file]."
        );
        assert!(!run.stopped_early);
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_observation() {
        let dir = tempdir().unwrap();
        let client = Arc::new(ScriptedLlmClient::new(vec![
            tool_use("call_1", "save_text_to_file", json!({"text": "wrong key"})),
            final_blocks(ANSWER),
        ]));
        let executor = executor(client, settings_in(dir.path(), ToolWiring::Intended), 15);

        let run = executor.invoke("save something").await.unwrap();
        assert!(!run.intermediate_steps[0].observation.success);
        assert!(!dir.path().join("research_output.txt").exists());
    }

    #[tokio::test]
    async fn test_max_iterations_stops_the_run() {
        let dir = tempdir().unwrap();
        let client = Arc::new(ScriptedLlmClient::new(vec![
            tool_use("call_1", "calculator", json!({})),
            tool_use("call_2", "calculator", json!({})),
            tool_use("call_3", "calculator", json!({})),
        ]));
        let executor = executor(client.clone(), settings_in(dir.path(), ToolWiring::Intended), 3);

        let run = executor.invoke("loop forever").await.unwrap();

        assert!(run.stopped_early);
        assert_eq!(run.iterations, 3);
        assert_eq!(run.output, json!(MAX_ITERATIONS_MESSAGE));
        assert_eq!(client.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_save_failure_aborts_the_run() {
        let dir = tempdir().unwrap();
        let settings = ToolSettings {
            output_file: dir.path().join("missing").join("out.txt"),
            ..ToolSettings::default()
        };
        let client = Arc::new(ScriptedLlmClient::new(vec![
            tool_use("call_1", "save_text_to_file", json!({"data": "x"})),
            final_blocks(ANSWER),
        ]));
        let executor = executor(client.clone(), settings, 15);

        let err = executor.invoke("save it").await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
        assert_eq!(client.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_text_reply_is_string_output() {
        let client = Arc::new(ScriptedLlmClient::new(vec![LlmMessage::assistant(ANSWER)]));
        let executor = executor(client, ToolSettings::default(), 15);

        let run = executor.invoke("tides").await.unwrap();
        assert_eq!(run.output, json!(ANSWER));
        assert!(coerce_response(&run.raw_response()).is_ok());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let client = Arc::new(ScriptedLlmClient::new(vec![]));
        let executor = executor(client.clone(), ToolSettings::default(), 15);

        assert!(executor.invoke("   ").await.is_err());
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trajectory_is_recorded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trajectory.json");
        let client = Arc::new(ScriptedLlmClient::new(vec![LlmMessage::assistant(ANSWER)]));
        let mut executor = executor(client, ToolSettings::default(), 15);
        executor.set_trajectory_recorder(TrajectoryRecorder::with_file(&path));

        executor.invoke("tides").await.unwrap();

        let trajectory = TrajectoryRecorder::load(&path).await.unwrap();
        assert_eq!(trajectory.metadata.query.as_deref(), Some("tides"));
        assert_eq!(trajectory.metadata.finished, Some(true));
        // query start, request, response, completion
        assert_eq!(trajectory.entries.len(), 4);
    }

    /// Swaps the trajectory file for a directory so later writes fail, then errors
    struct TrajectoryClobberingTool {
        trajectory: std::path::PathBuf,
    }

    #[async_trait]
    impl Tool for TrajectoryClobberingTool {
        fn name(&self) -> &str {
            "fetch_report"
        }

        fn description(&self) -> &str {
            "Fetch a report"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _call: ToolCall) -> Result<ToolResult> {
            std::fs::remove_file(&self.trajectory)?;
            std::fs::create_dir(&self.trajectory)?;
            Err(ToolError::ExecutionFailed {
                name: "fetch_report".to_string(),
                message: "upstream returned 502".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn test_tool_error_survives_trajectory_write_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trajectory.json");
        let client = Arc::new(ScriptedLlmClient::new(vec![tool_use(
            "call_1",
            "fetch_report",
            json!({}),
        )]));

        let mut tools = ToolExecutor::new();
        tools.register_tool(Box::new(TrajectoryClobberingTool {
            trajectory: path.clone(),
        }));
        let mut executor =
            executor(client.clone(), ToolSettings::default(), 15).with_tool_executor(tools);
        executor.set_trajectory_recorder(TrajectoryRecorder::with_file(&path));
        assert_eq!(executor.tool_names(), vec!["fetch_report"]);

        let err = executor.invoke("quarterly report").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Tool(ToolError::ExecutionFailed { ref name, .. }) if name == "fetch_report"
        ));
        assert!(path.is_dir());
        assert_eq!(*client.tool_names.lock().unwrap(), vec!["fetch_report".to_string()]);
    }
}
