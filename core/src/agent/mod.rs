//! Research agent: prompt, configuration and the executor loop

pub mod config;
pub mod executor;
pub mod prompt;

pub use config::{AgentBuilder, AgentConfig, DEFAULT_MAX_ITERATIONS};
pub use executor::{AgentExecutor, AgentRun, IntermediateStep, MAX_ITERATIONS_MESSAGE};
pub use prompt::{PromptTemplate, RESEARCH_ASSISTANT_PROMPT};
