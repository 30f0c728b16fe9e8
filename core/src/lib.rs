//! # research-core
//!
//! Core library for the research agent: an LLM-driven loop that answers one
//! research query with a small set of tools (web search, Wikipedia, save to
//! file) and coerces the final answer into a [`ResearchResponse`].

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod output;
pub mod research;
pub mod tools;
pub mod trajectory;

pub use agent::{AgentBuilder, AgentConfig, AgentExecutor, AgentRun};
pub use config::{ModelParams, Protocol, ResolvedLlmConfig, ToolSettings, ToolWiring};
pub use error::{Error, Result};
pub use research::{coerce_response, CoercionFailure, ResearchResponse};
pub use trajectory::TrajectoryRecorder;

/// Current version of the research-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing with a specific debug mode, writing to stderr
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
