//! Minimal configuration module for research-agent core
//!
//! Only exports pure data types. All loading logic is in CLI layer.

pub mod types;

pub use types::{
    ModelParams, Protocol, ResolvedLlmConfig, ToolSettings, ToolWiring, DEFAULT_OUTPUT_FILE,
};
