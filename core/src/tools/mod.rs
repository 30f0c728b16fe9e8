//! Tool system and built-in tools

pub mod base;
pub mod builtin;
pub mod registry;

pub use base::{Tool, ToolCall, ToolExample, ToolExecutor, ToolResult};
pub use builtin::BuiltinTool;
pub use registry::{BuiltinToolFactory, ToolFactory, ToolRegistry};
