//! Tool registry for managing available tools

use crate::config::ToolSettings;
use crate::tools::builtin::BuiltinTool;
use crate::tools::{Tool, ToolExample, ToolExecutor};

/// Registry for managing tool creation and registration
///
/// Factories are kept in registration order, which is the order the tools are
/// offered to the model and listed by the CLI.
pub struct ToolRegistry {
    factories: Vec<Box<dyn ToolFactory>>,
}

/// Factory trait for creating tools
pub trait ToolFactory: Send + Sync {
    /// Create a new instance of the tool
    fn create(&self) -> Box<dyn Tool>;

    /// Get the name of the tool this factory creates
    fn tool_name(&self) -> &str;

    /// Get the description of the tool this factory creates
    fn tool_description(&self) -> &str;
}

/// Factory for one of the built-in tools under fixed settings
pub struct BuiltinToolFactory {
    tool: BuiltinTool,
    settings: ToolSettings,
}

impl BuiltinToolFactory {
    pub fn new(tool: BuiltinTool, settings: ToolSettings) -> Self {
        Self { tool, settings }
    }
}

impl ToolFactory for BuiltinToolFactory {
    fn create(&self) -> Box<dyn Tool> {
        self.tool.create(&self.settings)
    }

    fn tool_name(&self) -> &str {
        self.tool.name(self.settings.wiring)
    }

    fn tool_description(&self) -> &str {
        self.tool.description(self.settings.wiring)
    }
}

impl ToolRegistry {
    /// Create an empty tool registry
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Registry with the built-in tools created under `settings`
    pub fn with_builtins(settings: &ToolSettings) -> Self {
        let mut registry = Self::new();
        for tool in BuiltinTool::ALL {
            registry.register_factory(Box::new(BuiltinToolFactory::new(tool, settings.clone())));
        }
        registry
    }

    /// Register a tool factory, replacing any factory with the same name
    pub fn register_factory(&mut self, factory: Box<dyn ToolFactory>) {
        match self
            .factories
            .iter()
            .position(|f| f.tool_name() == factory.tool_name())
        {
            Some(index) => self.factories[index] = factory,
            None => self.factories.push(factory),
        }
    }

    /// Create a tool by name
    pub fn create_tool(&self, name: &str) -> Option<Box<dyn Tool>> {
        self.find(name).map(|factory| factory.create())
    }

    /// List all available tool names
    pub fn list_tools(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.tool_name()).collect()
    }

    /// Get tool information
    pub fn get_tool_info(&self, name: &str) -> Option<(&str, &str)> {
        self.find(name)
            .map(|factory| (factory.tool_name(), factory.tool_description()))
    }

    /// Usage examples of a tool, empty for unknown names
    pub fn get_tool_examples(&self, name: &str) -> Vec<ToolExample> {
        self.create_tool(name)
            .map(|tool| tool.examples())
            .unwrap_or_default()
    }

    /// Create a tool executor with the specified tools
    pub fn create_executor(&self, tool_names: &[String]) -> ToolExecutor {
        let mut executor = ToolExecutor::new();

        for name in tool_names {
            match self.create_tool(name) {
                Some(tool) => executor.register_tool(tool),
                None => tracing::warn!("Skipping unknown tool: {}", name),
            }
        }

        executor
    }

    /// Create a tool executor with all available tools
    pub fn create_executor_with_all(&self) -> ToolExecutor {
        let mut executor = ToolExecutor::new();

        for factory in &self.factories {
            executor.register_tool(factory.create());
        }

        executor
    }

    fn find(&self, name: &str) -> Option<&dyn ToolFactory> {
        self.factories
            .iter()
            .find(|f| f.tool_name() == name)
            .map(|f| f.as_ref())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins(&ToolSettings::default())
    }
}
