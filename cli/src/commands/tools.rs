//! Tools listing command

use anyhow::Result;
use research_core::tools::ToolRegistry;
use research_core::{ToolSettings, ToolWiring};
use tracing::info;

/// Show the tools the agent is given under `wiring`
pub async fn tools_command(wiring: ToolWiring) -> Result<()> {
    info!("Listing available tools ({:?} wiring)", wiring);
    print!("{}", render_tools(wiring));
    Ok(())
}

fn render_tools(wiring: ToolWiring) -> String {
    let settings = ToolSettings {
        wiring,
        ..ToolSettings::default()
    };
    let registry = ToolRegistry::with_builtins(&settings);

    let mut out = String::from("Available Tools\n\n");
    for name in registry.list_tools() {
        let Some((tool_name, description)) = registry.get_tool_info(name) else {
            continue;
        };
        out.push_str(&format!("  {}\n", tool_name));
        let first_line = description.lines().next().unwrap_or(description);
        out.push_str(&format!("    {}\n", first_line));
        for example in registry.get_tool_examples(name) {
            out.push_str(&format!(
                "    Example: {} `{}`\n",
                example.description, example.parameters
            ));
        }
        out.push('\n');
    }
    out
}
