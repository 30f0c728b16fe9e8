//! Prompt template for the research agent
//!
//! The conversation sent to the model on every iteration is laid out as
//! system instruction, chat history, the query, then the agent scratchpad
//! (the tool calls and observations accumulated so far).

use crate::error::Result;
use crate::llm::LlmMessage;
use crate::research::format_instructions;
use handlebars::Handlebars;
use serde_json::json;

/// Default instruction text placed ahead of the format instructions
pub const RESEARCH_ASSISTANT_PROMPT: &str = "You are a research assistant that will help generate a research paper.\n\
Answer the user query and use necessary tools.";

const SYSTEM_TEMPLATE: &str = "{{instructions}}\n\
Wrap the output in this format and provide no other text\n\
{{format_instructions}}";

/// Renders the message list for one LLM call
pub struct PromptTemplate {
    registry: Handlebars<'static>,
    instructions: String,
    format_instructions: String,
}

impl PromptTemplate {
    /// Template with the default research-assistant instructions
    pub fn new() -> Self {
        Self::with_instructions(RESEARCH_ASSISTANT_PROMPT)
    }

    /// Template with custom instruction text; format instructions are still appended
    pub fn with_instructions(instructions: impl Into<String>) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        Self {
            registry,
            instructions: instructions.into(),
            format_instructions: format_instructions(),
        }
    }

    /// Render the system message text
    pub fn system_prompt(&self) -> Result<String> {
        let rendered = self.registry.render_template(
            SYSTEM_TEMPLATE,
            &json!({
                "instructions": self.instructions,
                "format_instructions": self.format_instructions,
            }),
        )?;
        Ok(rendered)
    }

    /// Build the full message list: system, chat history, query, scratchpad
    pub fn format_messages(
        &self,
        chat_history: &[LlmMessage],
        query: &str,
        agent_scratchpad: &[LlmMessage],
    ) -> Result<Vec<LlmMessage>> {
        let mut messages = Vec::with_capacity(chat_history.len() + agent_scratchpad.len() + 2);
        messages.push(LlmMessage::system(self.system_prompt()?));
        messages.extend_from_slice(chat_history);
        messages.push(LlmMessage::user(query));
        messages.extend_from_slice(agent_scratchpad);
        Ok(messages)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new()
    }
}
