//! Built-in tools
//!
//! The research agent ships exactly three tools. [`BuiltinTool`] names them and
//! decides which handler each registration is bound to under a [`ToolWiring`].

pub mod save;
pub mod search;
pub mod wikipedia;

#[cfg(test)]
mod test_server;

pub use save::{save_to_txt, SaveTool};
pub use search::SearchTool;
pub use wikipedia::WikipediaTool;

use crate::config::{ToolSettings, ToolWiring};
use crate::tools::Tool;
use serde::{Deserialize, Serialize};

const LEGACY_SEARCH_NAME: &str = "search_text_to_file";
const LEGACY_SEARCH_DESCRIPTION: &str =
    "useful for when you need to answer questions about current events or the current state";
const LEGACY_SAVE_DESCRIPTION: &str = "Search the web for relevant information";

const SAVE_NAME: &str = "save_text_to_file";
const SAVE_DESCRIPTION: &str = "Save structured research data to a text file";

/// The built-in tools, in the order they are offered to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    Search,
    Wikipedia,
    Save,
}

impl BuiltinTool {
    pub const ALL: [BuiltinTool; 3] = [
        BuiltinTool::Search,
        BuiltinTool::Wikipedia,
        BuiltinTool::Save,
    ];

    /// Registered name under the given wiring
    pub fn name(&self, wiring: ToolWiring) -> &'static str {
        match (self, wiring) {
            (BuiltinTool::Search, ToolWiring::Intended) => "web_search",
            (BuiltinTool::Search, ToolWiring::Legacy) => LEGACY_SEARCH_NAME,
            (BuiltinTool::Wikipedia, _) => "wikipedia",
            (BuiltinTool::Save, _) => SAVE_NAME,
        }
    }

    /// Description shown to the model under the given wiring
    pub fn description(&self, wiring: ToolWiring) -> &'static str {
        match (self, wiring) {
            (BuiltinTool::Search, ToolWiring::Intended) => {
                "Search the web for relevant information. Useful for questions about current events or the current state of a topic."
            }
            (BuiltinTool::Search, ToolWiring::Legacy) => LEGACY_SEARCH_DESCRIPTION,
            (BuiltinTool::Wikipedia, _) => {
                "Look up a topic on Wikipedia and return summaries of the best matching pages."
            }
            (BuiltinTool::Save, ToolWiring::Intended) => SAVE_DESCRIPTION,
            (BuiltinTool::Save, ToolWiring::Legacy) => LEGACY_SAVE_DESCRIPTION,
        }
    }

    /// Build the handler for this registration
    ///
    /// Under legacy wiring the search registration is bound to the save
    /// handler, so calling it appends to the output file.
    pub fn create(&self, settings: &ToolSettings) -> Box<dyn Tool> {
        let wiring = settings.wiring;
        match (self, wiring) {
            (BuiltinTool::Search, ToolWiring::Intended) => {
                Box::new(SearchTool::new(settings.search_max_results))
            }
            (BuiltinTool::Wikipedia, _) => Box::new(WikipediaTool::new(
                settings.wikipedia_top_k,
                settings.wikipedia_max_chars,
            )),
            (BuiltinTool::Search, ToolWiring::Legacy) | (BuiltinTool::Save, _) => {
                Box::new(SaveTool::new(
                    self.name(wiring),
                    self.description(wiring),
                    settings.output_file.clone(),
                ))
            }
        }
    }
}
