//! The research response schema

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final answer of a research run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchResponse {
    /// Short topic name or title
    pub topic: String,
    /// Plain-English summary of the findings
    pub summary: String,
    /// Source references or URLs
    pub sources: Vec<String>,
    /// Names of the tools used while researching
    pub tools: Vec<String>,
}

impl fmt::Display for ResearchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "topic={:?} summary={:?} sources={:?} tools={:?}",
            self.topic, self.summary, self.sources, self.tools
        )
    }
}

/// JSON schema of [`ResearchResponse`] as embedded in the prompt
///
/// The meta keys (`$schema`, `title`) are dropped, leaving only the shape the
/// model has to produce.
pub fn response_schema() -> serde_json::Value {
    let mut schema = serde_json::to_value(schema_for!(ResearchResponse))
        .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

/// Instructions telling the model how to format its final answer
pub fn format_instructions() -> String {
    let schema = serde_json::to_string(&response_schema()).unwrap_or_default();
    format!(
        "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\n\
         As an example, for the schema {{\"properties\": {{\"foo\": {{\"title\": \"Foo\", \"description\": \"a list of strings\", \"type\": \"array\", \"items\": {{\"type\": \"string\"}}}}}}, \"required\": [\"foo\"]}}\n\
         the object {{\"foo\": [\"bar\", \"baz\"]}} is a well-formatted instance of the schema. \
         The object {{\"properties\": {{\"foo\": [\"bar\", \"baz\"]}}}} is not well-formatted.\n\n\
         Here is the output schema:\n```\n{}\n```",
        schema
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = response_schema();
        let mut required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        required.sort();
        assert_eq!(required, vec!["sources", "summary", "tools", "topic"]);
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["properties"]["sources"]["type"], "array");
    }

    #[test]
    fn test_format_instructions_embed_schema() {
        let instructions = format_instructions();
        assert!(instructions.starts_with("The output should be formatted as a JSON instance"));
        assert!(instructions.contains("Here is the output schema:\n```\n{"));
        assert!(instructions.contains("\"topic\""));
        assert!(instructions.ends_with("}\n```"));
    }

    #[test]
    fn test_display() {
        let response = ResearchResponse {
            topic: "Rust".to_string(),
            summary: "A language.".to_string(),
            sources: vec!["https://www.rust-lang.org".to_string()],
            tools: vec!["wikipedia".to_string()],
        };
        assert_eq!(
            response.to_string(),
            "topic=\"Rust\" summary=\"A language.\" sources=[\"https://www.rust-lang.org\"] tools=[\"wikipedia\"]"
        );
    }
}
