//! Tool descriptor and result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Describes one callable tool: its name, purpose, and accepted arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name within a registry.
    pub name: String,
    /// Human-readable description shown in catalogs.
    pub description: String,
    /// Structural description of the accepted arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    /// Builds a descriptor for the supplied name and description.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Object schema accepted by a tool: property descriptions plus the list of
/// required field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    /// Schema kind; always `"object"` for tool arguments.
    #[serde(rename = "type")]
    pub kind: String,
    /// Per-property schema fragments, keyed by field name.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Names of fields that must be present in the arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl InputSchema {
    /// Builds an object schema from properties and required field names.
    #[must_use]
    pub fn object<I, S>(properties: Map<String, Value>, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: "object".to_owned(),
            properties,
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds an empty object schema for tools that take no arguments.
    #[must_use]
    pub fn empty() -> Self {
        Self::object(Map::new(), Vec::<String>::new())
    }
}

/// Outcome of one tool call: ordered content blocks plus an error flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Ordered content blocks produced by the handler.
    pub content: Vec<ContentBlock>,
    /// Set when the result describes a failure; omitted on the wire when false.
    #[serde(rename = "isError", default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolResult {
    /// Builds a successful result holding a single text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Builds an error result holding a single text block.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Returns the text of the first text block, if any.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
        })
    }
}

/// One tagged content block inside a [`ToolResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    /// Plain text content.
    Text {
        /// The text payload.
        text: String,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}
