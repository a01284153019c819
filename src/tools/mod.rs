//! Tool definitions advertised to the assistant.
//!
//! [`ToolRegistry::default_lending`] is the single source of truth for the toolset:
//! the hosted built-ins (`code_interpreter`, `file_search`) plus the custom
//! lending functions implemented in [`lending`] and routed by [`dispatcher`].

pub mod dispatcher;
pub mod lending;

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value, json};
use thiserror::Error;

pub use dispatcher::ToolDispatcher;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown built-in tool: {0}")]
    UnknownBuiltin(String),
    #[error("run {0} has no required action")]
    NoRequiredAction(String),
}

// ── Schemas ──────────────────────────────────────────────────────────────────

/// JSON-Schema description of one custom function tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// Property name → JSON Schema fragment.
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    /// Add a property. `schema` is the JSON Schema fragment, e.g. `{"type": "string"}`.
    pub fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Encode in the `tools` entry format expected by the Assistants API.
    pub fn to_openai_value(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": self.properties,
                    "required": self.required,
                },
            },
        })
    }
}

/// Tools hosted by the service itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTool {
    CodeInterpreter,
    FileSearch,
}

impl BuiltinTool {
    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinTool::CodeInterpreter => "code_interpreter",
            BuiltinTool::FileSearch => "file_search",
        }
    }
}

impl fmt::Display for BuiltinTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuiltinTool {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code_interpreter" => Ok(BuiltinTool::CodeInterpreter),
            "file_search" => Ok(BuiltinTool::FileSearch),
            other => Err(ToolError::UnknownBuiltin(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RegisteredTool {
    Builtin(BuiltinTool),
    Function(ToolSchema),
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Ordered set of built-in and custom tools. Order is preserved in
/// [`ToolRegistry::openai_tools`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard lending toolset.
    pub fn default_lending() -> Self {
        let mut reg = Self::new();
        reg.push_builtin(BuiltinTool::CodeInterpreter);
        reg.push_builtin(BuiltinTool::FileSearch);

        reg.add_function(
            ToolSchema::new(
                lending::WEB_SEARCH,
                "Real-time Bing search for rates, regulations, or news.",
            )
            .property("query", json!({ "type": "string", "description": "Search query." }), true)
            .property(
                "freshness_days",
                json!({
                    "type": "integer",
                    "description": "Restrict results to the last N days (optional).",
                }),
                false,
            ),
        );

        reg.add_function(
            ToolSchema::new(lending::GET_RATE_SHEET, "Fetch the latest pricing for a loan scenario.")
                .property("loanType", json!({ "type": "string" }), true)
                .property("fico", json!({ "type": "integer" }), true)
                .property("ltv", json!({ "type": "number" }), true),
        );

        reg.add_function(
            ToolSchema::new(
                lending::CREATE_LOAN_DOC,
                "Generate or fill a lending document and return the file_id.",
            )
            .property("borrowerId", json!({ "type": "string" }), true)
            .property("templateId", json!({ "type": "string" }), true),
        );
        reg
    }

    pub fn add_function(&mut self, schema: ToolSchema) {
        self.tools.push(RegisteredTool::Function(schema));
    }

    /// Register a hosted tool by name. Only `code_interpreter` and
    /// `file_search` are accepted.
    pub fn add_builtin(&mut self, builtin_name: &str) -> Result<(), ToolError> {
        let builtin = builtin_name.parse::<BuiltinTool>()?;
        self.push_builtin(builtin);
        Ok(())
    }

    fn push_builtin(&mut self, builtin: BuiltinTool) {
        self.tools.push(RegisteredTool::Builtin(builtin));
    }

    pub fn has_builtin(&self, builtin: BuiltinTool) -> bool {
        self.tools.iter().any(|t| *t == RegisteredTool::Builtin(builtin))
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter_map(|t| match t {
                RegisteredTool::Function(s) => Some(s.name.as_str()),
                RegisteredTool::Builtin(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The `tools` array for assistant creation.
    pub fn openai_tools(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| match t {
                RegisteredTool::Builtin(b) => json!({ "type": b.as_str() }),
                RegisteredTool::Function(s) => s.to_openai_value(),
            })
            .collect()
    }
}
