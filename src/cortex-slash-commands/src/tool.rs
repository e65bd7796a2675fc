//! Assistant tool that renders a slash command.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::executor::Executor;

/// Tool name exposed to the assistant.
pub const TOOL_NAME: &str = "slash_command";

/// Tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug)]
struct SlashCommandParams {
    name: String,
    namespace: Option<String>,
    args: String,
}

/// Exposes an [`Executor`] as the `slash_command` tool.
pub struct SlashCommandTool {
    executor: Arc<Executor>,
}

impl SlashCommandTool {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    pub fn name(&self) -> &str {
        TOOL_NAME
    }

    pub fn description(&self) -> String {
        let names = self.executor.list_names();
        let available = if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        };
        format!(
            "Run a custom slash command and return its rendered prompt. \
             Use `namespace:name` for namespaced commands. Available commands: {available}"
        )
    }

    /// Get parameter schema.
    pub fn parameters() -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command name, optionally as namespace:name. A leading '/' is accepted."
                },
                "args": {
                    "type": "string",
                    "description": "Arguments passed to the command template"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn parse_params(arguments: &Value) -> Result<SlashCommandParams, String> {
        let command = arguments
            .get("command")
            .and_then(Value::as_str)
            .map(|c| c.trim().trim_start_matches('/'))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| "command is required".to_string())?;

        let (namespace, name) = match command.split_once(':') {
            Some((ns, name)) => (Some(ns.to_string()), name.to_string()),
            None => (None, command.to_string()),
        };
        if name.is_empty() {
            return Err(format!("invalid command: {command}"));
        }

        let args = arguments
            .get("args")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(SlashCommandParams {
            name,
            namespace,
            args,
        })
    }

    pub async fn execute(&self, arguments: Value) -> ToolOutput {
        let params = match Self::parse_params(&arguments) {
            Ok(p) => p,
            Err(e) => return ToolOutput::error(e),
        };

        match self
            .executor
            .execute_full(&params.name, &params.args, params.namespace.as_deref(), true)
            .await
        {
            Ok(result) => ToolOutput::success(result.prompt).with_metadata(json!({
                "warnings": result.warnings,
                "bash_commands_executed": result.bash_commands_executed,
                "files_included": result.files_included,
                "requires_approval": result.requires_approval,
                "approval_message": result.approval_message,
                "model_override": result.model_override,
            })),
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }
}
