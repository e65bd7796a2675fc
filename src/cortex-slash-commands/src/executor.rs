//! Command execution: substitution, template processing, composition and
//! budgeting.

use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::budget::apply_char_budget;
use crate::command::{CommandDefinition, Scope};
use crate::composition::{MAX_COMPOSITION_DEPTH, find_invocations, split_spec};
use crate::error::ExecutionError;
use crate::permissions::{bash_permissions_summary, parse_permission, parse_permissions};
use crate::registry::{CommandStore, ToolAvailability};
use crate::substitution::substitute_variables;
use crate::template::TemplateProcessor;

/// Result of executing a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// The rendered prompt.
    pub prompt: String,

    /// Warnings from every stage, including nested invocations.
    pub warnings: Vec<String>,

    /// Shell snippets run across the whole composition tree.
    pub bash_commands_executed: usize,

    /// Files included across the whole composition tree.
    pub files_included: usize,

    pub requires_approval: bool,
    pub approval_message: Option<String>,

    /// The model to use, from the top-level command.
    pub model_override: Option<String>,
}

/// Serializable summary of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub namespace: Option<String>,
    pub scope: Scope,
    pub description: String,
    pub allowed_tools: Vec<String>,
    /// Which shell commands the template may run.
    pub bash_access: String,
    pub argument_hint: Option<String>,
    pub model: Option<String>,
    pub requires_approval: bool,
    pub source_path: PathBuf,
    /// Placeholders used by the template.
    pub hints: Vec<String>,
}

impl From<&CommandDefinition> for CommandInfo {
    fn from(cmd: &CommandDefinition) -> Self {
        Self {
            name: cmd.name.clone(),
            namespace: cmd.namespace.clone(),
            scope: cmd.scope,
            description: cmd.description().to_string(),
            allowed_tools: cmd.allowed_tools().to_vec(),
            bash_access: match parse_permissions(cmd.allowed_tools()) {
                Ok(perms) => bash_permissions_summary(&perms),
                Err(e) => format!("invalid allowed-tools: {e}"),
            },
            argument_hint: cmd.metadata.argument_hint.clone(),
            model: cmd.metadata.model.clone(),
            requires_approval: cmd.metadata.requires_approval,
            source_path: cmd.source_path.clone(),
            hints: cmd.hints(),
        }
    }
}

/// Executor for custom commands.
pub struct Executor {
    store: Arc<dyn CommandStore>,
    processor: TemplateProcessor,
    tools: Option<Arc<dyn ToolAvailability>>,
}

impl Executor {
    /// Create an executor over a command store.
    pub fn new(store: Arc<dyn CommandStore>, processor: TemplateProcessor) -> Self {
        Self {
            store,
            processor,
            tools: None,
        }
    }

    /// Compare each command's `allowed-tools` with the session's tools.
    ///
    /// Mismatches are logged and never block execution.
    pub fn with_tool_availability(mut self, tools: Arc<dyn ToolAvailability>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Execute a command and return only the rendered prompt.
    pub async fn execute(
        &self,
        name: &str,
        args: &str,
        namespace: Option<&str>,
    ) -> Result<String, ExecutionError> {
        self.execute_full(name, args, namespace, true)
            .await
            .map(|result| result.prompt)
    }

    /// Execute a command.
    ///
    /// With `process_advanced` off the prompt is exactly the substituted
    /// template: no shell execution, file inclusion or nested expansion.
    pub async fn execute_full(
        &self,
        name: &str,
        args: &str,
        namespace: Option<&str>,
        process_advanced: bool,
    ) -> Result<ExecutionResult, ExecutionError> {
        let store = self.store.clone().pin();
        self.execute_at_depth(
            store,
            name.to_string(),
            args.to_string(),
            namespace.map(str::to_string),
            process_advanced,
            0,
        )
        .await
    }

    fn execute_at_depth(
        &self,
        store: Arc<dyn CommandStore>,
        name: String,
        args: String,
        namespace: Option<String>,
        process_advanced: bool,
        depth: usize,
    ) -> BoxFuture<'_, Result<ExecutionResult, ExecutionError>> {
        async move {
            if depth > MAX_COMPOSITION_DEPTH {
                return Err(ExecutionError::DepthExceeded {
                    max: MAX_COMPOSITION_DEPTH,
                });
            }

            let Some(command) = store.lookup(&name, namespace.as_deref()) else {
                return Err(ExecutionError::NotFound {
                    name,
                    namespace,
                    available: store.list_names(),
                });
            };

            if depth == 0 {
                info!("Executing command /{} ({})", command.qualified_name(), command.scope);
            } else {
                debug!(
                    "Executing nested command /{} at depth {}",
                    command.qualified_name(),
                    depth
                );
            }

            let mut result = ExecutionResult {
                prompt: substitute_variables(&command.template, &args),
                ..Default::default()
            };

            if process_advanced {
                let processed = self
                    .processor
                    .process(&result.prompt, command.allowed_tools(), true)
                    .await;
                result.prompt = processed.content;
                result.warnings = processed.warnings;
                result.bash_commands_executed = processed.bash_commands_executed;
                result.files_included = processed.files_included;

                self.expand_nested(&store, &mut result, depth).await;
            }

            self.check_tool_availability(&command);

            result.requires_approval = command.metadata.requires_approval;
            result.approval_message = command.metadata.approval_message.clone();
            result.model_override = command.metadata.model.clone();

            if let Some(max_chars) = command.metadata.max_chars {
                let original = result.prompt.chars().count();
                if original > max_chars {
                    result.prompt = apply_char_budget(&result.prompt, max_chars);
                    let truncated = result.prompt.chars().count();
                    info!(
                        "Truncated /{} from {} to {} chars",
                        command.qualified_name(),
                        original,
                        truncated
                    );
                    result.warnings.push(format!(
                        "Content truncated: {original} → {truncated} chars (max-chars: {max_chars})"
                    ));
                }
            }

            Ok(result)
        }
        .boxed()
    }

    /// Expand nested invocations known to the store.
    ///
    /// Invocations run one at a time in document order; replacements are then
    /// applied from the end of the text so earlier spans stay valid. A failed
    /// invocation becomes a warning and its token stays in the text.
    async fn expand_nested(
        &self,
        store: &Arc<dyn CommandStore>,
        result: &mut ExecutionResult,
        depth: usize,
    ) {
        let mut replacements = Vec::new();

        for invocation in find_invocations(&result.prompt) {
            if store
                .lookup(&invocation.name, invocation.namespace.as_deref())
                .is_none()
            {
                continue;
            }

            let nested = self
                .execute_at_depth(
                    store.clone(),
                    invocation.name.clone(),
                    invocation.args.clone(),
                    invocation.namespace.clone(),
                    true,
                    depth + 1,
                )
                .await;

            match nested {
                Ok(nested) => {
                    result.bash_commands_executed += nested.bash_commands_executed;
                    result.files_included += nested.files_included;
                    result.warnings.extend(
                        nested
                            .warnings
                            .into_iter()
                            .map(|w| format!("[/{}] {w}", invocation.spec)),
                    );
                    replacements.push((invocation.span, nested.prompt));
                }
                Err(e) => {
                    warn!("Failed to execute nested /{}: {}", invocation.spec, e);
                    result
                        .warnings
                        .push(format!("Failed to execute /{}: {e}", invocation.spec));
                }
            }
        }

        for (span, text) in replacements.into_iter().rev() {
            result.prompt.replace_range(span, &text);
        }
    }

    fn check_tool_availability(&self, command: &CommandDefinition) {
        let Some(tools) = &self.tools else {
            return;
        };
        if command.allowed_tools().is_empty() {
            return;
        }

        let enabled: Vec<String> = tools
            .enabled_tools()
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect();

        for perm in command
            .allowed_tools()
            .iter()
            .filter_map(|spec| parse_permission(spec).ok())
        {
            if !enabled.contains(&perm.tool) {
                warn!(
                    "Command /{} requests tool '{}' which is not enabled in this session",
                    command.qualified_name(),
                    perm.tool
                );
            }
        }
    }

    /// Get a summary of a command, if it exists.
    pub fn command_info(&self, name: &str, namespace: Option<&str>) -> Option<CommandInfo> {
        self.store
            .lookup(name, namespace)
            .map(|cmd| CommandInfo::from(cmd.as_ref()))
    }

    /// Display identifiers of all known commands.
    pub fn list_names(&self) -> Vec<String> {
        self.store.list_names()
    }
}

/// A parsed `/namespace:name args` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub namespace: Option<String>,
    pub args: String,
}

/// Parse a command invocation string.
///
/// Format: `/command_name arguments...` or `/namespace:name arguments...`.
/// Returns `None` if the input is not an invocation.
pub fn parse_invocation(input: &str) -> Option<Invocation> {
    let without_slash = input.trim().strip_prefix('/')?;
    let mut parts = without_slash.splitn(2, char::is_whitespace);

    let spec = parts.next().filter(|s| !s.is_empty())?;
    let args = parts.next().unwrap_or("").trim();

    let (namespace, name) = split_spec(spec);
    if name.is_empty() || namespace.is_some_and(str::is_empty) {
        return None;
    }

    Some(Invocation {
        name: name.to_string(),
        namespace: namespace.map(str::to_string),
        args: args.to_string(),
    })
}

/// Format a command for display.
pub fn format_command(qualified_name: &str, hints: &[String]) -> String {
    if hints.is_empty() {
        format!("/{qualified_name}")
    } else {
        format!("/{qualified_name} {}", hints.join(" "))
    }
}
