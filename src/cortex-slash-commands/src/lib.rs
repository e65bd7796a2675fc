//! Custom slash commands for Cortex.
//!
//! This crate renders user-authored command templates into a prompt for an
//! assistant session. Commands are markdown files with YAML frontmatter:
//!
//! ```markdown
//! ---
//! description: "Review a file"
//! allowed-tools: [bash, "Bash(git diff:*)"]
//! argument-hint: "<file> [focus]"
//! model: "gpt-4o"     # optional: model override
//! requires-approval: false
//! max-chars: 8000     # optional: character budget
//! ---
//!
//! Review $1 with a focus on {{$2 or "correctness"}}.
//!
//! !`git diff -- $1`
//!
//! @$1
//!
//! /style-guide
//! ```
//!
//! # Pipeline
//!
//! 1. Variable substitution: `$ARGUMENTS`, `$N`, and `{{$N or "default"}}`.
//! 2. Shell snippets (`` !`cmd` `` and `` !``` `` blocks), gated on `bash` in
//!    `allowed-tools`.
//! 3. File references (`@path`), resolved against the working directory.
//! 4. Nested `/command` invocations, at most five levels deep.
//! 5. The optional `max-chars` budget.
//!
//! Soft failures become warnings on the [`ExecutionResult`]; only unknown
//! commands fail the call.
//!
//! # Search Paths
//!
//! Commands are loaded from:
//! 1. `<project>/.cortex/commands/` (project, takes precedence)
//! 2. `<config dir>/cortex/commands/` (user)
//!
//! Subdirectories become namespaces: `git/commit.md` is `/git:commit`.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cortex_slash_commands::{CommandRegistry, SlashCommandConfig};
//!
//! let config = SlashCommandConfig::load_default().await?;
//! let registry = Arc::new(CommandRegistry::new());
//! registry.reload(&config.build_loader()).await?;
//!
//! let executor = config.build_executor(registry.clone());
//! let result = executor.execute_full("review", "src/main.rs", None, true).await?;
//! println!("{}", result.prompt);
//! ```

mod budget;
mod command;
mod composition;
mod config;
mod error;
mod executor;
mod loader;
pub mod permissions;
mod process;
mod registry;
mod substitution;
mod template;
mod tool;

pub use budget::{TRUNCATION_MARKER, apply_char_budget};
pub use command::{CommandDefinition, CommandMetadata, Scope};
pub use composition::{MAX_COMPOSITION_DEPTH, NestedInvocation, find_invocations};
pub use config::{CONFIG_FILE_NAME, SlashCommandConfig};
pub use error::{ConfigError, DefinitionError, ExecutionError, LoaderError, PermissionError};
pub use executor::{
    CommandInfo, ExecutionResult, Executor, Invocation, format_command, parse_invocation,
};
pub use loader::{CommandLoader, PROJECT_COMMANDS_DIR, default_user_dir};
pub use permissions::{BashDecision, GranularPermission};
pub use process::{DEFAULT_BASH_TIMEOUT_SECS, ProcessOutcome, ProcessRunner};
pub use registry::{CommandRegistry, CommandStore, RegistrySnapshot, ToolAvailability};
pub use substitution::{hints, substitute_variables};
pub use template::{ProcessedTemplate, ShellGate, TemplateProcessor};
pub use tool::{SlashCommandTool, TOOL_NAME, ToolOutput};
