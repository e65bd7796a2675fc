//! Error types for the slash command pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing a command definition file.
///
/// These are fatal for the one file being parsed; the loader logs and skips it.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The file does not start with a `---` header line.
    #[error("Command file missing frontmatter")]
    MissingFrontmatter,

    /// Invalid frontmatter format.
    #[error("Invalid frontmatter: {0}")]
    InvalidFrontmatter(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A header field has the wrong type or value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised while parsing a permission spec such as `Bash(git add:*)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("Empty permission specification")]
    Empty,

    #[error("Invalid permission format: {0}")]
    InvalidFormat(String),
}

/// Failures of one command execution.
///
/// Soft failures (shell faults, missing files, truncation) never show up here;
/// they become warnings on the [`ExecutionResult`](crate::ExecutionResult).
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// No command with this name (and namespace) is known.
    #[error("Command '/{name}' not found. Available commands: {}", available.join(", "))]
    NotFound {
        name: String,
        namespace: Option<String>,
        available: Vec<String>,
    },

    /// Nested invocations went deeper than the composition ceiling.
    #[error(
        "maximum composition depth ({max}) exceeded - check for circular command references"
    )]
    DepthExceeded { max: usize },

    /// Input could not be read as a `/name args` invocation.
    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),
}

impl ExecutionError {
    /// Returns the exit code for CLI error reporting.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionError::NotFound { .. } => 2,
            ExecutionError::DepthExceeded { .. } => 3,
            ExecutionError::InvalidInvocation(_) => 4,
        }
    }
}

/// Errors that can occur when loading commands from disk.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// IO error reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Command parsing error.
    #[error("Command error in {path}: {source}")]
    Definition {
        path: PathBuf,
        #[source]
        source: DefinitionError,
    },

    /// Invalid path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
