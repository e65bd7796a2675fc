//! CLI argument structures and parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Loader and advisory warnings only (default)
    #[default]
    Warn,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Warn => "warn",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Render Cortex slash commands from the command line.
#[derive(Debug, Parser)]
#[command(name = "cortex-slash", version, about)]
pub struct Cli {
    /// Config file (default: <config dir>/cortex/slash-commands.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root; commands are read from <DIR>/.cortex/commands
    #[arg(long, global = true, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// User command directory
    #[arg(long, global = true, value_name = "DIR")]
    pub user_dir: Option<PathBuf>,

    /// Directory for shell snippets and file references
    #[arg(long, global = true, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Timeout for each shell snippet
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable trace logging
    #[arg(long, global = true)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn log_level(&self) -> LogLevel {
        if self.trace {
            LogLevel::Trace
        } else if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List available commands
    List(ListArgs),

    /// Show details of one command
    Show(ShowArgs),

    /// Render a command invocation
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Command name, e.g. `review` or `git:commit`
    pub name: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Substitute variables only: no shell, file inclusion or nesting
    #[arg(long)]
    pub raw: bool,

    /// Output the full result as JSON
    #[arg(long)]
    pub json: bool,

    /// The invocation, e.g. `/review src/main.rs`
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub invocation: Vec<String>,
}

impl RunArgs {
    /// The invocation as one line, with a leading `/`.
    pub fn invocation_line(&self) -> String {
        let line = self.invocation.join(" ");
        if line.trim_start().starts_with('/') {
            line
        } else {
            format!("/{line}")
        }
    }
}
