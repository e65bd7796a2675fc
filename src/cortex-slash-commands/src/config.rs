//! TOML configuration for the slash command pipeline.
//!
//! ```toml
//! project_dir = "/path/to/project"
//! user_dir = "/home/me/.config/cortex/commands"
//! working_dir = "/path/to/project"
//! bash_timeout_secs = 30
//! shell_gate = "granular"
//! allow_absolute_file_refs = false
//! available_tools = ["bash", "read", "edit"]
//! ```
//!
//! Every key is optional. A missing config file yields the defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::executor::Executor;
use crate::loader::{CommandLoader, default_user_dir};
use crate::process::DEFAULT_BASH_TIMEOUT_SECS;
use crate::registry::CommandStore;
use crate::template::{ShellGate, TemplateProcessor};

/// Config file name inside `<config dir>/cortex/`.
pub const CONFIG_FILE_NAME: &str = "slash-commands.toml";

/// Slash command pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashCommandConfig {
    /// Project root; commands are read from `<project_dir>/.cortex/commands`.
    /// Defaults to the current directory.
    pub project_dir: Option<PathBuf>,

    /// User command directory. Defaults to `<config dir>/cortex/commands`.
    pub user_dir: Option<PathBuf>,

    /// Directory for shell snippets and relative file references.
    /// Defaults to the project root.
    pub working_dir: Option<PathBuf>,

    pub bash_timeout_secs: u64,

    pub shell_gate: ShellGate,

    /// Whether `@/absolute` references skip the working directory check.
    pub allow_absolute_file_refs: bool,

    /// Tools enabled in the session, for the advisory tool check.
    pub available_tools: Option<Vec<String>>,
}

impl Default for SlashCommandConfig {
    fn default() -> Self {
        Self {
            project_dir: None,
            user_dir: None,
            working_dir: None,
            bash_timeout_secs: DEFAULT_BASH_TIMEOUT_SECS,
            shell_gate: ShellGate::default(),
            allow_absolute_file_refs: true,
            available_tools: None,
        }
    }
}

impl SlashCommandConfig {
    /// `<config dir>/cortex/slash-commands.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cortex").join(CONFIG_FILE_NAME))
    }

    /// Parse a config from TOML text.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config file {:?} not found, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::from_toml(&content, path)
    }

    /// Load the config from its default location.
    pub async fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path).await,
            None => Ok(Self::default()),
        }
    }

    pub fn project_root(&self) -> PathBuf {
        self.project_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn working_root(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| self.project_root())
    }

    pub fn bash_timeout(&self) -> Duration {
        Duration::from_secs(self.bash_timeout_secs)
    }

    /// Build a loader for the project and user command directories.
    pub fn build_loader(&self) -> CommandLoader {
        let user_dir = self.user_dir.clone().or_else(default_user_dir);
        CommandLoader::new(self.project_root(), user_dir)
    }

    /// Build a template processor with these settings.
    pub fn build_processor(&self) -> TemplateProcessor {
        TemplateProcessor::new(self.working_root())
            .with_timeout(self.bash_timeout())
            .with_shell_gate(self.shell_gate)
            .with_absolute_file_refs(self.allow_absolute_file_refs)
    }

    /// Build an executor over `store` with these settings.
    pub fn build_executor(&self, store: Arc<dyn CommandStore>) -> Executor {
        let executor = Executor::new(store, self.build_processor());
        match &self.available_tools {
            Some(tools) => {
                let tools: HashSet<String> = tools.iter().cloned().collect();
                executor.with_tool_availability(Arc::new(tools))
            }
            None => executor,
        }
    }
}
