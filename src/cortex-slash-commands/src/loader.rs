//! Command loader for reading command definitions from the filesystem.
//!
//! Each search root is walked with an explicit worklist. Every non-hidden
//! subdirectory adds one namespace segment, so `<root>/git/pr/open.md` loads
//! as `git:pr:open`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::command::{CommandDefinition, Scope};
use crate::error::LoaderError;

/// Project command directory, relative to the project root.
pub const PROJECT_COMMANDS_DIR: &str = ".cortex/commands";

/// Default user command directory: `<config dir>/cortex/commands`.
pub fn default_user_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cortex").join("commands"))
}

/// Loader for custom commands from filesystem.
#[derive(Debug, Clone)]
pub struct CommandLoader {
    /// Search roots in order of priority.
    search_dirs: Vec<(PathBuf, Scope)>,
}

impl CommandLoader {
    /// Create a loader for a project root and an optional user directory.
    ///
    /// Project commands live in `<project_root>/.cortex/commands` and shadow
    /// user commands with the same qualified name.
    pub fn new(project_root: impl AsRef<Path>, user_dir: Option<PathBuf>) -> Self {
        let mut search_dirs = vec![(project_root.as_ref().join(PROJECT_COMMANDS_DIR), Scope::Project)];
        if let Some(user_dir) = user_dir {
            search_dirs.push((user_dir, Scope::User));
        }
        Self { search_dirs }
    }

    /// Create a loader with explicit search roots, highest priority first.
    pub fn with_dirs(dirs: impl IntoIterator<Item = (PathBuf, Scope)>) -> Self {
        Self {
            search_dirs: dirs.into_iter().collect(),
        }
    }

    pub fn search_dirs(&self) -> &[(PathBuf, Scope)] {
        &self.search_dirs
    }

    /// Load all commands from all search roots.
    ///
    /// A definition from an earlier root shadows one with the same qualified
    /// name from a later root. Missing roots are skipped.
    pub async fn load_all(&self) -> Result<Vec<CommandDefinition>, LoaderError> {
        let mut commands = Vec::new();
        let mut seen = HashSet::new();

        for (dir, scope) in &self.search_dirs {
            match self.load_from_directory(dir, *scope).await {
                Ok(dir_commands) => {
                    for cmd in dir_commands {
                        if seen.insert(cmd.qualified_name()) {
                            commands.push(cmd);
                        } else {
                            debug!(
                                "Skipping shadowed command '{}' from {:?}",
                                cmd.qualified_name(),
                                cmd.source_path
                            );
                        }
                    }
                }
                Err(LoaderError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Command directory {:?} does not exist, skipping", dir);
                }
                Err(e) => {
                    warn!("Error loading commands from {:?}: {}", dir, e);
                }
            }
        }

        Ok(commands)
    }

    /// Load every command below `root`, recursing into subdirectories.
    ///
    /// Only an unreadable `root` is an error; malformed files and unreadable
    /// subdirectories are logged and skipped.
    pub async fn load_from_directory(
        &self,
        root: &Path,
        scope: Scope,
    ) -> Result<Vec<CommandDefinition>, LoaderError> {
        let mut commands = Vec::new();
        let mut pending: Vec<(PathBuf, Vec<String>)> = vec![(root.to_path_buf(), Vec::new())];

        while let Some((dir, segments)) = pending.pop() {
            let entries = match read_sorted(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir == root => return Err(e.into()),
                Err(e) => {
                    warn!("Failed to read command directory {:?}: {}", dir, e);
                    continue;
                }
            };

            let namespace = (!segments.is_empty()).then(|| segments.join(":"));
            let mut subdirs = Vec::new();

            for path in entries {
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if file_name.starts_with('.') {
                    continue;
                }

                let Ok(file_type) = fs::symlink_metadata(&path).await.map(|m| m.file_type())
                else {
                    continue;
                };

                if file_type.is_dir() {
                    let mut child = segments.clone();
                    child.push(file_name.to_string());
                    subdirs.push((path, child));
                } else if path.extension().is_some_and(|ext| ext == "md") {
                    match self.load_from_file(&path, namespace.clone(), scope).await {
                        Ok(cmd) => {
                            debug!("Loaded command '{}' from {:?}", cmd.qualified_name(), path);
                            commands.push(cmd);
                        }
                        Err(e) => {
                            warn!("Failed to load command from {:?}: {}", path, e);
                        }
                    }
                }
            }

            // Reversed so the stack pops subdirectories in name order.
            pending.extend(subdirs.into_iter().rev());
        }

        Ok(commands)
    }

    /// Load a single command from a file.
    pub async fn load_from_file(
        &self,
        path: &Path,
        namespace: Option<String>,
        scope: Scope,
    ) -> Result<CommandDefinition, LoaderError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| LoaderError::InvalidPath(format!("Invalid filename: {:?}", path)))?
            .to_string();

        let content = fs::read_to_string(path).await?;

        let command = CommandDefinition::parse(name, &content, path.to_path_buf())
            .map_err(|source| LoaderError::Definition {
                path: path.to_path_buf(),
                source,
            })?
            .with_namespace(namespace)
            .with_scope(scope);

        Ok(command)
    }
}

async fn read_sorted(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
