//! Command store backed by immutable, versioned snapshots.
//!
//! Reloading builds a complete new [`RegistrySnapshot`] and swaps one `Arc`.
//! Readers clone the current `Arc` and never see a half-replaced store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;

use crate::command::CommandDefinition;
use crate::error::LoaderError;
use crate::loader::CommandLoader;

/// Read access to command definitions.
pub trait CommandStore: Send + Sync {
    /// Look up a command by name and optional namespace.
    fn lookup(&self, name: &str, namespace: Option<&str>) -> Option<Arc<CommandDefinition>>;

    /// Sorted display identifiers of every known command.
    fn list_names(&self) -> Vec<String>;

    /// A view that stays consistent for the whole of one execution.
    fn pin(self: Arc<Self>) -> Arc<dyn CommandStore>;
}

/// Tool names currently enabled in the session.
///
/// Only consulted for an advisory warning; never used to block execution.
pub trait ToolAvailability: Send + Sync {
    fn enabled_tools(&self) -> HashSet<String>;
}

impl ToolAvailability for HashSet<String> {
    fn enabled_tools(&self) -> HashSet<String> {
        self.clone()
    }
}

impl ToolAvailability for Vec<String> {
    fn enabled_tools(&self) -> HashSet<String> {
        self.iter().cloned().collect()
    }
}

fn make_key(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}:{name}"),
        _ => name.to_string(),
    }
}

/// One immutable generation of the registry.
#[derive(Debug)]
pub struct RegistrySnapshot {
    version: u64,
    loaded_at: DateTime<Utc>,
    commands: HashMap<String, Arc<CommandDefinition>>,
}

impl RegistrySnapshot {
    fn empty() -> Self {
        Self {
            version: 0,
            loaded_at: Utc::now(),
            commands: HashMap::new(),
        }
    }

    fn build(version: u64, definitions: impl IntoIterator<Item = CommandDefinition>) -> Self {
        let commands = definitions
            .into_iter()
            .map(|cmd| {
                let key = make_key(&cmd.name, cmd.namespace.as_deref());
                (key, Arc::new(cmd))
            })
            .collect();

        Self {
            version,
            loaded_at: Utc::now(),
            commands,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn get(&self, name: &str, namespace: Option<&str>) -> Option<&Arc<CommandDefinition>> {
        self.commands.get(&make_key(name, namespace))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All commands, ordered by qualified name.
    pub fn list(&self) -> Vec<Arc<CommandDefinition>> {
        let mut commands: Vec<_> = self.commands.values().cloned().collect();
        commands.sort_by_key(|cmd| cmd.qualified_name());
        commands
    }
}

impl CommandStore for RegistrySnapshot {
    fn lookup(&self, name: &str, namespace: Option<&str>) -> Option<Arc<CommandDefinition>> {
        self.get(name, namespace).cloned()
    }

    fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.values().map(|c| c.display_name()).collect();
        names.sort();
        names
    }

    fn pin(self: Arc<Self>) -> Arc<dyn CommandStore> {
        self
    }
}

/// Registry of custom commands.
#[derive(Debug)]
pub struct CommandRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RegistrySnapshot::empty())),
        }
    }

    /// Create a registry holding `definitions` as its first snapshot.
    pub fn with_commands(definitions: impl IntoIterator<Item = CommandDefinition>) -> Self {
        let registry = Self::new();
        registry.replace(definitions);
        registry
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Replace the whole contents with `definitions`.
    ///
    /// Later definitions with the same `(name, namespace)` win. Returns the
    /// new snapshot version.
    pub fn replace(&self, definitions: impl IntoIterator<Item = CommandDefinition>) -> u64 {
        let mut current = self.current.write();
        let snapshot = RegistrySnapshot::build(current.version + 1, definitions);
        let version = snapshot.version;
        *current = Arc::new(snapshot);
        version
    }

    /// Discover commands with `loader` and swap them in.
    ///
    /// Returns the number of commands loaded.
    pub async fn reload(&self, loader: &CommandLoader) -> Result<usize, LoaderError> {
        let definitions = loader.load_all().await?;
        let count = definitions.len();
        let version = self.replace(definitions);
        info!("Command registry loaded {} command(s) (version {})", count, version);
        Ok(count)
    }
}

impl CommandStore for CommandRegistry {
    fn lookup(&self, name: &str, namespace: Option<&str>) -> Option<Arc<CommandDefinition>> {
        self.snapshot().lookup(name, namespace)
    }

    fn list_names(&self) -> Vec<String> {
        self.snapshot().list_names()
    }

    fn pin(self: Arc<Self>) -> Arc<dyn CommandStore> {
        self.snapshot()
    }
}
