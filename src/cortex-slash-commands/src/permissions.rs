//! Granular tool permissions.
//!
//! A permission spec is `tool` or `tool(pattern)`:
//!
//! - `bash` allows every shell command
//! - `Bash(git add:*)` allows only commands starting with `git add`
//!
//! Tool names are case-folded. Patterns are trailing-wildcard prefixes, not
//! globs, and are only evaluated for `bash`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PermissionError;

/// Tool name that gates shell execution.
pub const BASH_TOOL: &str = "bash";

/// `Tool(pattern)`. Group 1: tool, group 2: optional pattern.
static PERMISSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)(?:\(([^()]+)\))?$").expect("permission regex pattern is valid")
});

/// A parsed tool permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranularPermission {
    /// Lowercased tool name.
    pub tool: String,
    /// Raw prefix spec, e.g. `git add:*`.
    pub pattern: Option<String>,
}

impl GranularPermission {
    pub fn new(tool: impl Into<String>, pattern: Option<&str>) -> Self {
        Self {
            tool: tool.into().to_lowercase(),
            pattern: pattern.map(str::to_string),
        }
    }

    pub fn is_bash(&self) -> bool {
        self.tool == BASH_TOOL
    }

    /// Check if this permission allows a specific shell command.
    ///
    /// Non-bash permissions never allow shell commands.
    pub fn allows_command(&self, command: &str) -> bool {
        if !self.is_bash() {
            return false;
        }

        match &self.pattern {
            None => true,
            Some(pattern) => command.trim_start().starts_with(literal_prefix(pattern)),
        }
    }
}

impl fmt::Display for GranularPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            Some(pattern) => write!(f, "{}({pattern})", self.tool),
            None => f.write_str(&self.tool),
        }
    }
}

/// Strip the trailing wildcard (`:*`, `*` or `:`) from a pattern.
fn literal_prefix(pattern: &str) -> &str {
    pattern.trim_end_matches([':', '*'])
}

/// Parse a permission specification.
pub fn parse_permission(spec: &str) -> Result<GranularPermission, PermissionError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(PermissionError::Empty);
    }

    let caps = PERMISSION_REGEX
        .captures(spec)
        .ok_or_else(|| PermissionError::InvalidFormat(spec.to_string()))?;

    let tool = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let pattern = caps.get(2).map(|m| m.as_str());

    Ok(GranularPermission::new(tool, pattern))
}

/// Parse a list of permission specifications, failing on the first bad one.
pub fn parse_permissions<S: AsRef<str>>(
    specs: &[S],
) -> Result<Vec<GranularPermission>, PermissionError> {
    specs.iter().map(|s| parse_permission(s.as_ref())).collect()
}

/// Check if a tool appears in the permissions at all.
///
/// Patterns are not evaluated here; use [`is_bash_command_allowed`] for shell
/// commands.
pub fn is_tool_allowed(tool_name: &str, permissions: &[GranularPermission]) -> bool {
    let tool = tool_name.to_lowercase();
    permissions.iter().any(|p| p.tool == tool)
}

/// Outcome of checking one shell command against a permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BashDecision {
    Allowed,
    Denied { reason: String },
}

impl BashDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, BashDecision::Allowed)
    }
}

/// Check if a specific shell command is allowed by any bash permission.
pub fn is_bash_command_allowed(command: &str, permissions: &[GranularPermission]) -> BashDecision {
    let bash: Vec<&GranularPermission> = permissions.iter().filter(|p| p.is_bash()).collect();

    if bash.is_empty() {
        return BashDecision::Denied {
            reason: "bash not in allowed-tools".to_string(),
        };
    }

    if bash.iter().any(|p| p.allows_command(command)) {
        return BashDecision::Allowed;
    }

    let patterns: Vec<String> = bash
        .iter()
        .filter_map(|p| p.pattern.as_deref())
        .map(|p| format!("'{p}'"))
        .collect();

    BashDecision::Denied {
        reason: format!(
            "Command does not match allowed patterns: {}",
            patterns.join(", ")
        ),
    }
}

/// Human-readable summary of the bash permissions.
pub fn bash_permissions_summary(permissions: &[GranularPermission]) -> String {
    let bash: Vec<&GranularPermission> = permissions.iter().filter(|p| p.is_bash()).collect();

    if bash.is_empty() {
        return "no bash commands allowed".to_string();
    }

    let patterns: Vec<&str> = bash.iter().filter_map(|p| p.pattern.as_deref()).collect();
    if patterns.len() < bash.len() {
        return "all bash commands".to_string();
    }

    patterns.join(", ")
}
