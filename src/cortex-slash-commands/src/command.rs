//! Command definitions and frontmatter parsing.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::DefinitionError;

/// Where a command definition was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// `<project>/.cortex/commands`
    Project,
    /// `<config dir>/cortex/commands`
    User,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Project => "project",
            Scope::User => "user",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata parsed from a command's YAML frontmatter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Human-readable description of the command. Never empty.
    pub description: String,

    /// Tool permission specs, e.g. `bash` or `Bash(git add:*)`.
    pub allowed_tools: Option<Vec<String>>,

    /// Usage hint shown next to the command name.
    pub argument_hint: Option<String>,

    /// Specific model to use for this command.
    pub model: Option<String>,

    pub disable_model_invocation: bool,

    /// Whether the rendered prompt needs user approval before use.
    pub requires_approval: bool,

    pub approval_message: Option<String>,

    /// Character ceiling for the rendered prompt.
    pub max_chars: Option<usize>,
}

/// A parsed command: metadata header plus template body.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    /// Name of the command (filename without extension).
    pub name: String,

    /// Namespace from directory nesting, segments joined by `:`.
    pub namespace: Option<String>,

    pub scope: Scope,

    pub metadata: CommandMetadata,

    /// Template content (after frontmatter), trimmed.
    pub template: String,

    /// Path to the source file.
    pub source_path: PathBuf,
}

impl CommandDefinition {
    /// Create a new command from parsed components.
    pub fn new(
        name: impl Into<String>,
        metadata: CommandMetadata,
        template: impl Into<String>,
        source_path: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            scope: Scope::Project,
            metadata,
            template: template.into(),
            source_path,
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Parse a command from file content.
    ///
    /// The content must be a markdown file with a YAML frontmatter block that
    /// carries at least a `description`.
    pub fn parse(
        name: impl Into<String>,
        content: &str,
        source_path: PathBuf,
    ) -> Result<Self, DefinitionError> {
        let (header, template) = split_frontmatter(content)?;
        let metadata = parse_metadata(header)?;
        Ok(Self::new(name, metadata, template, source_path))
    }

    /// Get the description of the command.
    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    /// `namespace:name`, or just `name` without a namespace.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Identifier used in listings and "not found" guidance.
    pub fn display_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{} ({}:{ns})", self.name, self.scope),
            None => format!("{} ({})", self.name, self.scope),
        }
    }

    /// Get the placeholders expected by this command's template.
    pub fn hints(&self) -> Vec<String> {
        crate::substitution::hints(&self.template)
    }

    pub fn allowed_tools(&self) -> &[String] {
        self.metadata.allowed_tools.as_deref().unwrap_or_default()
    }
}

/// Split content into its YAML header and trimmed template body.
///
/// Frontmatter is delimited by `---` lines at the start and end.
fn split_frontmatter(content: &str) -> Result<(&str, String), DefinitionError> {
    let content = content.trim_start_matches('\u{feff}');

    let Some(first_line_end) = content.find('\n') else {
        return Err(DefinitionError::MissingFrontmatter);
    };
    if content[..first_line_end].trim_end() != "---" {
        return Err(DefinitionError::MissingFrontmatter);
    }

    let rest = &content[first_line_end + 1..];

    // The closing delimiter is the first line that is exactly `---`.
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let header = &rest[..offset];
            let template = rest[offset + line.len()..].trim();
            return Ok((header, template.to_string()));
        }
        offset += line.len();
    }

    Err(DefinitionError::InvalidFrontmatter(
        "Missing closing '---' delimiter".to_string(),
    ))
}

/// Validate the header mapping into [`CommandMetadata`].
fn parse_metadata(header: &str) -> Result<CommandMetadata, DefinitionError> {
    let value: Value = if header.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(header)?
    };

    let map = match value {
        Value::Mapping(map) => map,
        Value::Null => Mapping::new(),
        _ => {
            return Err(DefinitionError::InvalidFrontmatter(
                "frontmatter must be a key-value mapping".to_string(),
            ));
        }
    };
    let header = Header(&map);

    let description = match header.get("description") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err(DefinitionError::MissingField("description".to_string())),
    };

    Ok(CommandMetadata {
        description,
        allowed_tools: header.string_list("allowed-tools")?,
        argument_hint: header.string("argument-hint")?,
        model: header.string("model")?,
        disable_model_invocation: header.flag("disable-model-invocation")?,
        requires_approval: header.flag("requires-approval")?,
        approval_message: header.string("approval-message")?,
        max_chars: header.char_limit("max-chars")?,
    })
}

/// Read access to a frontmatter mapping that accepts both `hyphen-case` and
/// `snake_case` keys.
struct Header<'a>(&'a Mapping);

impl Header<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        let snake = key.replace('-', "_");
        [key, snake.as_str()]
            .into_iter()
            .filter_map(|k| self.0.get(k))
            .find(|v| !v.is_null())
    }

    fn string(&self, key: &str) -> Result<Option<String>, DefinitionError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(invalid(key, "must be a string")),
        }
    }

    fn flag(&self, key: &str) -> Result<bool, DefinitionError> {
        match self.get(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(invalid(key, "must be a boolean")),
        }
    }

    fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, DefinitionError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let Value::Sequence(items) = value else {
            return Err(invalid(key, "must be a list"));
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(invalid(key, "must be a list of strings")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// `0` disables the budget, like an absent key.
    fn char_limit(&self, key: &str) -> Result<Option<usize>, DefinitionError> {
        let parsed = match self.get(key) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(_) => None,
        };
        match parsed {
            Some(0) => Ok(None),
            Some(n) if n > 0 => Ok(Some(n as usize)),
            Some(_) => Err(invalid(key, "must be a positive integer")),
            None => Err(invalid(key, "must be an integer")),
        }
    }
}

fn invalid(field: &str, reason: &str) -> DefinitionError {
    DefinitionError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
