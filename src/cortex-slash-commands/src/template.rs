//! Template processing for shell snippets and file references.
//!
//! Three stages run in a fixed order, each only when its marker is present:
//!
//! 1. shell blocks: `` !```\ncommand\n``` ``
//! 2. inline shell: `` !`command` ``
//! 3. file references: `@path/to/file`
//!
//! Each stage computes all of its matches up front and splices the
//! replacements in one pass, so match offsets never go stale.

use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::permissions::{
    BashDecision, GranularPermission, is_bash_command_allowed, is_tool_allowed, parse_permission,
    BASH_TOOL,
};
use crate::process::ProcessRunner;

/// Multi-line shell block. Group 1: command body.
static BASH_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)!```\n(.*?)\n```").expect("bash block regex pattern is valid")
});

/// Inline shell. Group 1: command.
static BASH_INLINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!`([^`]+)`").expect("inline bash regex pattern is valid"));

/// File reference. Group 1: path as written.
static FILE_REF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([\w./-]+)").expect("file reference regex pattern is valid"));

/// How shell snippets are gated against a command's `allowed-tools`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellGate {
    /// Any `bash` grant runs every snippet; patterns are ignored.
    #[default]
    Coarse,
    /// Each snippet must also match a bash pattern.
    Granular,
}

/// Result of template processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedTemplate {
    pub content: String,
    pub bash_commands_executed: usize,
    pub files_included: usize,
    /// Block warnings, then inline warnings, then file warnings.
    pub warnings: Vec<String>,
}

/// Processes shell snippets and file references inside a rendered template.
#[derive(Debug, Clone)]
pub struct TemplateProcessor {
    working_dir: PathBuf,
    runner: ProcessRunner,
    shell_gate: ShellGate,
    allow_absolute_file_refs: bool,
}

impl TemplateProcessor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        Self {
            runner: ProcessRunner::new(working_dir.clone()),
            working_dir,
            shell_gate: ShellGate::default(),
            allow_absolute_file_refs: true,
        }
    }

    /// Set the timeout for each shell snippet.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner = self.runner.with_timeout(timeout);
        self
    }

    pub fn with_shell_gate(mut self, gate: ShellGate) -> Self {
        self.shell_gate = gate;
        self
    }

    /// Whether `@/absolute/path` references skip the working directory check.
    pub fn with_absolute_file_refs(mut self, allow: bool) -> Self {
        self.allow_absolute_file_refs = allow;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Process a template with shell execution and file references.
    ///
    /// `allowed_tools` are the raw permission specs from the command header;
    /// shell snippets only run when one of them grants `bash`.
    pub async fn process(
        &self,
        template: &str,
        allowed_tools: &[String],
        include_files: bool,
    ) -> ProcessedTemplate {
        let mut warnings = Vec::new();
        let permissions = parse_lenient(allowed_tools, &mut warnings);
        let bash_allowed = is_tool_allowed(BASH_TOOL, &permissions);

        let mut content = template.to_string();
        let mut bash_count = 0;
        let mut file_count = 0;

        if BASH_BLOCK_REGEX.is_match(&content) {
            if bash_allowed {
                let (next, count) = self
                    .run_snippets(&content, &BASH_BLOCK_REGEX, &permissions, &mut warnings)
                    .await;
                content = next;
                bash_count += count;
            } else {
                warnings.push(
                    "Template contains bash blocks but 'bash' not in allowed-tools. \
                     Add 'allowed-tools: [bash]' to frontmatter to enable execution."
                        .to_string(),
                );
            }
        }

        if BASH_INLINE_REGEX.is_match(&content) {
            if bash_allowed {
                let (next, count) = self
                    .run_snippets(&content, &BASH_INLINE_REGEX, &permissions, &mut warnings)
                    .await;
                content = next;
                bash_count += count;
            } else {
                warnings.push(
                    "Template contains inline bash (!`) but 'bash' not in allowed-tools. \
                     Add 'allowed-tools: [bash]' to frontmatter to enable execution."
                        .to_string(),
                );
            }
        }

        if include_files && FILE_REF_REGEX.is_match(&content) {
            let (next, count) = self.include_files(&content, &mut warnings).await;
            content = next;
            file_count = count;
        }

        ProcessedTemplate {
            content,
            bash_commands_executed: bash_count,
            files_included: file_count,
            warnings,
        }
    }

    /// Run every snippet matched by `pattern`, sequentially, in document order.
    async fn run_snippets(
        &self,
        template: &str,
        pattern: &Regex,
        permissions: &[GranularPermission],
        warnings: &mut Vec<String>,
    ) -> (String, usize) {
        let matches: Vec<(Range<usize>, String)> = pattern
            .captures_iter(template)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let command = caps.get(1)?.as_str().trim().to_string();
                Some((whole.range(), command))
            })
            .collect();

        let mut count = 0;
        let mut replacements = Vec::with_capacity(matches.len());

        for (range, command) in matches {
            if self.shell_gate == ShellGate::Granular
                && let BashDecision::Denied { reason } =
                    is_bash_command_allowed(&command, permissions)
            {
                warn!("Bash command not permitted: {}", reason);
                warnings.push(format!("Bash command '{command}' not executed: {reason}"));
                continue;
            }

            let output = self.runner.run(&command).await;
            count += 1;
            replacements.push((range, output));
        }

        (splice(template, replacements), count)
    }

    /// Replace `@path` references with the fenced file contents.
    async fn include_files(&self, template: &str, warnings: &mut Vec<String>) -> (String, usize) {
        let refs: Vec<(Range<usize>, String)> = FILE_REF_REGEX
            .captures_iter(template)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.range(), caps.get(1)?.as_str().to_string()))
            })
            .collect();

        let mut count = 0;
        let mut replacements = Vec::new();

        for (range, token) in refs {
            if let Some(content) = self.read_reference(&token, warnings).await {
                count += 1;
                replacements.push((range, format!("```\n# {token}\n{content}\n```")));
            }
        }

        (splice(template, replacements), count)
    }

    /// Resolve and read one file reference. `None` leaves the token in place.
    async fn read_reference(&self, token: &str, warnings: &mut Vec<String>) -> Option<String> {
        let path = self.working_dir.join(token);
        let is_absolute_token = Path::new(token).is_absolute();

        if !(is_absolute_token && self.allow_absolute_file_refs)
            && !is_within(&path, &self.working_dir)
        {
            warnings.push(format!("File reference @{token} outside working directory"));
            return None;
        }

        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => {
                warnings.push(format!("File not found: @{token}"));
                return None;
            }
            Err(e) => {
                warnings.push(format!("Failed to read @{token}: {e}"));
                return None;
            }
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                debug!("Included file: {} ({} chars)", token, content.chars().count());
                Some(content)
            }
            Err(e) => {
                warnings.push(format!("Failed to read @{token}: {e}"));
                None
            }
        }
    }
}

/// Parse permission specs, turning malformed ones into warnings.
fn parse_lenient(specs: &[String], warnings: &mut Vec<String>) -> Vec<GranularPermission> {
    specs
        .iter()
        .filter_map(|spec| match parse_permission(spec) {
            Ok(perm) => Some(perm),
            Err(e) => {
                warn!("Ignoring allowed-tools entry '{}': {}", spec, e);
                warnings.push(format!("Ignoring allowed-tools entry '{spec}': {e}"));
                None
            }
        })
        .collect()
}

/// Apply non-overlapping replacements, given in ascending order of position.
fn splice(template: &str, replacements: Vec<(Range<usize>, String)>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut cursor = 0;

    for (range, text) in replacements {
        result.push_str(&template[cursor..range.start]);
        result.push_str(&text);
        cursor = range.end;
    }

    result.push_str(&template[cursor..]);
    result
}

/// Whether `path` resolves inside `root`, comparing whole components.
fn is_within(path: &Path, root: &Path) -> bool {
    let root = resolve(root);
    resolve(path).starts_with(root)
}

/// Canonicalize existing paths; normalize the rest lexically, anchoring on the
/// nearest existing ancestor so symlinked prefixes still compare equal.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }

    let normalized = normalize_path(path);
    let mut tail = Vec::new();
    let mut current = normalized.as_path();

    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            tail.push(name.to_os_string());
        }
        if let Ok(canonical) = dunce::canonicalize(parent) {
            let mut resolved = canonical;
            resolved.extend(tail.iter().rev());
            return resolved;
        }
        current = parent;
    }

    normalized
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() && !path.is_absolute() {
                    normalized.push("..");
                }
            }
            Component::CurDir => {}
            _ => normalized.push(component),
        }
    }

    normalized
}
