//! Detection of nested `/command` invocations in rendered text.
//!
//! An invocation is a `/` not preceded by `:` or `/` (so URLs and `//` are
//! skipped), a name of word characters and hyphens, an optional `:`-joined
//! second segment (`/namespace:name`), and optionally the rest of the line as
//! arguments. The token must run to the end of its line; `\r\n` endings
//! count as line ends and stay outside the span.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Nesting ceiling. A top-level execution runs at depth 0; an execution at a
/// depth above this fails with [`ExecutionError::DepthExceeded`](crate::ExecutionError).
pub const MAX_COMPOSITION_DEPTH: usize = 5;

/// Group 1: `name` or `namespace:name`. Group 2: arguments.
static INVOCATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mR)/([\w-]+(?::[\w-]+)?)(?:[ \t]+(.+?))?$")
        .expect("invocation regex pattern is valid")
});

/// One nested invocation found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedInvocation {
    /// Byte span of the whole token, including arguments.
    pub span: Range<usize>,
    /// The token as written after the slash, e.g. `git:commit`.
    pub spec: String,
    pub name: String,
    pub namespace: Option<String>,
    /// Arguments, trimmed.
    pub args: String,
}

/// Find every nested invocation in document order.
pub fn find_invocations(text: &str) -> Vec<NestedInvocation> {
    let mut found = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let Some(caps) = INVOCATION_REGEX.captures_at(text, pos) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };

        if matches!(text[..whole.start()].chars().next_back(), Some(':' | '/')) {
            // Retry just past the rejected slash.
            pos = whole.start() + 1;
            continue;
        }

        let spec = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let (namespace, name) = split_spec(spec);

        found.push(NestedInvocation {
            span: whole.range(),
            spec: spec.to_string(),
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            args: caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        });

        pos = whole.end().max(whole.start() + 1);
    }

    found
}

/// Split `namespace:name` into its parts.
pub fn split_spec(spec: &str) -> (Option<&str>, &str) {
    match spec.split_once(':') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, spec),
    }
}
