//! Positional and named variable substitution.
//!
//! Supported forms:
//!
//! | Token | Meaning |
//! |---|---|
//! | `$ARGUMENTS` | entire raw argument string |
//! | `$N` | N-th whitespace-delimited argument (1-indexed) |
//! | `{{$ARGUMENTS or "default"}}` | `$ARGUMENTS`, or the default when empty |
//! | `{{$N or "default"}}` | `$N`, or the default when missing |
//!
//! Fallback forms are resolved first so that the `$N` inside them is never
//! seen by the bare pass. Quotes cannot be escaped inside a default.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `{{$N or "default"}}` / `{{$ARGUMENTS or "default"}}`
/// Group 1: variable, group 2: default.
static FALLBACK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{(\$[0-9]+|\$ARGUMENTS)\s+or\s+"([^"]*)"\}\}"#)
        .expect("fallback regex pattern is valid")
});

/// Bare `$N` / `$ARGUMENTS`. Group 1: digits or `ARGUMENTS`.
static BARE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([0-9]+|\bARGUMENTS\b)").expect("bare regex pattern is valid"));

/// Substitute template variables with arguments.
///
/// Out-of-range bare `$N` tokens are left exactly as written.
pub fn substitute_variables(template: &str, args: &str) -> String {
    let tokens: Vec<&str> = args.split_whitespace().collect();

    let with_fallbacks = FALLBACK_REGEX.replace_all(template, |caps: &Captures<'_>| {
        let var = &caps[1];
        let default = &caps[2];

        if var == "$ARGUMENTS" {
            return if args.is_empty() {
                default.to_string()
            } else {
                args.to_string()
            };
        }

        match var[1..].parse::<usize>() {
            Ok(pos) => positional(&tokens, pos).unwrap_or(default).to_string(),
            Err(_) => caps[0].to_string(),
        }
    });

    BARE_REGEX
        .replace_all(&with_fallbacks, |caps: &Captures<'_>| {
            let var = &caps[1];
            if var == "ARGUMENTS" {
                return args.to_string();
            }
            var.parse::<usize>()
                .ok()
                .and_then(|pos| positional(&tokens, pos))
                .unwrap_or(&caps[0])
                .to_string()
        })
        .into_owned()
}

fn positional<'a>(tokens: &[&'a str], pos: usize) -> Option<&'a str> {
    if pos == 0 {
        return None;
    }
    tokens.get(pos - 1).copied()
}

/// Extract placeholder hints from a template.
///
/// Returns `$ARGUMENTS` first (if used), then each `$N` in ascending order.
pub fn hints(template: &str) -> Vec<String> {
    let mut found = Vec::new();

    if template.contains("$ARGUMENTS") {
        found.push("$ARGUMENTS".to_string());
    }

    let mut numbered: Vec<u32> = BARE_REGEX
        .captures_iter(template)
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .collect();

    numbered.sort_unstable();
    numbered.dedup();

    for n in numbered {
        found.push(format!("${n}"));
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        assert_eq!(
            substitute_variables("$1,$2,$3", "one two three"),
            "one,two,three"
        );
    }

    #[test]
    fn test_empty_args_leave_out_of_range_literal() {
        assert_eq!(substitute_variables("$ARGUMENTS,$4", ""), ",$4");
    }

    #[test]
    fn test_arguments_verbatim() {
        assert_eq!(
            substitute_variables("Echo: $ARGUMENTS", "hello   world"),
            "Echo: hello   world"
        );
    }

    #[test]
    fn test_fallback_positional() {
        assert_eq!(substitute_variables(r#"{{$1 or "x"}}"#, ""), "x");
        assert_eq!(substitute_variables(r#"{{$1 or "x"}}"#, "y"), "y");
        assert_eq!(
            substitute_variables(r#"A={{$1 or "a"}} B={{$2 or "b"}}"#, "first"),
            "A=first B=b"
        );
    }

    #[test]
    fn test_fallback_arguments() {
        let template = r#"Focus: {{$ARGUMENTS or "everything"}}"#;
        assert_eq!(substitute_variables(template, ""), "Focus: everything");
        assert_eq!(
            substitute_variables(template, "error handling"),
            "Focus: error handling"
        );
    }

    #[test]
    fn test_fallback_with_empty_default() {
        assert_eq!(substitute_variables(r#"[{{$2 or ""}}]"#, "one"), "[]");
    }

    #[test]
    fn test_unknown_fallback_variable_untouched() {
        let template = r#"{{$FOO or "x"}}"#;
        assert_eq!(substitute_variables(template, "a"), template);
    }

    #[test]
    fn test_zero_and_large_indices_left_literal() {
        assert_eq!(substitute_variables("$0 $10", "a b"), "$0 $10");
    }

    #[test]
    fn test_arguments_word_boundary() {
        assert_eq!(
            substitute_variables("$ARGUMENTSX $ARGUMENTS", "v"),
            "$ARGUMENTSX v"
        );
    }

    #[test]
    fn test_multiline_template() {
        let template = "Review $1\n\nFocus on {{$2 or \"style\"}}.\nAll: $ARGUMENTS";
        assert_eq!(
            substitute_variables(template, "main.rs"),
            "Review main.rs\n\nFocus on style.\nAll: main.rs"
        );
    }

    #[test]
    fn test_hints() {
        let found = hints(r#"Run with $ARGUMENTS and $2 then {{$1 or "x"}} and $2"#);
        assert_eq!(found, vec!["$ARGUMENTS", "$1", "$2"]);
        assert!(hints("Static template").is_empty());
    }
}
