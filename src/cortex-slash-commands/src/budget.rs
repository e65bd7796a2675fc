//! Character budgeting for rendered prompts.

/// Appended to content that was cut to fit its budget.
pub const TRUNCATION_MARKER: &str = "\n\n[...truncated due to character limit...]";

/// Break points in priority order: paragraph, line, sentence, word.
const BREAK_POINTS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A break point must keep more than this share of the available budget.
const MIN_KEEP_RATIO: f64 = 0.7;

/// Truncate `content` to at most `max_chars` characters.
///
/// Content that already fits is returned unchanged. Otherwise the prefix is
/// cut at the best break point and the truncation marker is appended.
pub fn apply_char_budget(content: &str, max_chars: usize) -> String {
    if char_len(content) <= max_chars {
        return content.to_string();
    }

    let marker_len = char_len(TRUNCATION_MARKER);
    if max_chars <= marker_len {
        return take_chars(content, max_chars).to_string();
    }

    let available = max_chars - marker_len;
    let mut truncated = take_chars(content, available);
    let threshold = available as f64 * MIN_KEEP_RATIO;

    for sep in BREAK_POINTS {
        if let Some(idx) = truncated.rfind(sep)
            && char_len(&truncated[..idx]) as f64 > threshold
        {
            truncated = &truncated[..idx + sep.len()];
            break;
        }
    }

    format!("{}{TRUNCATION_MARKER}", truncated.trim_end())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `n` characters of `s`, cut on a char boundary.
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_within_budget_unchanged() {
        assert_eq!(apply_char_budget("short", 100), "short");
        assert_eq!(apply_char_budget("exact", 5), "exact");
    }

    #[test]
    fn test_hard_cut_without_break_points() {
        let content = "x".repeat(1000);
        let result = apply_char_budget(&content, 100);

        assert!(result.chars().count() <= 100);
        assert!(result.ends_with(TRUNCATION_MARKER));
        assert_eq!(result, format!("{}{TRUNCATION_MARKER}", "x".repeat(58)));
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let first = "a".repeat(50);
        let content = format!("{first}\n\n{}", "b".repeat(200));
        let result = apply_char_budget(&content, 100);

        assert_eq!(result, format!("{first}{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_early_break_point_is_ignored() {
        // The paragraph break sits at 10 of 58 available chars: too early.
        let content = format!("{}\n\n{}", "a".repeat(10), "b c ".repeat(100));
        let result = apply_char_budget(&content, 100);

        assert!(result.chars().count() <= 100);
        assert!(result.contains("b c"));
        assert!(result.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_sentence_break() {
        let content = format!("{}. {}", "a".repeat(50), "b".repeat(200));
        let result = apply_char_budget(&content, 100);

        assert_eq!(result, format!("{}.{TRUNCATION_MARKER}", "a".repeat(50)));
    }

    #[test]
    fn test_tiny_budget_hard_cuts_without_marker() {
        assert_eq!(apply_char_budget(&"z".repeat(50), 10), "z".repeat(10));
    }

    #[test]
    fn test_multibyte_content() {
        let content = "é".repeat(300);
        let result = apply_char_budget(&content, 100);

        assert!(result.chars().count() <= 100);
        assert!(result.starts_with("é"));
    }
}
