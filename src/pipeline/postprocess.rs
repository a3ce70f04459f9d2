//! Post-processing: deterministic cleanup of model answers before drawing.
//!
//! Even with a "reply with the value only" prompt, models wrap answers in
//! code fences, echo an `Answer:` prefix, quote the value, or spread it over
//! several lines. A form field holds one line of plain text, so each of
//! those quirks is undone here by a small independent rule.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised, so the fence
//! regex sees the raw output; prefixes are stripped before quotes so
//! `Answer: "Ada"` loses both; whitespace is collapsed last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model answer.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip an echoed `Answer:` / `Value:` prefix
/// 4. Strip wrapping quotes or backticks
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Collapse all whitespace runs, including newlines, to one space
///
/// Returns the empty string when nothing drawable remains.
pub fn clean_answer(input: &str) -> String {
    let s = strip_fences(input);
    let s = normalise_line_endings(&s);
    let s = strip_answer_prefix(&s);
    let s = strip_wrapping_quotes(&s);
    let s = remove_invisible_chars(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n?(.*?)\r?\n?```\s*$").unwrap());

fn strip_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip echoed prefix ──────────────────────────────────────────────

static RE_ANSWER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:answer|value|field value)\s*:\s*").unwrap());

fn strip_answer_prefix(input: &str) -> String {
    RE_ANSWER_PREFIX.replace(input, "").to_string()
}

// ── Rule 4: Strip wrapping quotes ────────────────────────────────────────────

fn strip_wrapping_quotes(input: &str) -> String {
    let trimmed = input.trim();
    const PAIRS: [(char, char); 5] = [
        ('"', '"'),
        ('\'', '\''),
        ('`', '`'),
        ('\u{201C}', '\u{201D}'),
        ('\u{2018}', '\u{2019}'),
    ];
    for (open, close) in PAIRS {
        if trimmed.chars().count() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
            let inner = &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()];
            return inner.to_string();
        }
    }
    trimmed.to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 6: Collapse whitespace ──────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_answer_untouched() {
        assert_eq!(clean_answer("Mocked Answer"), "Mocked Answer");
    }

    #[test]
    fn strips_fences() {
        assert_eq!(clean_answer("```\nAda Lovelace\n```"), "Ada Lovelace");
        assert_eq!(clean_answer("```text\n42\n```\n"), "42");
    }

    #[test]
    fn strips_prefix_then_quotes() {
        assert_eq!(clean_answer("Answer: \"Ada Lovelace\""), "Ada Lovelace");
        assert_eq!(clean_answer("value:  1815-12-10"), "1815-12-10");
    }

    #[test]
    fn curly_quotes() {
        assert_eq!(clean_answer("\u{201C}London\u{201D}"), "London");
    }

    #[test]
    fn single_quote_char_is_kept() {
        assert_eq!(clean_answer("\""), "\"");
    }

    #[test]
    fn multi_line_becomes_one_line() {
        assert_eq!(
            clean_answer("12 Baker Street\r\nLondon\n\n NW1"),
            "12 Baker Street London NW1"
        );
    }

    #[test]
    fn invisible_only_is_empty() {
        assert_eq!(clean_answer("\u{200B}\u{FEFF}  \n"), "");
    }

    #[test]
    fn prefix_inside_text_is_kept() {
        assert_eq!(clean_answer("See answer: below"), "See answer: below");
    }
}
