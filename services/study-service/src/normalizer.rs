//! Text Normalizer
//!
//! Deterministic cleanup applied to every extracted text before it is used
//! as prompt payload and cache key.

use once_cell::sync::Lazy;
use regex::Regex;

static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static LOWER_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\p{Ll})(\p{Lu})").unwrap());
static LETTER_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\p{L})(\d)").unwrap());
static DIGIT_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)(\p{L})").unwrap());
static BULLETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[•●▪◦‣∙■▸►]").unwrap());
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.!?])(\p{L})").unwrap());
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Normalize extracted text.
///
/// Every rewrite only inserts single spaces between two non-space characters
/// or shrinks whitespace, so running it twice gives the same result as once.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = NEWLINE_RUNS.replace_all(text, "\n");
    let text = LOWER_UPPER.replace_all(&text, "${1} ${2}");
    let text = LETTER_DIGIT.replace_all(&text, "${1} ${2}");
    let text = DIGIT_LETTER.replace_all(&text, "${1} ${2}");
    let text = BULLETS.replace_all(&text, "-");
    let text = SENTENCE_END.replace_all(&text, "${1} ${2}");
    let text = WHITESPACE_RUNS.replace_all(&text, " ");

    text.trim().to_string()
}

/// `normalize` for a text that may be absent.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_and_absent_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize_opt(None), "");
        assert_eq!(normalize("  \n\n \t "), "");
    }

    #[test]
    fn splits_letter_digit_boundaries() {
        assert_eq!(normalize("abc123"), "abc 123");
        assert_eq!(normalize("123abc"), "123 abc");
        assert_eq!(normalize("H2O"), "H 2 O");
    }

    #[test]
    fn splits_camel_case_joins() {
        assert_eq!(normalize("theMitochondria"), "the Mitochondria");
        assert_eq!(normalize("NASA"), "NASA");
    }

    #[test]
    fn replaces_bullets_and_collapses_whitespace() {
        assert_eq!(normalize("• first\n\n\n● second"), "- first\n- second");
        assert_eq!(normalize("a    b\t\tc"), "a b c");
    }

    #[test]
    fn spaces_after_sentence_punctuation() {
        assert_eq!(normalize("End.Start"), "End. Start");
        assert_eq!(normalize("Really?Yes!Go"), "Really? Yes! Go");
        assert_eq!(normalize("pi is 3.14"), "pi is 3.14");
    }

    #[test]
    fn keeps_single_newlines() {
        assert_eq!(normalize("line one\nline two"), "line one\nline two");
        assert_eq!(normalize("line one\n\n\nline two"), "line one\nline two");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_normalize_is_idempotent(s in "\\PC{0,200}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once.clone());
        }

        #[test]
        fn prop_normalize_is_idempotent_on_document_like_text(
            s in "[a-zA-Z0-9 .!?,\n\t•●-]{0,200}"
        ) {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once.clone());
        }

        #[test]
        fn prop_no_edge_whitespace(s in "\\PC{0,200}") {
            let out = normalize(&s);
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
