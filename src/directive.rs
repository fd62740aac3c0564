//! Extraction of the embedded direct-message directive from model output.
//!
//! The directive is a deliberately narrow, fixed-syntax micro-language,
//! `[DM:<target>:<payload>]`, so a model reply can carry one structured
//! instruction inline with free text. This is not a general parser.

use regex::Regex;
use std::sync::LazyLock;

/// Capture form: target excludes colons, payload is the shortest run up to
/// the closing bracket.
static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[DM:([^:]+):(.+?)\]").expect("hardcoded regex"));

/// Removal form: the markup plus any whitespace hugging it, so stripping a
/// mid-sentence directive doesn't leave a double space behind.
static DIRECTIVE_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[DM:[^:]+:.+?\]\s*").expect("hardcoded regex"));

/// An instruction extracted from one model response; discarded after
/// execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub target: String,
    pub message: String,
}

/// Scan model output for a DM directive.
///
/// Only the first occurrence is honored, but every occurrence is removed
/// from the returned text so no stray markup reaches the user even when the
/// model emits more than one.
pub fn extract(text: &str) -> (Option<Directive>, String) {
    let directive = DIRECTIVE.captures(text).map(|caps| Directive {
        target: caps[1].trim().to_string(),
        message: caps[2].trim().to_string(),
    });

    let cleaned = if directive.is_some() {
        DIRECTIVE_MARKUP.replace_all(text, " ").trim().to_string()
    } else {
        text.to_string()
    };

    (directive, cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_directive_round_trip() {
        let (directive, cleaned) = extract("[DM:bob:hi there]");
        let directive = directive.expect("directive present");
        assert_eq!(directive.target, "bob");
        assert_eq!(directive.message, "hi there");
        assert_eq!(cleaned, "");
    }

    #[test]
    fn test_no_directive_leaves_text_untouched() {
        let (directive, cleaned) = extract("no directive here");
        assert!(directive.is_none());
        assert_eq!(cleaned, "no directive here");
    }

    #[test]
    fn test_first_occurrence_wins_all_occurrences_removed() {
        let (directive, cleaned) = extract("ok [DM:a:b] and [DM:c:d]");
        assert_eq!(directive.expect("first directive").target, "a");
        assert_eq!(cleaned, "ok and");
    }

    #[test]
    fn test_mid_sentence_removal_keeps_single_space() {
        let (directive, cleaned) = extract("Sure! [DM:me:secret code 42] I'll send that now.");
        let directive = directive.expect("directive present");
        assert_eq!(directive.target, "me");
        assert_eq!(directive.message, "secret code 42");
        assert_eq!(cleaned, "Sure! I'll send that now.");
    }

    #[test]
    fn test_fields_are_trimmed() {
        let (directive, _) = extract("[DM: alice : meet me at 8 ]");
        let directive = directive.expect("directive present");
        assert_eq!(directive.target, "alice");
        assert_eq!(directive.message, "meet me at 8");
    }

    #[test]
    fn test_target_may_not_contain_colon() {
        // the first colon terminates the target, the rest is payload
        let (directive, _) = extract("[DM:a:b:c]");
        let directive = directive.expect("directive present");
        assert_eq!(directive.target, "a");
        assert_eq!(directive.message, "b:c");
    }

    #[test]
    fn test_unclosed_markup_is_not_a_directive() {
        let (directive, cleaned) = extract("[DM:bob:never closed");
        assert!(directive.is_none());
        assert_eq!(cleaned, "[DM:bob:never closed");
    }
}
