//! Built-in sensitive-data detectors and blocked-keyword scanning
//!
//! The pattern library is pure data: a fixed set of regular expressions for
//! identifiers that should never leave the process unredacted (SSN-like
//! numbers, card numbers, emails, phone numbers, credential assignments) and
//! a default blocked-keyword list. Patterns are compiled once at construction
//! and reused for every evaluation.

use crate::error::{Error, Result};
use regex::Regex;

/// Default replacement token used when sanitizing matched content
pub const DEFAULT_REDACTION: &str = "[REDACTED]";

/// A single compiled sensitive-data detector
#[derive(Debug)]
pub struct Detector {
    /// Short name used in warnings ("ssn", "card_number", ...)
    pub name: &'static str,
    /// Compiled pattern
    pub pattern: Regex,
}

/// Built-in detector definitions: name + pattern source
const DETECTOR_DEFS: &[(&str, &str)] = &[
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("card_number", r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b"),
    ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ("phone", r"\b\d{3}[-.]\d{3}[-.]\d{4}\b"),
    (
        "credential",
        r#"(?i)\b(?:password|passwd|pwd|api[_-]?key|secret|token)\s*[:=]\s*\S+"#,
    ),
];

/// Default blocked keywords for content-filter rules
pub const DEFAULT_BLOCKED_KEYWORDS: &[&str] = &[
    "rm -rf /",
    "drop database",
    "format c:",
    "delete all users",
];

/// Fixed library of sensitive-data detectors
#[derive(Debug)]
pub struct PatternLibrary {
    detectors: Vec<Detector>,
}

impl PatternLibrary {
    /// Build the library with the built-in detectors.
    ///
    /// Built-in patterns are known-good; failure here is a programmer error.
    pub fn new() -> Self {
        let detectors = DETECTOR_DEFS
            .iter()
            .map(|&(name, src)| Detector {
                name,
                pattern: Regex::new(src).expect("built-in pattern compiles"),
            })
            .collect();

        Self { detectors }
    }

    /// The compiled detectors, in definition order
    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// Redact every detector match in `content` with `replacement`.
    ///
    /// Returns the redacted copy and the names of detectors that matched;
    /// an empty name list means the content came back unchanged.
    pub fn redact(&self, content: &str, replacement: &str) -> (String, Vec<&'static str>) {
        let mut working = content.to_string();
        let mut matched = Vec::new();

        for detector in &self.detectors {
            if detector.pattern.is_match(&working) {
                working = detector
                    .pattern
                    .replace_all(&working, replacement)
                    .into_owned();
                matched.push(detector.name);
            }
        }

        (working, matched)
    }

    /// True if any detector matches `content`
    pub fn matches(&self, content: &str) -> bool {
        self.detectors.iter().any(|d| d.pattern.is_match(content))
    }
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a user-supplied pattern as a case-insensitive regex.
///
/// Used for `security_check` and condition patterns; invalid patterns are
/// rejected here, at registration time, so evaluation never compiles.
pub fn compile_case_insensitive(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("(?i){}", pattern))
        .map_err(|e| Error::invalid_pattern(pattern, e.to_string()))
}

/// Case-insensitive substring scan of `content` against `keywords`.
///
/// Whitespace-only keywords are ignored; returns the first keyword found.
pub fn find_keyword<'a>(content: &str, keywords: &'a [String]) -> Option<&'a str> {
    let lowered = content.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .find(|k| lowered.contains(&k.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_ssn() {
        let lib = PatternLibrary::new();
        let (out, matched) = lib.redact("My SSN is 123-45-6789", DEFAULT_REDACTION);
        assert_eq!(out, "My SSN is [REDACTED]");
        assert_eq!(matched, vec!["ssn"]);
    }

    #[test]
    fn redacts_card_and_email() {
        let lib = PatternLibrary::new();
        let (out, matched) =
            lib.redact("card 4111-1111-1111-1111, mail a@b.io", DEFAULT_REDACTION);
        assert!(!out.contains("4111"));
        assert!(!out.contains("a@b.io"));
        assert!(matched.contains(&"card_number"));
        assert!(matched.contains(&"email"));
    }

    #[test]
    fn redaction_is_idempotent() {
        let lib = PatternLibrary::new();
        let (once, _) = lib.redact("password=hunter2", DEFAULT_REDACTION);
        let (twice, matched) = lib.redact(&once, DEFAULT_REDACTION);
        assert_eq!(once, twice);
        assert!(matched.is_empty());
    }

    #[test]
    fn clean_content_untouched() {
        let lib = PatternLibrary::new();
        let (out, matched) = lib.redact("hello world", DEFAULT_REDACTION);
        assert_eq!(out, "hello world");
        assert!(matched.is_empty());
    }

    #[test]
    fn invalid_pattern_rejected_at_compile() {
        assert!(compile_case_insensitive("(unclosed").is_err());
    }

    #[test]
    fn keyword_scan_is_case_insensitive() {
        let keywords = vec!["DROP TABLE".to_string()];
        assert_eq!(
            find_keyword("please drop table users", &keywords),
            Some("DROP TABLE")
        );
        assert_eq!(find_keyword("harmless", &keywords), None);
    }

    #[test]
    fn whitespace_keywords_disable_matching() {
        let keywords = vec!["   ".to_string(), "".to_string()];
        assert_eq!(find_keyword("anything at all", &keywords), None);
    }
}
