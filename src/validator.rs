// =============================================================================
// validator.rs — DOES THIS PARTY MATCH ANY OF THE CLIENT'S PATTERNS?
// =============================================================================
//
// Each client company registers regexes for the party names it wants to
// monitor. When a party slips through unmonitored, someone pastes the name
// here and we tell them which pattern (if any) should have caught it.
// Patterns come from the API as-is; a broken one is skipped, not fatal.
// =============================================================================

use regex::Regex;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PartyValidation {
    pub matched: bool,
    pub pattern: Option<String>,
    pub message: String,
}

/// First pattern in `patterns` that matches `party`.
pub fn validate_party<'a>(party: &str, patterns: &'a [String]) -> Option<&'a str> {
    patterns.iter().map(String::as_str).find(|pattern| match Regex::new(pattern) {
        Ok(re) => re.is_match(party),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Skipping invalid party pattern");
            false
        }
    })
}

/// The verdict the way the ops screen shows it.
pub fn describe(party: &str, patterns: &[String]) -> PartyValidation {
    match validate_party(party, patterns) {
        Some(pattern) => PartyValidation {
            matched: true,
            pattern: Some(pattern.to_string()),
            message: format!("A parte \"{party}\" digitada corresponde a {pattern}"),
        },
        None => PartyValidation {
            matched: false,
            pattern: None,
            message: format!("A parte \"{party}\" não corresponde a nenhum regex cadastrado."),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let list = patterns(&["^BANCO", "ACME\\s+SEGUROS", "SEGUROS"]);
        assert_eq!(validate_party("ACME  SEGUROS S/A", &list), Some("ACME\\s+SEGUROS"));
        assert_eq!(validate_party("BANCO DO BRASIL", &list), Some("^BANCO"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert_eq!(validate_party("banco do brasil", &patterns(&["^BANCO"])), None);
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let list = patterns(&["([unclosed", "BRASIL"]);
        assert_eq!(validate_party("BANCO DO BRASIL", &list), Some("BRASIL"));
    }

    #[test]
    fn test_describe() {
        let verdict = describe("FULANO", &patterns(&["^BANCO"]));
        assert!(!verdict.matched);
        assert_eq!(verdict.message, "A parte \"FULANO\" não corresponde a nenhum regex cadastrado.");

        let verdict = describe("BANCO X", &patterns(&["^BANCO"]));
        assert_eq!(verdict.pattern.as_deref(), Some("^BANCO"));
        assert_eq!(verdict.message, "A parte \"BANCO X\" digitada corresponde a ^BANCO");
    }
}
