// =============================================================================
// cnj.rs — CASE NUMBER EXTRACTION
// =============================================================================
//
// CNJ numbers are the 20-digit identifiers every Brazilian court case
// carries: NNNNNNN-DD.YYYY.J.TR.OOOO. People paste them with dots, without
// dots, glued to a sentence, followed by a phone number. This module pulls
// one out of free text and puts the punctuation back where it belongs.
// =============================================================================

use regex::Regex;
use std::sync::LazyLock;

/// Number of digits in a clean CNJ.
pub const CNJ_LENGTH: usize = 20;

/// A run of at least 15 digits/dots/dashes that is not glued to another digit.
static EXTRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])([0-9.\-]{15,})(?:[^0-9]|$)").expect("valid CNJ regex"));

/// Six digit groups of a clean CNJ.
static FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{7})([0-9]{2})([0-9]{4})([0-9])([0-9]{2})([0-9]{4})$").expect("valid format regex")
});

/// Strip everything that is not an ASCII digit.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Pull a CNJ out of mixed text and return its 20 bare digits.
///
/// Returns `None` when no candidate run exists or when the candidate does
/// not clean down to exactly 20 digits.
pub fn extract_and_clean(text: &str) -> Option<String> {
    let candidate = EXTRACTION.captures(text)?.get(1)?.as_str();
    let clean = digits_only(candidate);
    (clean.len() == CNJ_LENGTH).then_some(clean)
}

/// Render 20 bare digits as `NNNNNNN-NN.NNNN.N.NN.NNNN`.
///
/// Anything that doesn't fit the grouping comes back untouched.
pub fn format(clean: &str) -> String {
    FORMAT.replace(clean, "$1-$2.$3.$4.$5.$6").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_formatted_cnj_from_sentence() {
        let clean = extract_and_clean("O numero é 5003289-93.2024.8.24.0020 verifique");
        assert_eq!(clean.as_deref(), Some("50032899320248240020"));
    }

    #[test]
    fn test_extracts_raw_cnj() {
        assert_eq!(
            extract_and_clean("CNJ: 12345678901234567890").as_deref(),
            Some("12345678901234567890")
        );
        assert_eq!(
            extract_and_clean("Processo nº 0000000-00.0000.0.00.0000").as_deref(),
            Some("00000000000000000000")
        );
    }

    #[test]
    fn test_rejects_short_or_missing_numbers() {
        assert_eq!(extract_and_clean("12345"), None);
        assert_eq!(extract_and_clean("Apenas um texto sem números suficientes"), None);
        // 21 digits cleans to the wrong length
        assert_eq!(extract_and_clean("123456789012345678901"), None);
    }

    #[test]
    fn test_format_round_trip() {
        let clean = extract_and_clean("ref 5003289-93.2024.8.24.0020.").unwrap();
        assert_eq!(format(&clean), "5003289-93.2024.8.24.0020");
        assert_eq!(format("00000000000000000000"), "0000000-00.0000.0.00.0000");
    }

    #[test]
    fn test_format_leaves_unexpected_input_alone() {
        assert_eq!(format("123"), "123");
        assert_eq!(format("5003289-93.2024.8.24.0020"), "5003289-93.2024.8.24.0020");
    }
}
