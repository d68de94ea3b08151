// =============================================================================
// court.rs — WHICH COURT IS THIS, ANYWAY?
// =============================================================================
//
// The CNJ number hides the court inside itself: the "J.TR" block, segment
// plus court, sits 7 digits from the end. 8.24 is Santa Catarina's state
// court, 5.02 is the São Paulo labor court, and so on.
//
// The table below is curated by hand and it stays that way. No config file,
// no database. When a new court shows up it gets labelled "Tribunal NNN"
// until somebody adds a line here.
// =============================================================================

use serde::Serialize;
use std::collections::BTreeMap;

use crate::cnj::digits_only;

/// Minimum digit count before we trust the court field position.
pub const MIN_CNJ_DIGITS: usize = 14;

/// Segment+court code -> tribunal acronym.
pub const COURT_TABLE: &[(&str, &str)] = &[
    // State courts
    ("801", "TJAC"), ("802", "TJAL"), ("803", "TJAP"), ("804", "TJAM"), ("805", "TJBA"),
    ("806", "TJCE"), ("807", "TJDFT"), ("808", "TJES"), ("809", "TJGO"), ("810", "TJMA"),
    ("811", "TJMT"), ("812", "TJMS"), ("813", "TJMG"), ("814", "TJPA"), ("815", "TJPB"),
    ("816", "TJPR"), ("817", "TJPE"), ("818", "TJPI"), ("819", "TJRJ"), ("820", "TJRN"),
    ("821", "TJRS"), ("822", "TJRO"), ("823", "TJRR"), ("824", "TJSC"), ("825", "TJSE"),
    ("826", "TJSP"), ("827", "TJTO"),
    // Federal regional courts
    ("401", "TRF1"), ("402", "TRF2"), ("403", "TRF3"), ("404", "TRF4"), ("405", "TRF5"),
    ("406", "TRF6"),
    // Labor courts
    ("501", "TRT1"), ("502", "TRT2"), ("503", "TRT3"), ("504", "TRT4"), ("505", "TRT5"),
    ("506", "TRT6"), ("507", "TRT7"), ("508", "TRT8"), ("509", "TRT9"), ("510", "TRT10"),
    ("511", "TRT11"), ("512", "TRT12"), ("513", "TRT13"), ("514", "TRT14"), ("515", "TRT15"),
    ("516", "TRT16"), ("517", "TRT17"), ("518", "TRT18"), ("519", "TRT19"), ("520", "TRT20"),
    ("521", "TRT21"), ("522", "TRT22"), ("523", "TRT23"), ("524", "TRT24"),
];

/// Look up a 3-digit segment+court code in the fixed table.
pub fn acronym_for(code: &str) -> Option<&'static str> {
    COURT_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, acronym)| *acronym)
}

/// The 3-digit court field of a CNJ, or `None` below the length floor.
pub fn court_code(case_number: &str) -> Option<String> {
    let clean = digits_only(case_number);
    if clean.len() < MIN_CNJ_DIGITS {
        return None;
    }
    let end = clean.len() - 4;
    Some(clean[end - 3..end].to_string())
}

/// Resolve the tribunal a case number belongs to.
///
/// Unknown codes come back as `"Tribunal {code}"`, so once the length check
/// passes this never returns `None`.
pub fn resolve(case_number: &str) -> Option<String> {
    let code = court_code(case_number)?;
    Some(match acronym_for(&code) {
        Some(acronym) => acronym.to_string(),
        None => format!("Tribunal {code}"),
    })
}

/// Per-court counts for a pasted list of case numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourtTally {
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
}

/// Count the case numbers in a blob of text by court.
///
/// Tokens split on commas and whitespace. Unlike [`resolve`], only courts
/// present in the table are counted; everything else is dropped.
pub fn count_known_courts(text: &str) -> CourtTally {
    let mut tally = CourtTally::default();
    for token in text.split(|c: char| c == ',' || c.is_whitespace()) {
        let Some(acronym) = court_code(token).and_then(|code| acronym_for(&code)) else {
            continue;
        };
        *tally.counts.entry(acronym.to_string()).or_insert(0) += 1;
        tally.total += 1;
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_known_court() {
        assert_eq!(resolve("5003289-93.2024.8.24.0020").as_deref(), Some("TJSC"));
        assert_eq!(resolve("10012345620235020001").as_deref(), Some("TRT2"));
        assert_eq!(resolve("00000000020234030000").as_deref(), Some("TRF3"));
    }

    #[test]
    fn test_unknown_code_gets_synthetic_label() {
        assert_eq!(resolve("00000000020239990000").as_deref(), Some("Tribunal 999"));
    }

    #[test]
    fn test_length_floor() {
        // 14 digits is enough
        assert_eq!(resolve("12345678240020").as_deref(), Some("TJSC"));
        // 13 is not
        assert_eq!(resolve("1234568240020"), None);
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("abc"), None);
    }

    #[test]
    fn test_resolve_is_total_above_floor() {
        for len in MIN_CNJ_DIGITS..=25 {
            let number: String = "7".repeat(len);
            let label = resolve(&number).unwrap();
            assert!(label == "Tribunal 777" || acronym_for("777") == Some(label.as_str()));
        }
    }

    #[test]
    fn test_table_has_no_duplicate_codes() {
        let mut codes: Vec<&str> = COURT_TABLE.iter().map(|(c, _)| *c).collect();
        codes.sort_unstable();
        let before = codes.len();
        codes.dedup();
        assert_eq!(before, codes.len());
    }

    #[test]
    fn test_count_known_courts_skips_unknown_and_short() {
        let tally = count_known_courts(
            "5003289-93.2024.8.24.0020, 5003289-93.2024.8.26.0100\n\
             5003289-93.2024.8.24.0001 00000000020239990000 12345",
        );
        assert_eq!(tally.total, 3);
        assert_eq!(tally.counts.get("TJSC"), Some(&2));
        assert_eq!(tally.counts.get("TJSP"), Some(&1));
        assert!(!tally.counts.contains_key("Tribunal 999"));
    }
}
