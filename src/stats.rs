// =============================================================================
// stats.rs — FROM A PILE OF NUMBERS TO A TABLE OF COURTS
// =============================================================================

use std::collections::BTreeMap;

use crate::court;
use crate::models::{ReportData, ReportStats};

/// Summarize one report's case numbers by tribunal.
///
/// A number counts toward `total_atrasados` only when [`court::resolve`]
/// yields a label. Unknown courts still count under their synthetic
/// "Tribunal NNN" label; numbers below the length floor are skipped.
pub fn compute_stats(report_id: &str, report_url: &str, data: &ReportData) -> ReportStats {
    let mut tribunais: BTreeMap<String, u64> = BTreeMap::new();
    let mut total_atrasados = 0u64;

    for number in &data.numbers {
        if let Some(tribunal) = court::resolve(number) {
            total_atrasados += 1;
            *tribunais.entry(tribunal).or_insert(0) += 1;
        }
    }

    ReportStats {
        report_id: report_id.to_string(),
        report_url: report_url.to_string(),
        total_atrasados,
        total_tribunais: tribunais.len(),
        tribunais,
        progress: data.progress.clone(),
        numbers: data.numbers.iter().cloned().collect(),
    }
}
