// =============================================================================
// dates.rs — DD/MM/YYYY, THE BRAZILIAN WAY
// =============================================================================
//
// The distribution lookup compares two dates that arrive as display
// strings: when Digesto *sent* the distribution ("14/01/2026, 10:00:00")
// and when the court says it *distributed* the case ("15/01/2026").
// If we sent it before the court distributed it, something is off and the
// row gets flagged.
// =============================================================================

use chrono::NaiveDate;

/// Placeholder the lookup uses for missing values.
pub const NOT_AVAILABLE: &str = "N/A";

/// Parse `DD/MM/YYYY`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() || text == NOT_AVAILABLE {
        return None;
    }
    let mut parts = text.split('/');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(
        year.trim().parse().ok()?,
        month.trim().parse().ok()?,
        day.trim().parse().ok()?,
    )
}

/// Parse `DD/MM/YYYY, HH:MM:SS`, keeping only the date.
pub fn parse_date_time(text: &str) -> Option<NaiveDate> {
    if text.trim() == NOT_AVAILABLE {
        return None;
    }
    let date_part = text.split(',').next()?;
    parse_date(date_part)
}

/// True when the send date falls strictly before the distribution date.
///
/// Time of day is ignored. Unparseable operands never raise the flag.
pub fn is_sent_before_distributed(sent: &str, distributed: &str) -> bool {
    match (parse_date_time(sent), parse_date(distributed)) {
        (Some(sent), Some(distributed)) => sent < distributed,
        _ => false,
    }
}
