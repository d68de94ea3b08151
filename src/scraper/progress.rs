//! The "Progresso" percentage shown somewhere on the report page.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::locators;
use crate::browser::{BrowserError, PageSession};

/// Reported when the page shows no percentage at all.
pub const UNKNOWN_PROGRESS: &str = "0%";

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})%").expect("percent regex is valid"));

/// First 1-3 digit percentage in `text`, normalized to "NN%".
pub fn parse_progress(text: &str) -> Option<String> {
    PERCENT.captures(text).map(|caps| format!("{}%", &caps[1]))
}

/// Look in the first table row mentioning "Progresso", then in the last
/// element of any kind that mentions it.
pub async fn read_progress(page: &dyn PageSession) -> Result<String, BrowserError> {
    let rows = page.inner_texts(&locators::progress_row()).await?;
    if let Some(progress) = rows.first().and_then(|text| parse_progress(text)) {
        return Ok(progress);
    }

    let elements = page.inner_texts(&locators::progress_anywhere()).await?;
    if let Some(progress) = elements.last().and_then(|text| parse_progress(text)) {
        return Ok(progress);
    }

    debug!("No progress percentage on page");
    Ok(UNKNOWN_PROGRESS.to_string())
}
