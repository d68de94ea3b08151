// =============================================================================
// scraper/extract.rs — GETTING THE NUMBERS OUT OF UI-GRID
// =============================================================================
//
// Two ways in, tried in order:
//
// 1. Ask Angular. The grid keeps every row's entity in its scope, all of
//    them, not just the thirty that happen to be rendered. One evaluate()
//    and we have the lot. Any run of 10+ digits in an entity is a number.
//
// 2. Scroll like a human. ui-grid virtualizes its rows, so we read the
//    first cell of whatever is rendered, scroll one screen, and repeat
//    until three scrolls in a row turn up nothing new (or fifty scrolls,
//    whichever comes first).
//
// Number 2 only runs when number 1 comes back empty-handed.
// =============================================================================

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, info};

use super::locators;
use crate::browser::{BrowserError, PageSession};
use crate::cnj;
use crate::config::Config;

/// Digit runs long enough to be a case number.
static NUMBER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{10,}").expect("number run regex is valid"));

/// Minimum digits for a rendered cell to count as a case number.
const MIN_CELL_DIGITS: usize = 10;

const MAX_SCROLLS: usize = 50;

/// Scrolls in a row without new numbers before we call it the end.
const MAX_STALE_SCROLLS: usize = 3;

/// Every row entity of the grid, JSON-serialized, or null without a grid.
pub const GRID_STATE_JS: &str = r#"
(() => {
  try {
    const grid = document.querySelector('.ui-grid-canvas');
    if (!grid || !window.angular) return null;
    const scope = window.angular.element(grid).scope();
    if (!scope || !scope.grid || !scope.grid.rows) return null;
    return scope.grid.rows.map(row => JSON.stringify(row.entity));
  } catch (e) {
    return null;
  }
})()
"#;

/// Harvest case numbers, Angular state first, scrolling second.
pub async fn extract_numbers(page: &dyn PageSession, config: &Config) -> Result<BTreeSet<String>, BrowserError> {
    match page.evaluate(GRID_STATE_JS).await {
        Ok(state) => {
            let numbers = numbers_from_grid_state(&state);
            if !numbers.is_empty() {
                debug!(numbers = numbers.len(), "Read numbers from grid state");
                return Ok(numbers);
            }
        }
        Err(e) => debug!(error = %e, "Grid state unavailable"),
    }

    scroll_and_read(page, config).await
}

/// Digit runs found in each serialized row entity.
pub fn numbers_from_grid_state(state: &Value) -> BTreeSet<String> {
    let Some(rows) = state.as_array() else {
        return BTreeSet::new();
    };
    rows.iter()
        .filter_map(Value::as_str)
        .flat_map(|entity| NUMBER_RUN.find_iter(entity).map(|m| m.as_str().to_string()))
        .collect()
}

/// Keep a rendered cell's text if it carries enough digits.
pub fn accept_cell(text: &str) -> Option<String> {
    let text = text.trim();
    (cnj::digits_only(text).len() >= MIN_CELL_DIGITS).then(|| text.to_string())
}

async fn scroll_and_read(page: &dyn PageSession, config: &Config) -> Result<BTreeSet<String>, BrowserError> {
    let mut numbers = BTreeSet::new();

    match page
        .wait_for_attached(&locators::grid_rows(), config.timeouts.row_attach)
        .await
    {
        Ok(()) => {}
        Err(BrowserError::Timeout { .. }) => {
            debug!("Grid rows never attached");
            return Ok(numbers);
        }
        Err(e) => return Err(e),
    }

    let cells = locators::first_cells();
    let mut stale = 0;
    for scroll in 0..MAX_SCROLLS {
        let before = numbers.len();
        for text in page.inner_texts(&cells).await? {
            if let Some(number) = accept_cell(&text) {
                numbers.insert(number);
            }
        }

        if numbers.len() == before {
            stale += 1;
        } else {
            stale = 0;
        }
        if stale >= MAX_STALE_SCROLLS {
            debug!(scrolls = scroll, "Grid exhausted");
            break;
        }

        page.scroll_page(locators::GRID_VIEWPORT).await?;
        tokio::time::sleep(config.pacing.scroll).await;
    }

    info!(numbers = numbers.len(), "Read numbers by scrolling");
    Ok(numbers)
}
