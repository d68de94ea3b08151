// =============================================================================
// scraper/mod.rs — ONE REPORT, ONE CONTEXT, SIX STEPS
// =============================================================================
//
// For each report we open a fresh browser context and walk the vendor UI:
//
//   1. open the report page and let it settle
//   2. click "Pedido de atualização" if it's there
//   3. filter the Status column to "Não atualizados"
//   4. bump the page size to 1000
//   5. pull the case numbers out
//   6. read the "Progresso" percentage
//
// Steps 2-4 are refinements. Plenty of reports don't have an update link,
// some grids have no Status column, some have no page-size selector. When
// one of them fails we log it and carry on. Steps 1, 5 and 6 are the job
// itself, so their failures go back to the caller and count as an attempt.
//
// The context is closed on the way out, whatever happened.
// =============================================================================

pub mod extract;
pub mod locators;
pub mod progress;

use std::future::Future;
use tracing::{debug, info, warn};

use crate::browser::{BrowserEngine, BrowserError, PageSession, SessionOptions};
use crate::config::{Config, VIEWPORT};
use crate::models::ReportData;

/// Scrape one report in its own browser context.
pub async fn scrape_report(
    engine: &dyn BrowserEngine,
    config: &Config,
    token: &str,
    report_id: &str,
) -> Result<ReportData, BrowserError> {
    let url = config.report_url(report_id);
    let session = engine
        .new_session(&SessionOptions {
            bearer_token: token.to_string(),
            viewport: VIEWPORT,
        })
        .await?;

    let outcome = drive(session.as_ref(), config, &url).await;

    if let Err(e) = session.close().await {
        warn!(report_id = report_id, error = %e, "Failed to close browser context");
    }

    match &outcome {
        Ok(data) => info!(
            report_id = report_id,
            numbers = data.numbers.len(),
            progress = %data.progress,
            "Report scraped"
        ),
        Err(e) => debug!(report_id = report_id, error = %e, "Report scrape failed"),
    }
    outcome
}

async fn drive(page: &dyn PageSession, config: &Config, url: &str) -> Result<ReportData, BrowserError> {
    let timeouts = &config.timeouts;

    page.navigate(url, timeouts.navigation).await?;
    page.wait_for_idle(timeouts.navigation).await?;
    tokio::time::sleep(config.pacing.after_navigation).await;

    best_effort("update request", request_update(page, config)).await;
    // The page reloads its grid after the request, or just keeps loading.
    best_effort("settle after update request", page.wait_for_idle(config.timeouts.idle)).await;
    tokio::time::sleep(config.pacing.after_update_request).await;
    best_effort("status filter", apply_status_filter(page, config)).await;
    best_effort("page size", set_page_size(page, config)).await;

    let numbers = extract::extract_numbers(page, config).await?;
    let progress = progress::read_progress(page).await?;
    Ok(ReportData::new(numbers, progress))
}

/// Run a refinement step; a failure is logged and otherwise ignored.
async fn best_effort<F>(step: &str, fut: F)
where
    F: Future<Output = Result<(), BrowserError>>,
{
    if let Err(e) = fut.await {
        debug!(step = step, error = %e, "Optional step skipped");
    }
}

/// Click "Pedido de atualização" when the report offers it.
async fn request_update(page: &dyn PageSession, config: &Config) -> Result<(), BrowserError> {
    let link = locators::update_request_link();
    if page.is_visible(&link, config.timeouts.element).await? {
        page.click(&link, 0).await?;
        debug!("Update requested");
    }
    Ok(())
}

async fn apply_status_filter(page: &dyn PageSession, config: &Config) -> Result<(), BrowserError> {
    page.hover(&locators::status_header(), config.timeouts.hover).await?;

    // The menu button is the one labelled "...", if any; else the first.
    let buttons = locators::status_header_buttons();
    let labels = page.inner_texts(&buttons).await?;
    if labels.is_empty() {
        page.click(&locators::status_header_menu_icon(), 0).await?;
    } else {
        let nth = labels.iter().position(|label| label.contains("...")).unwrap_or(0);
        page.click(&buttons, nth).await?;
    }
    tokio::time::sleep(config.pacing.filter_menu).await;

    let option = locators::not_updated_option();
    if page.count(&option).await? > 0 {
        page.click(&option, 0).await?;
    }

    let action = locators::filter_button();
    let generic = locators::generic_filter_button();
    if page.count(&action).await? > 0 {
        page.click(&action, 0).await?;
    } else if page.count(&generic).await? > 0 {
        page.click(&generic, 0).await?;
    }

    tokio::time::sleep(config.pacing.after_filter).await;
    Ok(())
}

async fn set_page_size(page: &dyn PageSession, config: &Config) -> Result<(), BrowserError> {
    let select = locators::page_size_select();
    if page.count(&select).await? > 0 {
        page.select_option(&select, locators::PAGE_SIZE_LABEL).await?;
        tokio::time::sleep(config.pacing.after_page_size).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedBrowser, ScriptedReport};
    use crate::config::Pacing;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            pacing: Pacing::instant(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_grid_state_wins() {
        let browser = ScriptedBrowser::new();
        browser.add_report(
            "123456",
            ScriptedReport {
                grid_entities: vec![r#"{"numero":"50032899320248240020"}"#.to_string()],
                scroll_pages: vec![vec!["9999999999".to_string()]],
                progress_row: Some("Progresso 100%".to_string()),
                ..ScriptedReport::default()
            },
        );

        let data = scrape_report(&browser, &config(), "token", "123456").await.unwrap();
        assert_eq!(data.numbers.into_iter().collect::<Vec<_>>(), vec!["50032899320248240020"]);
        assert_eq!(data.progress, "100%");
        assert_eq!(browser.sessions_opened(), 1);
        assert_eq!(browser.sessions_closed(), 1);
        assert_eq!(browser.last_token().as_deref(), Some("token"));
        assert!(browser.visited("/#/relatorio/detalhes/123456"));
    }

    #[tokio::test]
    async fn test_scroll_fallback_when_grid_state_is_empty() {
        let browser = ScriptedBrowser::new();
        browser.add_report(
            "98765",
            ScriptedReport {
                scroll_pages: vec![
                    vec!["5003289-93.2024.8.24.0020".to_string(), "Total".to_string()],
                    vec!["0001234-56.2023.8.26.0100".to_string()],
                ],
                progress_anywhere: vec!["Progresso".to_string(), "Progresso 42%".to_string()],
                ..ScriptedReport::default()
            },
        );

        let data = scrape_report(&browser, &config(), "t", "98765").await.unwrap();
        assert_eq!(data.numbers.len(), 2);
        assert!(data.numbers.contains("5003289-93.2024.8.24.0020"));
        assert_eq!(data.progress, "42%");
        assert!(browser.visited("/#/virtual_report/detalhes/98765"));
    }

    #[tokio::test]
    async fn test_scroll_stops_after_three_stale_rounds() {
        let browser = ScriptedBrowser::new();
        browser.add_report(
            "555555",
            ScriptedReport {
                scroll_pages: vec![vec!["1111111111".to_string()]],
                ..ScriptedReport::default()
            },
        );

        let data = scrape_report(&browser, &config(), "t", "555555").await.unwrap();
        assert_eq!(data.numbers.len(), 1);
        assert_eq!(data.progress, "0%");
        // One productive read, then three stale ones: scrolled between each.
        assert_eq!(browser.scrolls(), 3);
    }

    #[tokio::test]
    async fn test_scrolling_gives_up_after_fifty_screens() {
        let browser = ScriptedBrowser::new();
        browser.add_report(
            "777777",
            ScriptedReport {
                scroll_pages: (0..80).map(|i| vec![format!("{:020}", 1_000_000 + i)]).collect(),
                ..ScriptedReport::default()
            },
        );

        let data = scrape_report(&browser, &config(), "t", "777777").await.unwrap();
        assert_eq!(data.numbers.len(), 50);
        assert_eq!(browser.scrolls(), 50);
        assert!(data.numbers.contains(&format!("{:020}", 1_000_049)));
        assert!(!data.numbers.contains(&format!("{:020}", 1_000_050)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_step_settles_even_when_the_link_lookup_breaks() {
        let browser = ScriptedBrowser::new();
        browser.add_report(
            "123456",
            ScriptedReport {
                update_link: true,
                update_link_broken: true,
                grid_entities: vec![r#"{"n":"50032899320248240020"}"#.to_string()],
                ..ScriptedReport::default()
            },
        );
        let config = Config {
            pacing: Pacing {
                after_update_request: Duration::from_millis(2500),
                ..Pacing::instant()
            },
            ..Config::default()
        };

        let started = tokio::time::Instant::now();
        let data = scrape_report(&browser, &config, "t", "123456").await.unwrap();
        assert_eq!(data.numbers.len(), 1);
        // Once after navigation, once after the update step.
        assert_eq!(browser.idle_waits(), 2);
        assert!(started.elapsed() >= Duration::from_millis(2500));
        assert!(browser.actions().iter().all(|a| !a.starts_with("click a:has-text")));
    }

    #[tokio::test]
    async fn test_refinements_are_performed_when_present() {
        let browser = ScriptedBrowser::new();
        browser.add_report(
            "123456",
            ScriptedReport {
                update_link: true,
                status_filter: true,
                page_size_select: true,
                grid_entities: vec![r#"{"n":"50032899320248240020"}"#.to_string()],
                ..ScriptedReport::default()
            },
        );

        scrape_report(&browser, &config(), "t", "123456").await.unwrap();
        let actions = browser.actions();
        assert!(actions.iter().any(|a| a.starts_with("click a:has-text")));
        assert!(actions.iter().any(|a| a.contains("ui-grid-cell-contents")));
        assert!(actions.iter().any(|a| a.starts_with("click button:has-text(/Filtrar/i)")));
        assert!(actions.iter().any(|a| a == "select 1000"));
    }

    #[tokio::test]
    async fn test_missing_refinements_do_not_fail_the_scrape() {
        let browser = ScriptedBrowser::new();
        browser.add_report(
            "123456",
            ScriptedReport {
                grid_entities: vec![r#"{"n":"50032899320248240020"}"#.to_string()],
                ..ScriptedReport::default()
            },
        );

        let data = scrape_report(&browser, &config(), "t", "123456").await.unwrap();
        assert_eq!(data.numbers.len(), 1);
        assert!(browser.actions().iter().all(|a| !a.starts_with("click")));
    }

    #[tokio::test]
    async fn test_navigation_failure_propagates_and_closes_context() {
        let browser = ScriptedBrowser::new();
        browser.add_report(
            "123456",
            ScriptedReport {
                navigation_failures: 1,
                ..ScriptedReport::default()
            },
        );

        let err = scrape_report(&browser, &config(), "t", "123456").await.unwrap_err();
        assert!(matches!(err, BrowserError::Navigation { .. }));
        assert_eq!(browser.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_empty_report_yields_empty_data() {
        let browser = ScriptedBrowser::new();
        let data = scrape_report(&browser, &config(), "t", "404404").await.unwrap();
        assert!(data.is_empty());
        assert_eq!(data.progress, "0%");
    }
}
