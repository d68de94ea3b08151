// =============================================================================
// browser/scripted.rs — A FAKE DIGESTO IN A HASHMAP
// =============================================================================
//
// Test double for the browser traits. Each report id maps to a description
// of what its page contains (grid entities, rendered rows per scroll
// position, a progress label, which optional controls exist) and the
// scripted page answers locator queries from that description. Everything
// the scraper does is recorded so tests can assert on it.
// =============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{BrowserEngine, BrowserError, BrowserLauncher, Locator, PageSession, SessionOptions};
use crate::scraper::locators;

/// What one report page looks like.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReport {
    /// Serialized row entities in the Angular grid scope.
    pub grid_entities: Vec<String>,
    /// First-cell texts rendered at each scroll position.
    pub scroll_pages: Vec<Vec<String>>,
    pub progress_row: Option<String>,
    pub progress_anywhere: Vec<String>,
    pub update_link: bool,
    /// Looking for the update link fails with a protocol error.
    pub update_link_broken: bool,
    pub status_filter: bool,
    pub page_size_select: bool,
    /// Navigations to this report that fail before one succeeds.
    pub navigation_failures: u32,
}

#[derive(Default)]
struct BrowserState {
    reports: HashMap<String, ScriptedReport>,
    sessions_opened: u32,
    sessions_closed: u32,
    visited: Vec<String>,
    actions: Vec<String>,
    scrolls: u32,
    idle_waits: u32,
    last_token: Option<String>,
    shutdowns: u32,
}

/// Shared handle; clones see the same state.
#[derive(Clone, Default)]
pub struct ScriptedBrowser {
    state: Arc<Mutex<BrowserState>>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_report(&self, report_id: &str, report: ScriptedReport) {
        self.state.lock().reports.insert(report_id.to_string(), report);
    }

    pub fn sessions_opened(&self) -> u32 {
        self.state.lock().sessions_opened
    }

    pub fn sessions_closed(&self) -> u32 {
        self.state.lock().sessions_closed
    }

    pub fn visited(&self, url_suffix: &str) -> bool {
        self.state.lock().visited.iter().any(|url| url.ends_with(url_suffix))
    }

    pub fn navigations(&self) -> usize {
        self.state.lock().visited.len()
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn scrolls(&self) -> u32 {
        self.state.lock().scrolls
    }

    pub fn idle_waits(&self) -> u32 {
        self.state.lock().idle_waits
    }

    pub fn last_token(&self) -> Option<String> {
        self.state.lock().last_token.clone()
    }

    pub fn shutdowns(&self) -> u32 {
        self.state.lock().shutdowns
    }
}

#[async_trait]
impl BrowserEngine for ScriptedBrowser {
    async fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError> {
        let mut state = self.state.lock();
        state.sessions_opened += 1;
        state.last_token = Some(options.bearer_token.clone());
        Ok(Box::new(ScriptedPage {
            browser: self.clone(),
            report_id: Mutex::new(None),
            scroll_position: Mutex::new(0),
        }))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        self.state.lock().shutdowns += 1;
        Ok(())
    }
}

/// Launches a [`ScriptedBrowser`], or refuses to.
pub struct ScriptedLauncher {
    pub browser: ScriptedBrowser,
    pub fail_launch: bool,
    launches: AtomicU32,
}

impl ScriptedLauncher {
    pub fn new(browser: ScriptedBrowser) -> Self {
        Self {
            browser,
            fail_launch: false,
            launches: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::new(ScriptedBrowser::new())
        }
    }

    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>, BrowserError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(BrowserError::Launch("no chrome in this sandbox".to_string()));
        }
        Ok(Arc::new(self.browser.clone()))
    }
}

pub struct ScriptedPage {
    browser: ScriptedBrowser,
    report_id: Mutex<Option<String>>,
    scroll_position: Mutex<usize>,
}

impl ScriptedPage {
    fn report(&self) -> ScriptedReport {
        let id = self.report_id.lock().clone();
        let state = self.browser.state.lock();
        id.and_then(|id| state.reports.get(&id).cloned()).unwrap_or_default()
    }

    fn record(&self, action: String) {
        self.browser.state.lock().actions.push(action);
    }

    fn rendered_rows(&self, report: &ScriptedReport) -> Vec<String> {
        let position = *self.scroll_position.lock();
        match report.scroll_pages.len() {
            0 => Vec::new(),
            n => report.scroll_pages[position.min(n - 1)].clone(),
        }
    }

    /// Texts of whatever `locator` matches on this report's page.
    fn matches(&self, locator: &Locator) -> Vec<String> {
        let report = self.report();
        let present = |flag: bool, text: &str| if flag { vec![text.to_string()] } else { Vec::new() };

        if *locator == locators::update_request_link() {
            present(report.update_link, "Pedido de atualização")
        } else if *locator == locators::status_header() {
            present(report.status_filter, "Status")
        } else if *locator == locators::status_header_buttons() {
            if report.status_filter {
                vec!["Ordenar".to_string(), "...".to_string()]
            } else {
                Vec::new()
            }
        } else if *locator == locators::not_updated_option() {
            present(report.status_filter, "Não atualizados")
        } else if *locator == locators::filter_button() {
            present(report.status_filter, "Filtrar")
        } else if *locator == locators::page_size_select() {
            present(report.page_size_select, "1000")
        } else if *locator == locators::grid_rows() || *locator == locators::first_cells() {
            self.rendered_rows(&report)
        } else if *locator == locators::progress_row() {
            report.progress_row.into_iter().collect()
        } else if *locator == locators::progress_anywhere() {
            report.progress_anywhere
        } else {
            Vec::new()
        }
    }
}

#[async_trait]
impl PageSession for ScriptedPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        let report_id = url.rsplit('/').next().unwrap_or_default().to_string();
        {
            let mut state = self.browser.state.lock();
            state.visited.push(url.to_string());
            if let Some(report) = state.reports.get_mut(&report_id) {
                if report.navigation_failures > 0 {
                    report.navigation_failures -= 1;
                    return Err(BrowserError::Navigation {
                        url: url.to_string(),
                        reason: "net::ERR_CONNECTION_RESET".to_string(),
                    });
                }
            }
        }
        *self.report_id.lock() = Some(report_id);
        *self.scroll_position.lock() = 0;
        Ok(())
    }

    async fn wait_for_idle(&self, _timeout: Duration) -> Result<(), BrowserError> {
        self.browser.state.lock().idle_waits += 1;
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator, _timeout: Duration) -> Result<bool, BrowserError> {
        if *locator == locators::update_request_link() && self.report().update_link_broken {
            return Err(BrowserError::Protocol("target closed".to_string()));
        }
        Ok(!self.matches(locator).is_empty())
    }

    async fn count(&self, locator: &Locator) -> Result<usize, BrowserError> {
        Ok(self.matches(locator).len())
    }

    async fn click(&self, locator: &Locator, nth: usize) -> Result<(), BrowserError> {
        if nth >= self.matches(locator).len() {
            return Err(BrowserError::NotFound(format!("{locator} [{nth}]")));
        }
        self.record(format!("click {locator} [{nth}]"));
        Ok(())
    }

    async fn hover(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        if self.matches(locator).is_empty() {
            return Err(BrowserError::Timeout {
                what: locator.to_string(),
                after: timeout,
            });
        }
        self.record(format!("hover {locator}"));
        Ok(())
    }

    async fn inner_texts(&self, locator: &Locator) -> Result<Vec<String>, BrowserError> {
        Ok(self.matches(locator))
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> Result<(), BrowserError> {
        if !self.matches(locator).iter().any(|option| option == label) {
            return Err(BrowserError::NotFound(format!("{locator} option '{label}'")));
        }
        self.record(format!("select {label}"));
        Ok(())
    }

    async fn wait_for_attached(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        if self.matches(locator).is_empty() {
            return Err(BrowserError::Timeout {
                what: locator.to_string(),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn scroll_page(&self, _container_css: &str) -> Result<(), BrowserError> {
        *self.scroll_position.lock() += 1;
        self.browser.state.lock().scrolls += 1;
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<Value, BrowserError> {
        let report = self.report();
        if report.grid_entities.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(json!(report.grid_entities))
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.browser.state.lock().sessions_closed += 1;
        Ok(())
    }
}
