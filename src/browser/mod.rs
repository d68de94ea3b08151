// =============================================================================
// browser/mod.rs — WHAT WE NEED FROM A BROWSER
// =============================================================================
//
// The scraper doesn't care which automation library sits underneath. It
// needs to open an isolated session with an auth header, go somewhere,
// find things, click things, read text, scroll, and occasionally run a
// snippet of JavaScript inside the page. That's the whole contract.
//
// `chromium` implements it over the Chrome DevTools Protocol. Tests use
// `scripted`, which pretends to be the vendor UI without launching anything.
// =============================================================================

pub mod chromium;
#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out waiting for {what} after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("no element matches {0}")]
    NotFound(String),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// One hop of a [`Locator`]: a CSS selector, optionally narrowed to
/// elements whose visible text matches a case-insensitive pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub css: String,
    pub text: Option<String>,
    /// Keep only the first match under each parent.
    pub first: bool,
}

/// A chain of steps, each searched inside the matches of the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    pub steps: Vec<Step>,
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            steps: vec![Step {
                css: css.into(),
                text: None,
                first: false,
            }],
        }
    }

    /// Narrow the last step to elements containing `text` (case-insensitive).
    pub fn has_text(self, text: &str) -> Self {
        self.matching(&regex::escape(text))
    }

    /// Narrow the last step with a raw case-insensitive pattern.
    pub fn matching(mut self, pattern: &str) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.text = Some(pattern.to_string());
        }
        self
    }

    /// Descend into `css` under every current match.
    pub fn within(mut self, css: impl Into<String>) -> Self {
        self.steps.push(Step {
            css: css.into(),
            text: None,
            first: false,
        });
        self
    }

    /// Like [`Locator::within`], keeping only the first hit per parent.
    pub fn first_within(mut self, css: impl Into<String>) -> Self {
        self.steps.push(Step {
            css: css.into(),
            text: None,
            first: true,
        });
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " >> ")?;
            }
            write!(f, "{}", step.css)?;
            if let Some(text) = &step.text {
                write!(f, ":has-text(/{text}/i)")?;
            }
            if step.first {
                write!(f, ":first")?;
            }
        }
        Ok(())
    }
}

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub bearer_token: String,
    pub viewport: (u32, u32),
}

/// Starts browsers. One browser per task.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>, BrowserError>;
}

/// A running browser that hands out isolated sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// A fresh context (own cookies, own storage) with a single page.
    async fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError>;

    async fn shutdown(&self) -> Result<(), BrowserError>;
}

/// The page-level capabilities the report pipeline relies on.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until the page stops loading things.
    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// Whether the first match becomes visible within `timeout`.
    async fn is_visible(&self, locator: &Locator, timeout: Duration) -> Result<bool, BrowserError>;

    async fn count(&self, locator: &Locator) -> Result<usize, BrowserError>;

    /// Click the `nth` match.
    async fn click(&self, locator: &Locator, nth: usize) -> Result<(), BrowserError>;

    async fn hover(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    /// Rendered text of every match, in document order.
    async fn inner_texts(&self, locator: &Locator) -> Result<Vec<String>, BrowserError>;

    /// Pick the `<option>` with the given label in the first matching `<select>`.
    async fn select_option(&self, locator: &Locator, label: &str) -> Result<(), BrowserError>;

    /// Wait until at least one match is attached to the DOM.
    async fn wait_for_attached(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    /// Scroll `container_css` down by one viewport height, or the window if absent.
    async fn scroll_page(&self, container_css: &str) -> Result<(), BrowserError>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Close the page and dispose of its context.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}
