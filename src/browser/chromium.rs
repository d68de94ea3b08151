// =============================================================================
// browser/chromium.rs — HEADLESS CHROME OVER CDP
// =============================================================================
//
// chromiumoxide gives us a Browser, a Handler stream that must be polled
// for anything to happen, and Pages. Isolation comes from CDP browser
// contexts: every report gets its own context, so cookies and local
// storage never leak between reports, and disposing the context frees
// everything in one go.
//
// Element lookups run as small JavaScript snippets. The vendor UI is
// AngularJS with ui-grid, and dispatching DOM events from inside the page
// is what its directives actually listen to.
// =============================================================================

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{BrowserEngine, BrowserError, BrowserLauncher, Locator, PageSession, SessionOptions};

/// How often polling lookups re-check the page.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Resolves a serialized locator to a list of elements.
const RESOLVE_JS: &str = r#"
const __resolve = (steps) => {
  let roots = [document];
  for (const step of steps) {
    const re = step.text ? new RegExp(step.text, 'i') : null;
    const next = [];
    for (const root of roots) {
      let found = Array.from(root.querySelectorAll(step.css));
      if (re) found = found.filter(el => re.test(el.innerText || el.textContent || ''));
      if (step.first) found = found.slice(0, 1);
      for (const el of found) if (!next.includes(el)) next.push(el);
    }
    roots = next;
  }
  return roots;
};
const __visible = (el) => {
  const r = el.getBoundingClientRect();
  const s = window.getComputedStyle(el);
  return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
};
"#;

/// Quiet when the document is loaded and Angular has no requests in flight.
const IDLE_JS: &str = r#"
(() => {
  if (document.readyState !== 'complete') return false;
  try {
    if (window.angular) {
      const injector = window.angular.element(document.body).injector();
      if (injector && injector.get('$http').pendingRequests.length > 0) return false;
    }
  } catch (e) {}
  return true;
})()
"#;

/// Launches Chrome through chromiumoxide.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub args: Vec<String>,
    pub window: (u32, u32),
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserEngine>, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .args(self.args.clone())
            .window_size(self.window.0, self.window.1);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Nothing moves over CDP unless the handler is polled.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        info!(headless = self.headless, "Browser launched");
        Ok(Arc::new(ChromiumEngine {
            browser: Arc::new(RwLock::new(browser)),
            handler_task,
        }))
    }
}

pub struct ChromiumEngine {
    browser: Arc<RwLock<Browser>>,
    handler_task: JoinHandle<()>,
}

fn protocol(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError> {
        let (page, context_id) = {
            let browser = self.browser.read().await;
            let context = browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(protocol)?;
            let context_id = context.result.browser_context_id.clone();
            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context_id.clone())
                .build()
                .map_err(BrowserError::Protocol)?;
            let page = browser.new_page(target).await.map_err(protocol)?;
            (page, context_id)
        };

        let session = ChromiumSession {
            page: Some(page),
            browser: self.browser.clone(),
            context_id,
        };

        if let Err(e) = session.prepare(options).await {
            if let Err(close_err) = Box::new(session).close().await {
                warn!(error = %close_err, "Failed to close browser context after setup error");
            }
            return Err(e);
        }
        Ok(Box::new(session))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.write().await;
        let closed = browser.close().await.map_err(protocol);
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler_task.abort();
        info!("Browser closed");
        closed.map(|_| ())
    }
}

pub struct ChromiumSession {
    page: Option<Page>,
    browser: Arc<RwLock<Browser>>,
    context_id: BrowserContextId,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("page already closed".to_string()))
    }

    /// Auth header and viewport, before the first navigation.
    async fn prepare(&self, options: &SessionOptions) -> Result<(), BrowserError> {
        let page = self.page()?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(json!({
            "Authorization": format!("Bearer {}", options.bearer_token),
        }))))
        .await
        .map_err(protocol)?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(options.viewport.0),
            i64::from(options.viewport.1),
            1.0,
            false,
        ))
        .await
        .map_err(protocol)?;
        Ok(())
    }

    /// Run `body` with `els` bound to the locator's matches.
    async fn with_elements(&self, locator: &Locator, body: &str) -> Result<Value, BrowserError> {
        let steps = serde_json::to_string(&locator.steps).map_err(|e| BrowserError::Script(e.to_string()))?;
        let script = format!("(() => {{ {RESOLVE_JS} const els = __resolve({steps}); {body} }})()");
        self.evaluate(&script).await
    }

    async fn poll_locator(&self, locator: &Locator, body: &str, timeout: Duration) -> Result<bool, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.with_elements(locator, body).await?.as_bool() == Some(true) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                what: format!("navigation to {url}"),
                after: timeout,
            }),
        }
    }

    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), BrowserError> {
        let page = self.page()?;
        let started = Instant::now();
        if tokio::time::timeout(timeout, page.wait_for_navigation()).await.is_err() {
            return Err(BrowserError::Timeout {
                what: "page load".to_string(),
                after: timeout,
            });
        }

        // Two quiet reads in a row before calling it idle.
        let deadline = started + timeout;
        let mut quiet = 0;
        loop {
            if self.evaluate(IDLE_JS).await?.as_bool() == Some(true) {
                quiet += 1;
                if quiet >= 2 {
                    return Ok(());
                }
            } else {
                quiet = 0;
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: "network idle".to_string(),
                    after: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn is_visible(&self, locator: &Locator, timeout: Duration) -> Result<bool, BrowserError> {
        self.poll_locator(locator, "return els.length > 0 && __visible(els[0]);", timeout)
            .await
    }

    async fn count(&self, locator: &Locator) -> Result<usize, BrowserError> {
        let value = self.with_elements(locator, "return els.length;").await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn click(&self, locator: &Locator, nth: usize) -> Result<(), BrowserError> {
        let body = format!(
            "const el = els[{nth}]; if (!el) return false; el.scrollIntoView({{block: 'center'}}); el.click(); return true;"
        );
        match self.with_elements(locator, &body).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(BrowserError::NotFound(format!("{locator} [{nth}]"))),
        }
    }

    async fn hover(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        if !self.poll_locator(locator, "return els.length > 0;", timeout).await? {
            return Err(BrowserError::Timeout {
                what: locator.to_string(),
                after: timeout,
            });
        }
        let body = "const el = els[0]; \
                    for (const type of ['mouseover', 'mouseenter', 'mousemove']) { \
                      el.dispatchEvent(new MouseEvent(type, {bubbles: true})); \
                    } \
                    return true;";
        self.with_elements(locator, body).await.map(|_| ())
    }

    async fn inner_texts(&self, locator: &Locator) -> Result<Vec<String>, BrowserError> {
        let value = self
            .with_elements(locator, "return els.map(el => el.innerText || el.textContent || '');")
            .await?;
        Ok(value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> Result<(), BrowserError> {
        let label_json = serde_json::to_string(label).map_err(|e| BrowserError::Script(e.to_string()))?;
        let body = format!(
            "const sel = els[0]; if (!sel) return false; \
             const opt = Array.from(sel.options).find(o => o.text.trim() === {label_json}); \
             if (!opt) return false; \
             sel.value = opt.value; \
             sel.dispatchEvent(new Event('change', {{bubbles: true}})); \
             return true;"
        );
        match self.with_elements(locator, &body).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(BrowserError::NotFound(format!("{locator} option '{label}'"))),
        }
    }

    async fn wait_for_attached(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        if self.poll_locator(locator, "return els.length > 0;", timeout).await? {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: locator.to_string(),
                after: timeout,
            })
        }
    }

    async fn scroll_page(&self, container_css: &str) -> Result<(), BrowserError> {
        let css = serde_json::to_string(container_css).map_err(|e| BrowserError::Script(e.to_string()))?;
        let script = format!(
            "(() => {{ const c = document.querySelector({css}); \
             if (c) {{ c.scrollTop += c.clientHeight; }} else {{ window.scrollBy(0, window.innerHeight); }} \
             return true; }})()"
        );
        self.evaluate(&script).await.map(|_| ())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(BrowserError::Script)?;
        let result = self
            .page()?
            .evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn close(mut self: Box<Self>) -> Result<(), BrowserError> {
        let page_closed = match self.page.take() {
            Some(page) => page.close().await.map_err(protocol),
            None => Ok(()),
        };

        let browser = self.browser.read().await;
        if let Err(e) = browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
        {
            warn!(error = %e, "Failed to dispose browser context");
        }
        page_closed
    }
}
