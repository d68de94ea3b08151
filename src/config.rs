// =============================================================================
// config.rs — KNOBS AND DIALS
// =============================================================================
//
// Everything tunable lives here and everything can be overridden from the
// environment (prefix TRIBUNAL_RADAR_), with a .env file picked up if one
// is lying around. The one exception is the Digesto token, which keeps the
// unprefixed name DIGESTO_API_TOKEN that every deployment already sets.
//
// The pacing delays look arbitrary because they are: they are what the
// vendor's Angular app needs to finish re-rendering after each click.
// =============================================================================

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Chrome flags for running headless inside a container.
pub const BROWSER_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--no-sandbox",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
];

/// Viewport the vendor UI is laid out for.
pub const VIEWPORT: (u32, u32) = (1366, 768);

/// Fixed pauses the scraper inserts between UI interactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// After the report page finishes loading.
    pub after_navigation: Duration,
    /// After the "Pedido de atualização" step, clicked or not.
    pub after_update_request: Duration,
    /// For the column menu to open.
    pub filter_menu: Duration,
    /// For the grid to re-render after filtering.
    pub after_filter: Duration,
    /// For the grid to re-render after changing page size.
    pub after_page_size: Duration,
    /// Between scroll steps in the fallback extractor.
    pub scroll: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            after_navigation: Duration::from_millis(1500),
            after_update_request: Duration::from_millis(2500),
            filter_menu: Duration::from_millis(1000),
            after_filter: Duration::from_millis(2000),
            after_page_size: Duration::from_millis(2000),
            scroll: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    /// No pauses at all. For scripted browsers.
    pub fn instant() -> Self {
        Self {
            after_navigation: Duration::ZERO,
            after_update_request: Duration::ZERO,
            filter_menu: Duration::ZERO,
            after_filter: Duration::ZERO,
            after_page_size: Duration::ZERO,
            scroll: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub navigation: Duration,
    /// Waiting for an optional element to show up.
    pub element: Duration,
    /// Hovering the Status header.
    pub hover: Duration,
    /// Waiting for grid rows in the scroll extractor.
    pub row_attach: Duration,
    /// Waiting for the network to go quiet.
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            element: Duration::from_secs(10),
            hover: Duration::from_secs(5),
            row_attach: Duration::from_secs(20),
            idle: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // HTTP API
    // =========================================================================
    pub listen_addr: SocketAddr,

    // =========================================================================
    // DIGESTO
    // =========================================================================
    /// Root of both the web UI and the REST API.
    pub digesto_base_url: String,

    /// Bearer token for the UI and the API. Submissions are refused without it.
    pub digesto_api_token: Option<String>,

    // =========================================================================
    // SCRAPING
    // =========================================================================
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub max_retries: u32,
    /// Base of the linear backoff: attempt n waits n x this.
    pub retry_delay: Duration,
    /// Reports scraped at the same time within one task.
    pub parallel_limit: usize,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub timeouts: Timeouts,
    pub pacing: Pacing,

    // =========================================================================
    // TASK REGISTRY
    // =========================================================================
    /// How long finished tasks stay pollable.
    pub task_retention: Duration,
    pub janitor_interval: Duration,

    // =========================================================================
    // CIRCUIT BREAKER (REST API)
    // =========================================================================
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_reset_timeout: Duration,
    pub circuit_breaker_success_threshold: u32,

    // =========================================================================
    // LOGGING
    // =========================================================================
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            digesto_base_url: "https://op.digesto.com.br".to_string(),
            digesto_api_token: None,
            cache_dir: PathBuf::from("data"),
            cache_ttl: Duration::from_secs(3600),
            max_retries: 3,
            retry_delay: Duration::from_millis(2000),
            parallel_limit: 6,
            headless: true,
            chrome_executable: None,
            timeouts: Timeouts::default(),
            pacing: Pacing::default(),
            task_retention: Duration::from_secs(86_400),
            janitor_interval: Duration::from_secs(300),
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_reset_timeout: Duration::from_secs(60),
            circuit_breaker_success_threshold: 2,
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Config::default();

        Config {
            listen_addr: parse_env("TRIBUNAL_RADAR_LISTEN_ADDR", defaults.listen_addr),
            digesto_base_url: env_or_default("TRIBUNAL_RADAR_DIGESTO_BASE_URL", &defaults.digesto_base_url)
                .trim_end_matches('/')
                .to_string(),
            digesto_api_token: env::var("DIGESTO_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),

            cache_dir: env::var("TRIBUNAL_RADAR_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_ttl: secs_env("TRIBUNAL_RADAR_CACHE_TTL_SECS", defaults.cache_ttl),
            max_retries: parse_env("TRIBUNAL_RADAR_MAX_RETRIES", defaults.max_retries),
            retry_delay: Duration::from_millis(parse_env(
                "TRIBUNAL_RADAR_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )),
            parallel_limit: parse_env("TRIBUNAL_RADAR_PARALLEL_LIMIT", defaults.parallel_limit),
            headless: parse_bool_env("TRIBUNAL_RADAR_HEADLESS", defaults.headless),
            chrome_executable: env::var("TRIBUNAL_RADAR_CHROME_EXECUTABLE").ok().map(PathBuf::from),
            timeouts: Timeouts {
                navigation: secs_env("TRIBUNAL_RADAR_NAVIGATION_TIMEOUT_SECS", defaults.timeouts.navigation),
                element: secs_env("TRIBUNAL_RADAR_ELEMENT_TIMEOUT_SECS", defaults.timeouts.element),
                row_attach: secs_env("TRIBUNAL_RADAR_ROW_ATTACH_TIMEOUT_SECS", defaults.timeouts.row_attach),
                ..defaults.timeouts
            },
            pacing: defaults.pacing,

            task_retention: secs_env("TRIBUNAL_RADAR_TASK_RETENTION_SECS", defaults.task_retention),
            janitor_interval: secs_env("TRIBUNAL_RADAR_JANITOR_INTERVAL_SECS", defaults.janitor_interval),

            circuit_breaker_failure_threshold: parse_env(
                "TRIBUNAL_RADAR_CB_FAILURE_THRESHOLD",
                defaults.circuit_breaker_failure_threshold,
            ),
            circuit_breaker_reset_timeout: secs_env(
                "TRIBUNAL_RADAR_CB_RESET_TIMEOUT_SECS",
                defaults.circuit_breaker_reset_timeout,
            ),
            circuit_breaker_success_threshold: parse_env(
                "TRIBUNAL_RADAR_CB_SUCCESS_THRESHOLD",
                defaults.circuit_breaker_success_threshold,
            ),

            log_json: parse_bool_env("TRIBUNAL_RADAR_LOG_JSON", defaults.log_json),
        }
    }

    /// Detail page of a report in the vendor UI.
    ///
    /// Six-digit ids are classic reports; anything else is a virtual report.
    pub fn report_url(&self, report_id: &str) -> String {
        if report_id.len() == 6 {
            format!("{}/#/relatorio/detalhes/{}", self.digesto_base_url, report_id)
        } else {
            format!("{}/#/virtual_report/detalhes/{}", self.digesto_base_url, report_id)
        }
    }

    pub fn browser_args(&self) -> Vec<String> {
        BROWSER_ARGS.iter().map(|arg| arg.to_string()).collect()
    }
}

/// Read an environment variable with a default fallback.
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn secs_env(key: &str, default: Duration) -> Duration {
    Duration::from_secs(parse_env(key, default.as_secs()))
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
