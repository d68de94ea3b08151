// ████████╗██████╗ ██╗██████╗ ██╗   ██╗███╗   ██╗ █████╗ ██╗
// ╚══██╔══╝██╔══██╗██║██╔══██╗██║   ██║████╗  ██║██╔══██╗██║
//    ██║   ██████╔╝██║██████╔╝██║   ██║██╔██╗ ██║███████║██║
//    ██║   ██╔══██╗██║██╔══██╗██║   ██║██║╚██╗██║██╔══██║██║
//    ██║   ██║  ██║██║██████╔╝╚██████╔╝██║ ╚████║██║  ██║███████╗
//    ╚═╝   ╚═╝  ╚═╝╚═╝╚═════╝  ╚═════╝ ╚═╝  ╚═══╝╚═╝  ╚═╝╚══════╝
//
// ██████╗  █████╗ ██████╗  █████╗ ██████╗
// ██╔══██╗██╔══██╗██╔══██╗██╔══██╗██╔══██╗
// ██████╔╝███████║██║  ██║███████║██████╔╝
// ██╔══██╗██╔══██║██║  ██║██╔══██║██╔══██╗
// ██║  ██║██║  ██║██████╔╝██║  ██║██║  ██║
// ╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝
//
// A headless Chrome, a thousand-row ui-grid and a regex walk into a bar.
// Only the regex leaves with the CNJ numbers.

mod api;
mod browser;
mod cache;
mod circuit_breaker;
mod cnj;
mod config;
mod court;
mod dates;
mod digesto;
mod metrics;
mod models;
mod orchestrator;
mod retry;
mod scheduler;
mod scraper;
mod stats;
mod task_store;
mod validator;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::AppState;
use crate::browser::chromium::ChromiumLauncher;
use crate::config::{Config, VIEWPORT};
use crate::digesto::DigestoClient;
use crate::metrics::MetricsCollector;
use crate::orchestrator::Orchestrator;
use crate::task_store::TaskStore;

fn print_banner() {
    let banner = r#"

    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║        ⚖  T R I B U N A L   R A D A R  ⚖                     ║
    ║                                                              ║
    ║   Input:    saved Digesto reports, pasted by the hundred     ║
    ║   Driver:   headless Chrome over CDP                         ║
    ║   Output:   overdue CNJs, tallied per court                  ║
    ║   Extras:   distribution lookups, party regex checks         ║
    ║                                                              ║
    ║   "Nobody should scroll a ui-grid by hand."                  ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝

    "#;
    println!("{}", banner);
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    if json {
        builder.json().init();
    } else {
        builder.with_ansi(true).init();
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::from_env());
    init_tracing(config.log_json);

    if !config.log_json {
        print_banner();
    }

    info!(
        listen_addr = %config.listen_addr,
        digesto = %config.digesto_base_url,
        cache_dir = %config.cache_dir.display(),
        parallel_limit = config.parallel_limit,
        headless = config.headless,
        "Configuration loaded"
    );
    if config.digesto_api_token.is_none() {
        warn!("DIGESTO_API_TOKEN is not set; report submissions will be refused");
    }

    let store = Arc::new(TaskStore::new());
    let metrics = Arc::new(MetricsCollector::new());
    let launcher = Arc::new(ChromiumLauncher {
        headless: config.headless,
        executable: config.chrome_executable.clone(),
        args: config.browser_args(),
        window: VIEWPORT,
    });
    let orchestrator = Orchestrator::new(store.clone(), config.clone(), launcher, metrics.clone());
    let digesto = Arc::new(DigestoClient::new(&config).context("invalid Digesto API settings")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let janitor = tokio::spawn(task_store::run_janitor(
        store,
        config.task_retention,
        config.janitor_interval,
        shutdown_rx,
    ));

    let app = api::router(AppState {
        orchestrator,
        digesto,
        metrics,
    });
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("could not bind {}", config.listen_addr))?;

    info!("═══════════════════════════════════════════════════════");
    info!("  🟢 TRIBUNAL RADAR ONLINE at http://{}", config.listen_addr);
    info!("  ⚡ Press Ctrl+C for graceful shutdown");
    info!("═══════════════════════════════════════════════════════");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match signal::ctrl_c().await {
                Ok(()) => warn!("🛑 Shutdown signal received!"),
                Err(err) => error!("❌ Signal listener error: {}", err),
            }
        })
        .await
        .context("HTTP server failed")?;

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(10), janitor).await.is_err() {
        warn!("Task janitor did not stop in time");
    }

    info!("💤 TRIBUNAL RADAR: OFFLINE");
    Ok(())
}
