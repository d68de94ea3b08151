// =============================================================================
// orchestrator.rs — FROM A PASTED LIST OF IDS TO A TABLE OF COURTS
// =============================================================================
//
// submit() is synchronous and cheap: pull the report ids out of whatever
// the user pasted, check we have a token, register a PENDING task, spawn
// the pipeline and hand back the task id. Everything slow happens in the
// background while the UI polls status().
//
// The pipeline, per task:
//
//   PENDING ──► RUNNING ──► COMPLETED   (every report handled, even badly)
//                  │
//                  └──────► ERROR       (the pipeline itself blew up,
//                                        e.g. Chrome wouldn't start)
//
// Each report is tried on its own: cache first, then the browser with
// retries. A report that fails ends up as a line in `errors` and the task
// carries on. Only something outside that per-report boundary sends the
// task to ERROR.
// =============================================================================

use anyhow::Context;
use chrono::Utc;
use parking_lot::Mutex;
use regex::Regex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserEngine, BrowserError, BrowserLauncher};
use crate::cache::ReportCache;
use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::models::{ReportStats, TaskState, TaskStatus};
use crate::retry::{with_retry, RetryPolicy};
use crate::scheduler::run_limited;
use crate::scraper::scrape_report;
use crate::stats::compute_stats;
use crate::task_store::{TaskId, TaskStore};

pub const TASK_NOT_FOUND: &str = "Tarefa não encontrada.";

/// Report ids are standalone runs of four or more digits. Word boundaries
/// are ASCII-only, so an accented letter right before an id doesn't hide it.
static REPORT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)[0-9]{4,}(?-u:\b)").expect("report id regex is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Nenhum ID válido encontrado.")]
    NoReportIds,

    #[error("Token de autenticação não configurado.")]
    MissingToken,
}

/// Report ids in `text`, deduplicated, in order of first appearance.
pub fn parse_report_ids(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for found in REPORT_ID.find_iter(text) {
        if !ids.iter().any(|id| id == found.as_str()) {
            ids.push(found.as_str().to_string());
        }
    }
    ids
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<TaskStore>,
    cache: ReportCache,
    config: Arc<Config>,
    launcher: Arc<dyn BrowserLauncher>,
    metrics: Arc<MetricsCollector>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<TaskStore>,
        config: Arc<Config>,
        launcher: Arc<dyn BrowserLauncher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            cache: ReportCache::new(config.cache_dir.clone(), config.cache_ttl),
            config,
            launcher,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Register a task for the report ids in `raw_text` and start it.
    pub fn submit(&self, raw_text: &str) -> Result<TaskId, SubmitError> {
        let report_ids = parse_report_ids(raw_text);
        if report_ids.is_empty() {
            self.metrics.increment_tasks_rejected();
            return Err(SubmitError::NoReportIds);
        }
        let Some(token) = self.config.digesto_api_token.clone() else {
            self.metrics.increment_tasks_rejected();
            return Err(SubmitError::MissingToken);
        };

        let task_id = self.store.create();
        self.metrics.increment_tasks_submitted();
        info!(task_id = %task_id, reports = report_ids.len(), "Task submitted");

        tokio::spawn(self.clone().run(task_id, report_ids, token));
        Ok(task_id)
    }

    pub fn status(&self, task_id: &TaskId) -> Option<TaskState> {
        self.store.get(task_id)
    }

    async fn run(self, task_id: TaskId, report_ids: Vec<String>, token: String) {
        self.store.update(&task_id, |state| {
            state.status = TaskStatus::Running;
            state.message = "Iniciando navegador...".to_string();
        });

        let total = report_ids.len();
        match self.process(task_id, report_ids, &token).await {
            Ok((results, stats)) => {
                let elapsed_secs = self
                    .store
                    .created_at(&task_id)
                    .map(|created| (Utc::now() - created).num_seconds())
                    .unwrap_or_default();
                info!(
                    task_id = %task_id,
                    processed = results.len(),
                    total = total,
                    elapsed_secs = elapsed_secs,
                    "Task completed"
                );
                self.metrics.increment_tasks_completed();
                self.store.update(&task_id, |state| {
                    state.message = format!("Concluído! {}/{} relatórios processados.", results.len(), total);
                    state.result = Some(results);
                    state.stats = Some(stats);
                    state.status = TaskStatus::Completed;
                });
            }
            Err(e) => {
                let reason = format!("{e:#}");
                error!(task_id = %task_id, error = %reason, "Task failed");
                self.metrics.increment_tasks_failed();
                self.store.update(&task_id, |state| {
                    state.status = TaskStatus::Error;
                    state.message = format!("Erro fatal: {reason}");
                });
            }
        }
    }

    async fn process(
        &self,
        task_id: TaskId,
        report_ids: Vec<String>,
        token: &str,
    ) -> anyhow::Result<(Vec<PathBuf>, Vec<ReportStats>)> {
        tokio::fs::create_dir_all(self.cache.dir())
            .await
            .with_context(|| format!("não foi possível criar {}", self.cache.dir().display()))?;

        let engine = self.launcher.launch().await?;
        let results = self.process_reports(task_id, report_ids, token, engine.clone()).await;
        if let Err(e) = engine.shutdown().await {
            warn!(task_id = %task_id, error = %e, "Browser did not shut down cleanly");
        }

        let stats = self.collect_stats(&results).await;
        Ok((results, stats))
    }

    /// Every report, at most `parallel_limit` at a time. Returns the cache
    /// files of the reports that produced data, in completion order.
    async fn process_reports(
        &self,
        task_id: TaskId,
        report_ids: Vec<String>,
        token: &str,
        engine: Arc<dyn BrowserEngine>,
    ) -> Vec<PathBuf> {
        let total = report_ids.len();
        let started = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::new()));
        let token: Arc<str> = Arc::from(token);

        run_limited(report_ids, self.config.parallel_limit, |report_id| {
            let this = self.clone();
            let (started, results, engine, token) =
                (started.clone(), results.clone(), engine.clone(), token.clone());
            async move {
                let n = started.fetch_add(1, Ordering::Relaxed) + 1;
                this.store.update(&task_id, |state| {
                    state.message = format!("Processando {n}/{total}: ID {report_id}");
                });

                match this.process_report(engine, &token, &report_id).await {
                    Ok(path) => {
                        results.lock().push(path.clone());
                        this.store.update(&task_id, |state| {
                            state.result.get_or_insert_with(Vec::new).push(path);
                        });
                    }
                    Err(message) => {
                        warn!(task_id = %task_id, report_id = %report_id, error = %message, "Report failed");
                        this.store.update(&task_id, |state| state.errors.push(message));
                    }
                }
            }
        })
        .await;

        let collected = std::mem::take(&mut *results.lock());
        collected
    }

    /// One report: fresh cache file, or the browser with retries.
    /// The error is the line that ends up in the task's `errors`.
    async fn process_report(
        &self,
        engine: Arc<dyn BrowserEngine>,
        token: &str,
        report_id: &str,
    ) -> Result<PathBuf, String> {
        if self.cache.is_valid(report_id).await {
            debug!(report_id = report_id, "Cache hit");
            self.metrics.increment_cache_hits();
            return Ok(self.cache.path_for(report_id));
        }

        let policy = RetryPolicy::new(self.config.max_retries, self.config.retry_delay);
        let label = format!("report {report_id}");

        let outcome = with_retry(policy, &label, |attempt| {
            let (engine, config, metrics) = (engine.clone(), self.config.clone(), self.metrics.clone());
            let (token, report_id) = (token.to_string(), report_id.to_string());
            async move {
                metrics.increment_scrape_attempts();
                debug!(report_id = %report_id, attempt = attempt, "Scraping report");
                let data = scrape_report(engine.as_ref(), &config, &token, &report_id).await?;
                Ok::<_, BrowserError>((!data.is_empty()).then_some(data))
            }
        })
        .await;

        match outcome {
            Ok(Some(data)) => match self.cache.write(report_id, &data).await {
                Ok(path) => {
                    self.metrics.increment_reports_scraped();
                    Ok(path)
                }
                Err(e) => {
                    self.metrics.increment_reports_failed();
                    Err(format!("ID {report_id}: {e}"))
                }
            },
            Ok(None) => {
                self.metrics.increment_reports_empty();
                Err(format!("ID {report_id}: Sem dados"))
            }
            Err(e) => {
                self.metrics.increment_reports_failed();
                Err(format!("ID {report_id}: {e}"))
            }
        }
    }

    /// Stats straight from the cache files, so cache hits and fresh scrapes
    /// are summarized the same way.
    async fn collect_stats(&self, results: &[PathBuf]) -> Vec<ReportStats> {
        let mut stats = Vec::with_capacity(results.len());
        for path in results {
            let Some(report_id) = ReportCache::report_id_from_path(path) else {
                continue;
            };
            match ReportCache::read_path(path).await {
                Ok(data) => stats.push(compute_stats(&report_id, &self.config.report_url(&report_id), &data)),
                Err(e) => warn!(report_id = %report_id, error = %e, "Skipping unreadable cache file"),
            }
        }
        stats
    }
}
