// ═══════════════════════════════════════════════════════════════
// METRICS - how many reports did we actually get through today?
// ═══════════════════════════════════════════════════════════════
//
// Plain atomic counters, bumped from the orchestrator and the API,
// read all at once into a snapshot for GET /metrics.

use portable_atomic::{AtomicU64, Ordering};
use serde::Serialize;
use std::time::Instant;

use crate::circuit_breaker::CircuitBreakerSnapshot;

#[derive(Debug, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_rejected: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_in_store: usize,
    pub reports_scraped: u64,
    pub reports_failed: u64,
    pub reports_empty: u64,
    pub cache_hits: u64,
    pub scrape_attempts: u64,
    pub distribution_lookups: u64,
    pub reports_per_hour: f64,
    pub uptime_seconds: u64,
    pub digesto_circuit: Option<CircuitBreakerSnapshot>,
}

pub struct MetricsCollector {
    tasks_submitted: AtomicU64,
    tasks_rejected: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    reports_scraped: AtomicU64,
    reports_failed: AtomicU64,
    reports_empty: AtomicU64,
    cache_hits: AtomicU64,
    scrape_attempts: AtomicU64,
    distribution_lookups: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            reports_scraped: AtomicU64::new(0),
            reports_failed: AtomicU64::new(0),
            reports_empty: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            scrape_attempts: AtomicU64::new(0),
            distribution_lookups: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_tasks_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reports_scraped(&self) {
        self.reports_scraped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reports_failed(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reports_empty(&self) {
        self.reports_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scrape_attempts(&self) {
        self.scrape_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_distribution_lookups(&self) {
        self.distribution_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, tasks_in_store: usize, digesto_circuit: Option<CircuitBreakerSnapshot>) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        let scraped = self.reports_scraped.load(Ordering::Relaxed);
        let reports_per_hour = if uptime > 0 {
            scraped as f64 / uptime as f64 * 3600.0
        } else {
            0.0
        };

        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_in_store,
            reports_scraped: scraped,
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            reports_empty: self.reports_empty.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            scrape_attempts: self.scrape_attempts.load(Ordering::Relaxed),
            distribution_lookups: self.distribution_lookups.load(Ordering::Relaxed),
            reports_per_hour,
            uptime_seconds: uptime,
            digesto_circuit,
        }
    }
}
