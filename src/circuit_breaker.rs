// =============================================================================
// circuit_breaker.rs — DON'T KICK THE API WHILE IT'S DOWN
// =============================================================================
//
// The Digesto REST API has bad afternoons. When it starts failing, every
// distribution lookup a paralegal fires off just adds to the pile, and
// each one waits out a full HTTP timeout before telling them so.
//
// So the client goes through a breaker:
//
//   CLOSED     requests flow; consecutive failures are counted
//   OPEN       after `failure_threshold` failures in a row, requests are
//              refused on the spot until `reset_timeout` has passed
//   HALF_OPEN  the next request is let through as a probe; enough probe
//              successes close the breaker, one failure reopens it
// =============================================================================

use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
    changed_at: Instant,
    trips: u64,
}

pub struct CircuitBreaker {
    name: String,
    inner: RwLock<BreakerState>,
    failure_threshold: u32,
    reset_timeout: Duration,
    success_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration, success_threshold: u32) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                opened_at: None,
                changed_at: Instant::now(),
                trips: 0,
            }),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            success_threshold: success_threshold.max(1),
        }
    }

    /// Whether a request may go out now. Moves OPEN to HALF_OPEN once the
    /// reset timeout has passed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map_or(true, |opened| opened.elapsed() >= self.reset_timeout);
                if cooled_down {
                    info!(breaker = %self.name, "Circuit half-open, sending a probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_successes = 0;
                    inner.changed_at = Instant::now();
                }
                cooled_down
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.success_threshold {
                    info!(breaker = %self.name, "Circuit closed, API is answering again");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.probe_successes = 0;
                    inner.opened_at = None;
                    inner.changed_at = Instant::now();
                }
            }
            // A request that started before the trip came back fine.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "Circuit open, holding requests for {:?}",
                        self.reset_timeout
                    );
                    Self::trip(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "Probe failed, circuit open again");
                Self::trip(&mut inner);
            }
            CircuitState::Open => inner.opened_at = Some(Instant::now()),
        }
    }

    fn trip(inner: &mut BreakerState) {
        let now = Instant::now();
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.changed_at = now;
        inner.probe_successes = 0;
        inner.trips += 1;
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.read();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            trips: inner.trips,
            secs_in_state: inner.changed_at.elapsed().as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub trips: u64,
    pub secs_in_state: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digesto_breaker() -> CircuitBreaker {
        CircuitBreaker::new("digesto", 5, Duration::from_secs(60), 2)
    }

    #[test]
    fn test_flaky_api_below_threshold_stays_closed() {
        let cb = digesto_breaker();
        // Four 502s, a 404 (the API is up, the company isn't), four more 502s.
        for _ in 0..4 {
            cb.record_failure();
        }
        cb.record_success();
        for _ in 0..4 {
            assert!(cb.allow_request());
            cb.record_failure();
        }

        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.consecutive_failures, 4);
        assert_eq!(snap.trips, 0);
    }

    #[test]
    fn test_outage_holds_requests_and_ignores_late_answers() {
        let cb = digesto_breaker();
        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());

        // Requests that left before the trip come back while OPEN.
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());

        let snap = cb.snapshot();
        assert_eq!(snap.name, "digesto");
        assert_eq!(snap.trips, 1);
        assert_eq!(serde_json::to_value(&snap).unwrap()["state"], "OPEN");
    }

    #[test]
    fn test_half_open_probe_closes_or_reopens() {
        let cb = CircuitBreaker::new("digesto", 1, Duration::ZERO, 2);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.snapshot().trips, 2);

        assert!(cb.allow_request());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
