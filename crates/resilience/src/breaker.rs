//! Circuit breaker state machine.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ResilienceError;

/// The state of a circuit breaker.
///
/// State transitions:
/// ```text
/// Closed ──(failures ≥ threshold)──► Open
/// Open ──(reset timeout elapsed, probe call)──► HalfOpen
/// HalfOpen ──(enough successes)──► Closed
/// HalfOpen ──(any failure)──► Open
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    /// Normal operation; failures are counted.
    #[default]
    Closed,

    /// All calls are rejected until the reset timeout elapses.
    Open,

    /// A limited number of trial calls are let through to test recovery.
    HalfOpen,
}

impl CircuitState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tuning parameters for one breaker.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in the closed state that trip the breaker.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before allowing a probe.
    pub reset_timeout: Duration,
    /// Trial calls allowed while half-open; that many successes close
    /// the breaker again.
    pub half_open_requests: u32,
}

impl CircuitBreakerConfig {
    /// Preset for the payment provider.
    pub fn payment() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(60),
            half_open_requests: 2,
        }
    }

    /// Preset for generic external services.
    pub fn external_service() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_requests: 3,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::external_service()
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    half_open_attempts: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
}

/// Failure-isolation gate for calls to a single logical dependency.
///
/// One breaker instance guards one dependency class and is a long-lived
/// singleton shared by every call site; it is not tied to any saga
/// execution. All state transitions happen atomically under one mutex
/// so two racing calls cannot both decide to trip or reset.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a breaker for the named dependency.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Returns the dependency name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state.
    pub fn state(&self) -> CircuitState {
        self.state.lock().unwrap().state
    }

    /// Returns the current failure count.
    pub fn failures(&self) -> u32 {
        self.state.lock().unwrap().failures
    }

    /// Returns when the guarded dependency last failed.
    pub fn last_failure(&self) -> Option<Instant> {
        self.state.lock().unwrap().last_failure
    }

    /// Runs `operation` if the breaker admits the call, recording the
    /// outcome against the breaker state.
    ///
    /// While open, calls are rejected with [`ResilienceError::CircuitOpen`]
    /// without invoking the operation; once the reset timeout has
    /// elapsed the next call is let through as the half-open probe.
    pub async fn call<T, E, Fut>(&self, operation: Fut) -> Result<T, ResilienceError<E>>
    where
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        self.try_acquire()?;
        let result = operation.await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    /// Manually trips the breaker; a probe is allowed again after the
    /// reset timeout, as with a natural trip.
    pub fn force_open(&self) {
        let mut s = self.state.lock().unwrap();
        self.trip(&mut s);
        tracing::warn!(circuit = %self.name, "circuit forced open");
    }

    /// Manually resets the breaker to closed with zeroed counters.
    pub fn force_close(&self) {
        let mut s = self.state.lock().unwrap();
        *s = BreakerState::default();
        tracing::info!(circuit = %self.name, "circuit forced closed");
    }

    fn try_acquire<E>(&self) -> Result<(), ResilienceError<E>> {
        let mut s = self.state.lock().unwrap();
        match s.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => match s.next_attempt {
                Some(at) if Instant::now() >= at => {
                    s.state = CircuitState::HalfOpen;
                    s.successes = 0;
                    // This call is the first probe.
                    s.half_open_attempts = 1;
                    tracing::info!(circuit = %self.name, "circuit half-open, probing");
                    Ok(())
                }
                _ => Err(self.rejected()),
            },
            CircuitState::HalfOpen => {
                if s.half_open_attempts < self.config.half_open_requests {
                    s.half_open_attempts += 1;
                    Ok(())
                } else {
                    Err(self.rejected())
                }
            }
        }
    }

    fn record_success(&self) {
        let mut s = self.state.lock().unwrap();
        match s.state {
            CircuitState::Closed => {
                s.failures = 0;
            }
            CircuitState::HalfOpen => {
                s.successes += 1;
                if s.successes >= self.config.half_open_requests {
                    *s = BreakerState::default();
                    tracing::info!(circuit = %self.name, "circuit closed after recovery");
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut s = self.state.lock().unwrap();
        s.last_failure = Some(Instant::now());
        match s.state {
            CircuitState::Closed => {
                s.failures += 1;
                if s.failures >= self.config.failure_threshold {
                    self.trip(&mut s);
                }
            }
            CircuitState::HalfOpen => self.trip(&mut s),
            CircuitState::Open => {}
        }
    }

    fn trip(&self, s: &mut BreakerState) {
        s.state = CircuitState::Open;
        s.next_attempt = Some(Instant::now() + self.config.reset_timeout);
        s.successes = 0;
        s.half_open_attempts = 0;
        metrics::counter!("circuit_breaker_opened_total", "circuit" => self.name.clone())
            .increment(1);
        tracing::warn!(circuit = %self.name, failures = s.failures, "circuit opened");
    }

    fn rejected<E>(&self) -> ResilienceError<E> {
        metrics::counter!("circuit_breaker_rejections_total", "circuit" => self.name.clone())
            .increment(1);
        ResilienceError::CircuitOpen {
            name: self.name.clone(),
        }
    }
}
