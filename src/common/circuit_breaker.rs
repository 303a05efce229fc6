//! Circuit breaker for exchange requests
//!
//! States:
//! - Closed: requests flow, consecutive failures are counted
//! - Open: requests are rejected until the cooldown elapses
//! - HalfOpen: probing; enough successes close the circuit, any failure re-opens it

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
    /// Consecutive HalfOpen successes needed to close again
    pub success_threshold: u32,
    /// Time spent Open before probing
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            failures: 0,
            successes: 0,
            opened_at: None,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Whether a request may be sent now. Moves Open -> HalfOpen once the cooldown has passed.
    pub fn allow_request(&mut self) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let cooled = self
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if cooled {
                    tracing::info!("Circuit breaker half-open, probing exchange");
                    self.state = BreakerState::HalfOpen;
                    self.successes = 0;
                }
                cooled
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            BreakerState::HalfOpen => {
                self.successes += 1;
                if self.successes >= self.config.success_threshold {
                    tracing::info!("Circuit breaker closed");
                    self.reset();
                }
            }
            _ => self.failures = 0,
        }
    }

    pub fn record_failure(&mut self) {
        match self.state {
            BreakerState::HalfOpen => self.trip(),
            BreakerState::Closed => {
                self.failures += 1;
                if self.failures >= self.config.failure_threshold {
                    self.trip();
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn reset(&mut self) {
        self.state = BreakerState::Closed;
        self.failures = 0;
        self.successes = 0;
        self.opened_at = None;
    }

    fn trip(&mut self) {
        tracing::warn!(
            failures = self.failures,
            cooldown_secs = self.config.cooldown.as_secs(),
            "Circuit breaker opened"
        );
        self.state = BreakerState::Open;
        self.opened_at = Some(Instant::now());
        self.successes = 0;
    }
}
