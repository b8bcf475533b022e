// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker for the classifier dependency.
//!
//! Three states: CLOSED (calls pass through), OPEN (calls fail fast for a
//! cooldown window), HALF_OPEN (exactly one trial call probes recovery).
//! Failures are counted over a rolling window; a failed trial re-opens
//! with a doubled cooldown, capped at a configured ceiling.

use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected without touching the network.
    Open,
    /// One trial request is probing recovery.
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures within the rolling window before the circuit opens.
    pub failure_threshold: u32,
    /// Rolling window for counting failures.
    pub failure_window: Duration,
    /// Initial open-state cooldown before a half-open trial.
    pub open_wait: Duration,
    /// Ceiling for the backed-off open cooldown.
    pub open_wait_max: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(120),
            open_wait: Duration::from_secs(30),
            open_wait_max: Duration::from_secs(300),
        }
    }
}

/// Single-dependency circuit breaker. Not internally synchronized; the
/// gateway holds it behind a mutex.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    failures: Vec<Instant>,
    opened_at: Option<Instant>,
    /// Current open cooldown; doubles on each failed trial.
    open_wait: Duration,
    /// A half-open trial call is in flight.
    trial_in_flight: bool,
    open_count: u32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        let open_wait = config.open_wait;
        Self {
            config,
            state: BreakerState::Closed,
            failures: Vec::new(),
            opened_at: None,
            open_wait,
            trial_in_flight: false,
            open_count: 0,
        }
    }

    /// Returns the current state (after lazily applying the open-timeout
    /// transition).
    pub fn state(&mut self) -> BreakerState {
        self.maybe_enter_half_open();
        self.state
    }

    /// Total times the circuit has opened.
    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    /// Asks permission to make a call.
    ///
    /// CLOSED always grants. OPEN grants only once the cooldown has elapsed,
    /// transitioning to HALF_OPEN with this caller holding the single trial
    /// slot. HALF_OPEN rejects while a trial is in flight.
    pub fn try_acquire(&mut self) -> bool {
        self.maybe_enter_half_open();
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                if self.trial_in_flight {
                    false
                } else {
                    self.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Records a successful call. A successful half-open trial closes the
    /// circuit and resets the backed-off cooldown.
    pub fn on_success(&mut self) {
        match self.state {
            BreakerState::HalfOpen => self.close(),
            BreakerState::Closed => {}
            // A success while Open can only come from a call that was
            // granted before the trip; the circuit stays open.
            BreakerState::Open => {}
        }
    }

    /// Records a failed call.
    pub fn on_failure(&mut self) {
        match self.state {
            BreakerState::HalfOpen => {
                // Failed trial: re-open with a backed-off wait.
                self.trial_in_flight = false;
                self.open_wait = (self.open_wait * 2).min(self.config.open_wait_max);
                self.open();
            }
            BreakerState::Closed => {
                let now = Instant::now();
                self.failures.push(now);
                let window = self.config.failure_window;
                self.failures.retain(|f| now.duration_since(*f) <= window);
                if self.failures.len() as u32 >= self.config.failure_threshold {
                    self.open();
                }
            }
            BreakerState::Open => {}
        }
    }

    fn maybe_enter_half_open(&mut self) {
        if self.state == BreakerState::Open
            && let Some(opened_at) = self.opened_at
            && opened_at.elapsed() >= self.open_wait
        {
            self.state = BreakerState::HalfOpen;
            self.trial_in_flight = false;
        }
    }

    fn open(&mut self) {
        self.state = BreakerState::Open;
        self.opened_at = Some(Instant::now());
        self.open_count += 1;
        self.failures.clear();
    }

    fn close(&mut self) {
        self.state = BreakerState::Closed;
        self.opened_at = None;
        self.trial_in_flight = false;
        self.failures.clear();
        self.open_wait = self.config.open_wait;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            failure_window: Duration::from_secs(60),
            open_wait: Duration::from_millis(20),
            open_wait_max: Duration::from_millis(80),
        }
    }

    #[test]
    fn stays_closed_below_threshold() {
        let mut breaker = CircuitBreaker::new(fast_config());
        breaker.on_failure();
        breaker.on_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire());
    }

    #[test]
    fn opens_at_threshold_and_rejects() {
        let mut breaker = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.try_acquire());
        assert_eq!(breaker.open_count(), 1);
    }

    #[test]
    fn half_open_grants_single_trial_after_cooldown() {
        let mut breaker = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            breaker.on_failure();
        }
        std::thread::sleep(Duration::from_millis(30));

        assert!(breaker.try_acquire(), "cooldown elapsed, trial allowed");
        assert_eq!(breaker.state, BreakerState::HalfOpen);
        assert!(!breaker.try_acquire(), "only one trial at a time");
    }

    #[test]
    fn successful_trial_closes_and_resets_backoff() {
        let mut breaker = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            breaker.on_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.try_acquire());
        breaker.on_success();

        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.open_wait, Duration::from_millis(20));
        assert!(breaker.try_acquire());
    }

    #[test]
    fn failed_trial_reopens_with_doubled_wait() {
        let mut breaker = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            breaker.on_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.try_acquire());
        breaker.on_failure();

        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.open_wait, Duration::from_millis(40));
        assert_eq!(breaker.open_count(), 2);

        // Old cooldown is no longer enough.
        std::thread::sleep(Duration::from_millis(25));
        assert!(!breaker.try_acquire());
        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.try_acquire());
    }

    #[test]
    fn backoff_caps_at_configured_max() {
        let mut breaker = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            breaker.on_failure();
        }
        for _ in 0..5 {
            std::thread::sleep(breaker.open_wait + Duration::from_millis(10));
            assert!(breaker.try_acquire());
            breaker.on_failure();
        }
        assert_eq!(breaker.open_wait, Duration::from_millis(80));
    }

    #[test]
    fn closed_success_is_noop() {
        let mut breaker = CircuitBreaker::new(fast_config());
        breaker.on_failure();
        breaker.on_success();
        // Successes do not erase the failure history inside the window.
        breaker.on_failure();
        breaker.on_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
