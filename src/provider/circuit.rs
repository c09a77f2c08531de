//! Consecutive-failure circuit breaker
//!
//! One breaker is meant to be shared by every analysis call in a process
//! (wrap it in an `Arc`), so an unhealthy provider degrades the whole process
//! rather than each request discovering it separately. It is passed in
//! explicitly, never held as global state.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Permission to make a provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPermit {
    /// Breaker closed, call normally.
    Closed,
    /// Breaker open but cooled down; this single call decides whether it closes.
    Probe,
}

#[derive(Debug, Clone, Default)]
struct CircuitState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_started: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Option<Duration>,
    state: Mutex<CircuitState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, Some(DEFAULT_COOLDOWN))
    }
}

impl CircuitBreaker {
    /// `cooldown: None` keeps an open breaker open until a success or `reset`.
    pub fn new(threshold: u32, cooldown: Option<Duration>) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(CircuitState::default()),
        }
    }

    pub fn shared(threshold: u32, cooldown: Option<Duration>) -> Arc<Self> {
        Arc::new(Self::new(threshold, cooldown))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CircuitState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn is_open(&self) -> bool {
        self.lock().consecutive_failures >= self.threshold
    }

    /// Ask to make a call. `Err` carries the failure count when short-circuited.
    pub fn try_acquire(&self) -> Result<CircuitPermit, u32> {
        self.try_acquire_at(Instant::now())
    }

    pub(crate) fn try_acquire_at(&self, now: Instant) -> Result<CircuitPermit, u32> {
        let mut state = self.lock();
        if state.consecutive_failures < self.threshold {
            return Ok(CircuitPermit::Closed);
        }
        let Some(cooldown) = self.cooldown else {
            return Err(state.consecutive_failures);
        };
        let cooled = state
            .opened_at
            .is_none_or(|opened| now.saturating_duration_since(opened) >= cooldown);
        // A probe that never reported back (cancelled call) expires after one cooldown.
        let probe_free = state
            .probe_started
            .is_none_or(|started| now.saturating_duration_since(started) >= cooldown);
        if cooled && probe_free {
            state.probe_started = Some(now);
            Ok(CircuitPermit::Probe)
        } else {
            Err(state.consecutive_failures)
        }
    }

    pub fn record_success(&self) {
        *self.lock() = CircuitState::default();
    }

    /// Count one terminal failure; returns the new consecutive count.
    pub fn record_failure(&self) -> u32 {
        self.record_failure_at(Instant::now())
    }

    pub(crate) fn record_failure_at(&self, now: Instant) -> u32 {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.probe_started = None;
        if state.consecutive_failures >= self.threshold {
            state.opened_at = Some(now);
        }
        state.consecutive_failures
    }

    pub fn reset(&self) {
        self.record_success();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, None);
        assert_eq!(breaker.try_acquire(), Ok(CircuitPermit::Closed));
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        assert_eq!(breaker.record_failure(), 3);
        assert!(breaker.is_open());
        assert_eq!(breaker.try_acquire(), Err(3));
    }

    #[test]
    fn success_resets_the_counter() {
        let breaker = CircuitBreaker::new(3, None);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn cooldown_allows_a_single_probe() {
        let cooldown = Duration::from_secs(30);
        let breaker = CircuitBreaker::new(2, Some(cooldown));
        let start = Instant::now();
        breaker.record_failure_at(start);
        breaker.record_failure_at(start);

        assert_eq!(breaker.try_acquire_at(start + Duration::from_secs(5)), Err(2));
        let later = start + cooldown;
        assert_eq!(breaker.try_acquire_at(later), Ok(CircuitPermit::Probe));
        // second caller while the probe is in flight is still rejected
        assert_eq!(breaker.try_acquire_at(later + Duration::from_secs(1)), Err(2));
    }

    #[test]
    fn failed_probe_reopens_for_another_cooldown() {
        let cooldown = Duration::from_secs(10);
        let breaker = CircuitBreaker::new(1, Some(cooldown));
        let start = Instant::now();
        breaker.record_failure_at(start);
        let probe_at = start + cooldown;
        assert_eq!(breaker.try_acquire_at(probe_at), Ok(CircuitPermit::Probe));
        breaker.record_failure_at(probe_at);
        assert_eq!(breaker.try_acquire_at(probe_at + Duration::from_secs(1)), Err(2));
        assert_eq!(
            breaker.try_acquire_at(probe_at + cooldown),
            Ok(CircuitPermit::Probe)
        );
    }

    #[test]
    fn shared_breaker_counts_across_threads() {
        let breaker = CircuitBreaker::shared(100, None);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        breaker.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(breaker.consecutive_failures(), 80);
    }
}
