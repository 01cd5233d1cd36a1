use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::ChargebackError;

/// Consecutive failed uploads before deliveries pause
const FAILURE_THRESHOLD: u32 = 3;

/// Pause length; the first upload after it is a probe
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Stops calling a sink that keeps failing
#[derive(Debug, Default)]
pub(crate) struct CircuitBreaker {
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether a delivery may be attempted
    pub(crate) fn check(&self) -> Result<(), ChargebackError> {
        self.check_at(Instant::now())
    }

    fn check_at(&self, now: Instant) -> Result<(), ChargebackError> {
        match self.lock().open_until {
            Some(until) if now < until => Err(ChargebackError::CircuitOpen),
            _ => Ok(()),
        }
    }

    pub(crate) fn record_success(&self) {
        let mut state = self.lock();
        if state.open_until.take().is_some() {
            tracing::info!("chargeback sink recovered, resuming deliveries");
        }
        state.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    fn record_failure_at(&self, now: Instant) {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.consecutive_failures >= FAILURE_THRESHOLD {
            if state.open_until.is_none() {
                tracing::warn!(
                    failures = state.consecutive_failures,
                    pause_secs = RECOVERY_TIMEOUT.as_secs(),
                    "chargeback sink failing, pausing deliveries"
                );
            }
            state.open_until = Some(now + RECOVERY_TIMEOUT);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
