//! Idle strategies for the retry loops callers build around the ring.
//!
//! `try_write` and `read` never block. A producer facing a full ring, or a
//! consumer facing an empty one, decides how to wait by picking one of these.

use std::time::Duration;

pub trait IdleStrategy {
    /// Idle only if the last duty cycle did no work, otherwise reset.
    #[inline]
    fn idle_work(&mut self, work_count: usize) {
        if work_count > 0 {
            self.reset();
        } else {
            self.idle();
        }
    }

    fn idle(&mut self);

    fn reset(&mut self) {}
}

/// Never waits. Lowest latency, burns a full core.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpIdleStrategy;

impl IdleStrategy for NoOpIdleStrategy {
    #[inline]
    fn idle(&mut self) {}
}

/// Emits a spin-loop hint on every idle cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusySpinIdleStrategy;

impl IdleStrategy for BusySpinIdleStrategy {
    #[inline]
    fn idle(&mut self) {
        std::hint::spin_loop();
    }
}

/// Gives the rest of the time slice back to the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldingIdleStrategy;

impl IdleStrategy for YieldingIdleStrategy {
    #[inline]
    fn idle(&mut self) {
        std::thread::yield_now();
    }
}

/// Configuration for [`BackoffIdleStrategy`]
///
/// Default values favour latency:
/// - 10 spins, then 5 yields
/// - then parking from 1µs, doubling each cycle
/// - parking capped at 1ms
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub max_spins: u64,
    pub max_yields: u64,
    /// First park period (doubles each cycle)
    pub min_park: Duration,
    /// Maximum park period (backoff won't exceed this)
    pub max_park: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_spins: 10,
            max_yields: 5,
            min_park: Duration::from_micros(1),
            max_park: Duration::from_millis(1),
        }
    }
}

impl BackoffConfig {
    /// Park period for the given cycle using exponential backoff
    pub(crate) fn park_for_attempt(&self, attempt: u32) -> Duration {
        self.min_park
            .saturating_mul(2u32.checked_pow(attempt).unwrap_or(u32::MAX))
            .min(self.max_park)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackoffState {
    Spinning(u64),
    Yielding(u64),
    Parking(u32),
}

/// Spin, then yield, then park with exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffIdleStrategy {
    config: BackoffConfig,
    state: BackoffState,
}

impl BackoffIdleStrategy {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            state: BackoffState::Spinning(0),
        }
    }
}

impl Default for BackoffIdleStrategy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl IdleStrategy for BackoffIdleStrategy {
    fn idle(&mut self) {
        self.state = match self.state {
            BackoffState::Spinning(spins) if spins < self.config.max_spins => {
                std::hint::spin_loop();
                BackoffState::Spinning(spins + 1)
            }
            BackoffState::Spinning(_) => BackoffState::Yielding(0),
            BackoffState::Yielding(yields) if yields < self.config.max_yields => {
                std::thread::yield_now();
                BackoffState::Yielding(yields + 1)
            }
            BackoffState::Yielding(_) => BackoffState::Parking(0),
            BackoffState::Parking(attempt) => {
                std::thread::sleep(self.config.park_for_attempt(attempt));
                BackoffState::Parking(attempt.saturating_add(1))
            }
        };
    }

    fn reset(&mut self) {
        self.state = BackoffState::Spinning(0);
    }
}
