use std::hint;
use std::thread;
use std::time::Duration;

use crate::config::WaitStrategy;

/// Adaptive wait strategy: spin with PAUSE hints, then yield to the OS,
/// then park for short intervals. Mirrors the progression in spec.md
/// §4.2 ("short busy-spin; then yield; optional park on a condition
/// variable after a threshold"). Which phases `snooze` actually visits
/// is governed by the bus's configured [`WaitStrategy`]: `Hybrid` walks
/// the full progression below, while `BusySpin`/`Yield`/`Park` each pin
/// `snooze` to a single phase.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
    strategy: WaitStrategy,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;
    const PARK_DURATION: Duration = Duration::from_micros(50);

    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::for_strategy(WaitStrategy::Hybrid)
    }

    /// Builds a backoff that follows the given `strategy` exclusively
    /// rather than the default spin-then-yield-then-park escalation.
    #[inline]
    #[must_use]
    pub fn for_strategy(strategy: WaitStrategy) -> Self {
        Self { step: 0, strategy }
    }

    /// Light spin with PAUSE hints. Never waits beyond a few dozen cycles.
    #[inline]
    pub fn spin(&mut self) {
        let spins = 1u32 << self.step.min(Self::SPIN_LIMIT);
        for _ in 0..spins {
            hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }

    /// Waits one step according to the configured [`WaitStrategy`].
    /// Always returns so callers can re-check a shutdown flag between
    /// iterations (spec.md §5 cancellation).
    #[inline]
    pub fn snooze(&mut self) {
        match self.strategy {
            WaitStrategy::BusySpin => self.spin(),
            WaitStrategy::Yield => {
                thread::yield_now();
                self.step += 1;
            }
            WaitStrategy::Park => thread::park_timeout(Self::PARK_DURATION),
            WaitStrategy::Hybrid => {
                if self.step <= Self::SPIN_LIMIT {
                    self.spin();
                } else if self.step <= Self::YIELD_LIMIT {
                    thread::yield_now();
                    self.step += 1;
                } else {
                    thread::park_timeout(Self::PARK_DURATION);
                }
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn is_parking(&self) -> bool {
        match self.strategy {
            WaitStrategy::Park => true,
            WaitStrategy::BusySpin | WaitStrategy::Yield => false,
            WaitStrategy::Hybrid => self.step > Self::YIELD_LIMIT,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
