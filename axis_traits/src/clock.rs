use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source for wait loops, pulse holds and settle delays.
///
/// The harness never calls `Instant::now()` or `thread::sleep` directly so a
/// test can substitute a clock whose `sleep` advances virtual time.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time elapsed since `epoch`, zero if `epoch` lies in the future.
    fn elapsed_since(&self, epoch: Instant) -> Duration {
        self.now().saturating_duration_since(epoch)
    }
}

/// Wall-clock implementation backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Virtual clock: `now() = origin + offset`, and `sleep(d)` advances the
    /// offset by `d` without blocking. Clones share the same offset.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Total virtual time that has passed since construction.
        pub fn offset(&self) -> Duration {
            self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.offset()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sleep_advances_virtual_time_for_all_clones() {
            let clock = TestClock::new();
            let other = clock.clone();
            let epoch = clock.now();
            other.sleep(Duration::from_millis(150));
            assert_eq!(clock.elapsed_since(epoch), Duration::from_millis(150));
            assert_eq!(clock.offset(), Duration::from_millis(150));
        }

        #[test]
        fn elapsed_saturates_for_future_epoch() {
            let clock = TestClock::new();
            let future = clock.now() + Duration::from_secs(1);
            assert_eq!(clock.elapsed_since(future), Duration::ZERO);
        }
    }
}
