//! Completion monitors: callback-driven waits on a single PV.
//!
//! A monitor is armed by subscribing to the PV, is satisfied from the
//! channel's notification thread, and is polled by the control thread until
//! satisfied or timed out. At most one monitor is armed per PV: arming
//! through the same `MonitorRegistry` detaches the previous one first, and a
//! detached monitor ignores any notification that still arrives.
//!
//! Lifecycle: `Armed -> Satisfied | TimedOut`, and `Detached` once the
//! subscription has been removed (on timeout, re-arm or drop).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axis_traits::{Channel, Clock, PvHandle, PvValue, SubscriptionToken};

use crate::channel_error::{ChannelOp, map_channel_error};
use crate::error::{HarnessError, Result};
use crate::util::millis;

/// Condition a monitor waits for.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Value equals the target; satisfied at arm time if already there.
    Level(PvValue),
    /// Not-set to set transition. The value read at arm time seeds the
    /// previous value, so a PV that is already set does not count.
    RisingEdge,
    /// Never satisfied; records every notification.
    Collect,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Level(v) => write!(f, "== {v}"),
            Predicate::RisingEdge => write!(f, "rising 0 -> 1"),
            Predicate::Collect => write!(f, "trace"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Armed,
    Satisfied,
    TimedOut,
    Detached,
}

/// Result of one wait; produced once per monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOutcome {
    /// PV name and predicate, e.g. `TST:M1:bDone_RBV rising 0 -> 1`.
    pub condition: String,
    pub satisfied: bool,
    pub elapsed: Duration,
    /// Last value seen, from a notification or the arm-time read.
    pub observed: Option<PvValue>,
    /// Every notification received while armed, in arrival order.
    pub series: Vec<PvValue>,
}

impl WaitOutcome {
    /// `Ok(self)` when satisfied, otherwise a `WaitTimeout`.
    pub fn into_result(self) -> Result<Self> {
        if self.satisfied {
            Ok(self)
        } else {
            Err(eyre::Report::new(HarnessError::WaitTimeout {
                condition: self.condition,
                elapsed_ms: millis(self.elapsed),
            }))
        }
    }

    /// Numeric samples of `series`, skipping non-numeric values.
    pub fn numeric_series(&self) -> Vec<f64> {
        self.series.iter().filter_map(PvValue::as_f64).collect()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Observed {
    prev: Option<PvValue>,
    last: Option<PvValue>,
    series: Vec<PvValue>,
}

/// State shared between the monitor and its subscription callback.
struct Shared {
    pv: String,
    predicate: Predicate,
    satisfied: AtomicBool,
    timed_out: AtomicBool,
    detached: AtomicBool,
    observed: Mutex<Observed>,
    token: Mutex<Option<SubscriptionToken>>,
}

impl Shared {
    fn on_value(&self, value: &PvValue) {
        if self.detached.load(Ordering::Acquire) {
            tracing::warn!(pv = %self.pv, %value, "late notification after detach ignored");
            return;
        }
        tracing::debug!(pv = %self.pv, %value, "notification");
        let mut obs = lock(&self.observed);
        let hit = match &self.predicate {
            Predicate::Level(target) => value.matches(target),
            Predicate::RisingEdge => {
                let was_set = obs.prev.as_ref().is_some_and(PvValue::is_truthy);
                !was_set && value.is_truthy()
            }
            Predicate::Collect => false,
        };
        obs.prev = Some(value.clone());
        obs.last = Some(value.clone());
        obs.series.push(value.clone());
        drop(obs);
        if hit {
            self.satisfied.store(true, Ordering::Release);
        }
    }

    fn detach(&self, channel: &dyn Channel) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(token) = lock(&self.token).take() {
            channel.unsubscribe(token);
        }
        tracing::trace!(pv = %self.pv, "monitor detached");
    }
}

/// Tracks the armed monitor of every PV of one axis.
#[derive(Default)]
pub struct MonitorRegistry {
    armed: Mutex<HashMap<PvHandle, Arc<Shared>>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of PVs that currently have an armed monitor.
    pub fn armed_count(&self) -> usize {
        lock(&self.armed)
            .values()
            .filter(|s| !s.detached.load(Ordering::Acquire))
            .count()
    }
}

/// One armed wait on one PV. Dropping it detaches the subscription.
pub struct CompletionMonitor {
    shared: Arc<Shared>,
    handle: PvHandle,
    channel: Arc<dyn Channel>,
    registry: Arc<MonitorRegistry>,
}

impl CompletionMonitor {
    /// Subscribe to `handle` and start evaluating `predicate`.
    ///
    /// Any monitor already armed on the same PV through `registry` is
    /// detached first.
    pub fn arm(
        channel: &Arc<dyn Channel>,
        registry: &Arc<MonitorRegistry>,
        handle: PvHandle,
        predicate: Predicate,
        read_timeout: Duration,
    ) -> Result<Self> {
        let pv = channel
            .name(handle)
            .unwrap_or_else(|| format!("<handle {}>", handle.0));

        if let Some(previous) = lock(&registry.armed).remove(&handle) {
            if !previous.detached.load(Ordering::Acquire) {
                tracing::warn!(pv = %pv, "re-arming: detaching previous monitor");
            }
            previous.detach(channel.as_ref());
        }

        let read = |channel: &Arc<dyn Channel>| {
            channel
                .get(handle, read_timeout)
                .map_err(|e| eyre::Report::new(map_channel_error(ChannelOp::Read, &pv, e.as_ref())))
        };

        // Edge detection needs the pre-arm value before any notification
        // is considered, including an initial-value callback.
        let seed = match predicate {
            Predicate::RisingEdge => Some(read(channel)?),
            _ => None,
        };

        let shared = Arc::new(Shared {
            pv: pv.clone(),
            predicate,
            satisfied: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            observed: Mutex::new(Observed {
                prev: seed.clone(),
                last: seed,
                series: Vec::new(),
            }),
            token: Mutex::new(None),
        });

        let cb_shared = Arc::clone(&shared);
        let token = channel
            .subscribe(
                handle,
                Box::new(move |_name: &str, value: &PvValue| cb_shared.on_value(value)),
            )
            .map_err(|e| eyre::Report::new(map_channel_error(ChannelOp::Subscribe, &pv, e.as_ref())))?;
        *lock(&shared.token) = Some(token);
        lock(&registry.armed).insert(handle, Arc::clone(&shared));

        let monitor = Self {
            shared,
            handle,
            channel: Arc::clone(channel),
            registry: Arc::clone(registry),
        };

        if let Predicate::Level(target) = &monitor.shared.predicate {
            let current = read(channel)?;
            let already = current.matches(target);
            lock(&monitor.shared.observed).last.get_or_insert(current);
            if already {
                monitor.shared.satisfied.store(true, Ordering::Release);
            }
        }
        tracing::debug!(pv = %pv, predicate = %monitor.shared.predicate, "monitor armed");
        Ok(monitor)
    }

    pub fn state(&self) -> MonitorState {
        if self.shared.satisfied.load(Ordering::Acquire) {
            MonitorState::Satisfied
        } else if self.shared.timed_out.load(Ordering::Acquire) {
            MonitorState::TimedOut
        } else if self.shared.detached.load(Ordering::Acquire) {
            MonitorState::Detached
        } else {
            MonitorState::Armed
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.shared.satisfied.load(Ordering::Acquire)
    }

    pub fn condition(&self) -> String {
        format!("{} {}", self.shared.pv, self.shared.predicate)
    }

    /// Poll every `poll` until satisfied or `timeout` has elapsed.
    /// The monitor is detached on return.
    pub fn wait(self, clock: &dyn Clock, timeout: Duration, poll: Duration) -> WaitOutcome {
        let start = clock.now();
        loop {
            if self.is_satisfied() {
                break;
            }
            let elapsed = clock.elapsed_since(start);
            if elapsed >= timeout || self.shared.detached.load(Ordering::Acquire) {
                self.shared.timed_out.store(true, Ordering::Release);
                tracing::warn!(
                    condition = %self.condition(),
                    elapsed_ms = millis(elapsed),
                    "wait timed out"
                );
                break;
            }
            tracing::trace!(condition = %self.condition(), "poll");
            clock.sleep(poll.min(timeout - elapsed));
        }
        let elapsed = clock.elapsed_since(start);
        self.finish_with(elapsed)
    }

    /// Detach now and return what was observed, without waiting.
    pub fn finish(self) -> WaitOutcome {
        self.finish_with(Duration::ZERO)
    }

    fn finish_with(self, elapsed: Duration) -> WaitOutcome {
        self.shared.detach(self.channel.as_ref());
        let condition = self.condition();
        let mut obs = lock(&self.shared.observed);
        WaitOutcome {
            condition,
            satisfied: self.shared.satisfied.load(Ordering::Acquire),
            elapsed,
            observed: obs.last.clone(),
            series: std::mem::take(&mut obs.series),
        }
    }
}

impl Drop for CompletionMonitor {
    fn drop(&mut self) {
        self.shared.detach(self.channel.as_ref());
        let mut armed = lock(&self.registry.armed);
        if armed
            .get(&self.handle)
            .is_some_and(|s| Arc::ptr_eq(s, &self.shared))
        {
            armed.remove(&self.handle);
        }
    }
}
