//! In-process simulated axis controller.
//!
//! `SimChannel` implements `Channel` over an in-memory PV table and models a
//! single axis: parameter latching on the move/home triggers, interpolated
//! motion on a scan thread, halt/reset, state selection and backlash
//! compensation. Value changes are queued and delivered to subscribers on a
//! separate notification thread, in FIFO order.
//!
//! Both worker threads are stopped and joined when the `SimChannel` is dropped.
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use axis_traits::{BoxError, Callback, Channel, PvHandle, PvValue, SubscriptionToken};
use crossbeam_channel as xch;

use crate::error::ChannelError;
use crate::util::wait_until_with_timeout;

/// Error id raised when a state outside `1..=state_count` is requested.
pub const UNKNOWN_STATE_ERROR_ID: i64 = 0x4460;
/// Error id raised when a move is triggered with a non-positive velocity.
pub const INVALID_VELOCITY_ERROR_ID: i64 = 0x4221;

/// Misbehaviors the simulated controller can be told to exhibit.
#[derive(Debug, Clone, PartialEq)]
pub enum SimFault {
    /// Move triggers are accepted but the axis never starts.
    NeverBusy,
    /// The axis starts moving but stalls halfway and never reports done.
    NeverDone,
    /// Reset does not clear the error flag.
    StickyError,
    /// Every completed move lands this far from its target.
    PositionOffset(f64),
    /// Writes to PVs whose name ends with the suffix are rejected.
    RejectWrites(String),
    /// PVs whose name ends with the suffix never connect.
    Disconnected(String),
}

impl FromStr for SimFault {
    type Err = ChannelError;

    /// Accepts `never-busy`, `never-done`, `sticky-error`,
    /// `position-offset:<f64>`, `reject:<suffix>` and `disconnect:<suffix>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, arg) = match s.split_once(':') {
            Some((k, a)) => (k, Some(a)),
            None => (s, None),
        };
        match (kind, arg) {
            ("never-busy", None) => Ok(SimFault::NeverBusy),
            ("never-done", None) => Ok(SimFault::NeverDone),
            ("sticky-error", None) => Ok(SimFault::StickyError),
            ("position-offset", Some(a)) => a
                .parse()
                .map(SimFault::PositionOffset)
                .map_err(|_| ChannelError::InvalidFault(s.to_string())),
            ("reject", Some(a)) if !a.is_empty() => Ok(SimFault::RejectWrites(a.to_string())),
            ("disconnect", Some(a)) if !a.is_empty() => Ok(SimFault::Disconnected(a.to_string())),
            _ => Err(ChannelError::InvalidFault(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Multiplier on travel time; 0.01 runs a 2 s move in 20 ms.
    pub time_scale: f64,
    /// Controller scan period.
    pub tick: Duration,
    /// Minimum time any motion stays busy, regardless of `time_scale`.
    pub min_busy: Duration,
    /// Delay applied before each notification is delivered.
    pub notify_latency: Duration,
    pub state_count: i64,
    /// Position of state `n` is `n * state_spacing`.
    pub state_spacing: f64,
    pub state_velocity: f64,
    pub initial_position: f64,
    pub fault: Option<SimFault>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            tick: Duration::from_millis(5),
            min_busy: Duration::from_millis(200),
            notify_latency: Duration::ZERO,
            state_count: 15,
            state_spacing: 10.0,
            state_velocity: 50.0,
            initial_position: 0.0,
            fault: None,
        }
    }
}

/// Full PV names the simulated controller serves.
#[derive(Debug, Clone)]
pub struct SimLayout {
    pub move_cmd: String,
    pub home_cmd: String,
    pub reset: String,
    pub halt: String,
    pub position: String,
    pub home_position: String,
    pub velocity: String,
    pub acceleration: String,
    pub deceleration: String,
    pub cmd_data: String,
    pub command: String,
    pub backlash_enable: String,
    pub backlash: String,
    pub act_position: String,
    pub done: String,
    pub busy: String,
    pub error: String,
    pub error_id: String,
    pub homed: String,
    pub error_message: String,
    pub backlash_status: String,
    pub current_backlash: String,
    pub state_set: String,
}

impl SimLayout {
    /// Layout using the stock suffixes under `prefix`.
    pub fn with_prefix(prefix: &str) -> Self {
        let pv = |suffix: &str| format!("{prefix}{suffix}");
        Self {
            move_cmd: pv("MoveCmd"),
            home_cmd: pv("HomeCmd"),
            reset: pv("bReset"),
            halt: pv("bHalt"),
            position: pv("fPosition"),
            home_position: pv("fHomePosition"),
            velocity: pv("fVelocity"),
            acceleration: pv("fAcceleration"),
            deceleration: pv("fDeceleration"),
            cmd_data: pv("nCmdData"),
            command: pv("nCommand"),
            backlash_enable: pv("bBacklashEnable"),
            backlash: pv("fBacklash"),
            act_position: pv("fActPosition_RBV"),
            done: pv("bDone_RBV"),
            busy: pv("bBusy_RBV"),
            error: pv("bError_RBV"),
            error_id: pv("nErrorId_RBV"),
            homed: pv("bHomed_RBV"),
            error_message: pv("sErrorMessage_RBV"),
            backlash_status: pv("bBacklashStatus_RBV"),
            current_backlash: pv("fCurrentBacklash_RBV"),
            state_set: pv("STATES:SET"),
        }
    }

    fn initial_values(&self, position: f64) -> Vec<(String, PvValue)> {
        let flag = |name: &String, v: bool| (name.clone(), PvValue::Bool(v));
        let float = |name: &String, v: f64| (name.clone(), PvValue::Float(v));
        let int = |name: &String, v: i64| (name.clone(), PvValue::Int(v));
        vec![
            flag(&self.move_cmd, false),
            flag(&self.home_cmd, false),
            flag(&self.reset, false),
            flag(&self.halt, false),
            float(&self.position, position),
            float(&self.home_position, 0.0),
            float(&self.velocity, 0.0),
            float(&self.acceleration, 0.0),
            float(&self.deceleration, 0.0),
            int(&self.cmd_data, 0),
            int(&self.command, 0),
            flag(&self.backlash_enable, false),
            float(&self.backlash, 0.0),
            float(&self.act_position, position),
            flag(&self.done, true),
            flag(&self.busy, false),
            flag(&self.error, false),
            int(&self.error_id, 0),
            flag(&self.homed, false),
            (self.error_message.clone(), PvValue::Str(String::new())),
            flag(&self.backlash_status, false),
            float(&self.current_backlash, 0.0),
            int(&self.state_set, 0),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MotionKind {
    Move,
    Home,
    State,
}

#[derive(Debug, Clone)]
struct Motion {
    kind: MotionKind,
    from: f64,
    to: f64,
    started: Instant,
    duration: Duration,
}

impl Motion {
    fn fraction(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    fn position_at(&self, fraction: f64) -> f64 {
        self.from + (self.to - self.from) * fraction
    }
}

struct Subscription {
    pv: String,
    callback: Arc<Callback>,
}

#[derive(Default)]
struct Registry {
    handles: Vec<String>,
    subs: HashMap<u64, Subscription>,
    next_token: u64,
}

struct Shared {
    layout: SimLayout,
    options: SimOptions,
    values: Mutex<HashMap<String, PvValue>>,
    registry: Mutex<Registry>,
    // Lock order: `motion` before `values`.
    motion: Mutex<Option<Motion>>,
    events: xch::Sender<(String, PvValue)>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn value(&self, name: &str) -> Option<PvValue> {
        lock(&self.values).get(name).cloned()
    }

    fn float(&self, name: &str) -> f64 {
        self.value(name).and_then(|v| v.as_f64()).unwrap_or(0.0)
    }

    fn flag(&self, name: &str) -> bool {
        self.value(name).is_some_and(|v| v.is_truthy())
    }

    /// Store `value` and queue a notification if it changed.
    fn set(&self, name: &str, value: PvValue) {
        let changed = {
            let mut values = lock(&self.values);
            match values.get(name) {
                Some(old) if *old == value => false,
                _ => {
                    values.insert(name.to_string(), value.clone());
                    true
                }
            }
        };
        if changed && self.events.send((name.to_string(), value)).is_err() {
            tracing::trace!(pv = name, "sim notification queue closed");
        }
    }

    fn fault(&self) -> Option<&SimFault> {
        self.options.fault.as_ref()
    }

    fn is_connected(&self, name: &str) -> bool {
        if matches!(self.fault(), Some(SimFault::Disconnected(suffix)) if name.ends_with(suffix.as_str())) {
            return false;
        }
        lock(&self.values).contains_key(name)
    }

    fn handle_name(&self, handle: PvHandle) -> Option<String> {
        let reg = lock(&self.registry);
        usize::try_from(handle.0)
            .ok()
            .and_then(|i| reg.handles.get(i).cloned())
    }

    fn on_put(&self, name: &str, value: &PvValue) {
        let l = &self.layout;
        if name == l.move_cmd {
            if value.is_truthy() {
                self.start_move();
                self.set(&l.move_cmd, PvValue::Bool(false));
            }
        } else if name == l.home_cmd {
            if value.is_truthy() {
                self.start_home();
                self.set(&l.home_cmd, PvValue::Bool(false));
            }
        } else if name == l.halt {
            if value.is_truthy() {
                self.stop_motion("halt");
            }
        } else if name == l.reset {
            if value.is_truthy() {
                self.stop_motion("reset");
                self.clear_error();
            }
        } else if name == l.state_set {
            self.select_state(value);
        }
    }

    fn start_move(&self) {
        if self.fault() == Some(&SimFault::NeverBusy) {
            tracing::debug!("sim: move trigger swallowed");
            return;
        }
        if self.flag(&self.layout.error) {
            tracing::debug!("sim: move ignored while axis is in error");
            return;
        }
        let target = self.float(&self.layout.position);
        let velocity = self.float(&self.layout.velocity);
        if velocity.is_nan() || velocity <= 0.0 {
            self.raise_error(INVALID_VELOCITY_ERROR_ID, "Invalid velocity for move");
            return;
        }
        self.begin_motion(MotionKind::Move, target, velocity);
    }

    fn start_home(&self) {
        if self.flag(&self.layout.error) {
            tracing::debug!("sim: home ignored while axis is in error");
            return;
        }
        let target = self.float(&self.layout.home_position);
        let velocity = match self.float(&self.layout.velocity) {
            v if v > 0.0 => v,
            _ => self.options.state_velocity,
        };
        self.begin_motion(MotionKind::Home, target, velocity);
    }

    fn select_state(&self, value: &PvValue) {
        let state = value.as_i64().unwrap_or(0);
        if (1..=self.options.state_count).contains(&state) {
            let target = state as f64 * self.options.state_spacing;
            self.begin_motion(MotionKind::State, target, self.options.state_velocity);
        } else {
            self.stop_motion("unknown state");
            self.raise_error(
                UNKNOWN_STATE_ERROR_ID,
                &format!("Unknown state requested: {state}"),
            );
        }
    }

    fn begin_motion(&self, kind: MotionKind, to: f64, velocity: f64) {
        let l = &self.layout;
        let mut motion = lock(&self.motion);
        let from = match motion.as_ref() {
            Some(m) => m.position_at(m.fraction(Instant::now())),
            None => self.float(&l.act_position),
        };
        let delta = to - from;

        if kind == MotionKind::Move {
            let enabled = self.flag(&l.backlash_enable);
            let backlash = self.float(&l.backlash);
            let compensated = enabled
                && delta != 0.0
                && backlash != 0.0
                && backlash.signum() != delta.signum();
            let comp = if compensated { backlash.abs() } else { 0.0 };
            self.set(&l.backlash_status, PvValue::Bool(compensated));
            self.set(&l.current_backlash, PvValue::Float(comp));
        }

        let travel_s = delta.abs() / velocity * self.options.time_scale;
        let duration = Duration::try_from_secs_f64(travel_s)
            .unwrap_or(Duration::ZERO)
            .max(self.options.min_busy);
        tracing::debug!(?kind, from, to, velocity, ?duration, "sim: motion start");
        *motion = Some(Motion {
            kind,
            from,
            to,
            started: Instant::now(),
            duration,
        });
        if kind == MotionKind::Home {
            self.set(&l.homed, PvValue::Bool(false));
        }
        self.set(&l.done, PvValue::Bool(false));
        self.set(&l.busy, PvValue::Bool(true));
    }

    fn stop_motion(&self, reason: &str) {
        let l = &self.layout;
        let mut motion = lock(&self.motion);
        if let Some(m) = motion.take() {
            let pos = m.position_at(m.fraction(Instant::now()));
            tracing::debug!(reason, pos, "sim: motion stopped");
            self.set(&l.act_position, PvValue::Float(pos));
        }
        self.set(&l.busy, PvValue::Bool(false));
        self.set(&l.done, PvValue::Bool(true));
    }

    fn raise_error(&self, id: i64, message: &str) {
        let l = &self.layout;
        self.set(&l.error_id, PvValue::Int(id));
        self.set(&l.error_message, PvValue::Str(message.to_string()));
        self.set(&l.error, PvValue::Bool(true));
    }

    fn clear_error(&self) {
        if self.fault() == Some(&SimFault::StickyError) {
            return;
        }
        let l = &self.layout;
        self.set(&l.error, PvValue::Bool(false));
        self.set(&l.error_id, PvValue::Int(0));
        self.set(&l.error_message, PvValue::Str(String::new()));
    }

    /// One controller scan: advance the active motion, completing it when due.
    fn scan(&self) {
        let l = &self.layout;
        let mut motion = lock(&self.motion);
        let Some(m) = motion.as_ref() else {
            return;
        };
        let fraction = m.fraction(Instant::now());
        if self.fault() == Some(&SimFault::NeverDone) {
            self.set(&l.act_position, PvValue::Float(m.position_at(fraction.min(0.5))));
            return;
        }
        if fraction < 1.0 {
            self.set(&l.act_position, PvValue::Float(m.position_at(fraction)));
            return;
        }

        let kind = m.kind;
        let mut landed = m.to;
        *motion = None;
        if let Some(SimFault::PositionOffset(off)) = self.fault() {
            landed += off;
        }
        self.set(&l.act_position, PvValue::Float(landed));
        if kind == MotionKind::Home {
            self.set(&l.homed, PvValue::Bool(true));
        }
        self.set(&l.busy, PvValue::Bool(false));
        self.set(&l.done, PvValue::Bool(true));
        tracing::debug!(?kind, landed, "sim: motion complete");
    }

    fn deliver(&self, name: &str, value: &PvValue) {
        let callbacks: Vec<Arc<Callback>> = lock(&self.registry)
            .subs
            .values()
            .filter(|s| s.pv == name)
            .map(|s| Arc::clone(&s.callback))
            .collect();
        for cb in callbacks {
            cb(name, value);
        }
    }
}

/// Simulated axis controller reachable through the `Channel` trait.
pub struct SimChannel {
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl SimChannel {
    pub fn new(layout: SimLayout, options: SimOptions) -> Self {
        let (tx, rx) = xch::unbounded::<(String, PvValue)>();
        let values: HashMap<String, PvValue> = layout
            .initial_values(options.initial_position)
            .into_iter()
            .collect();
        let shared = Arc::new(Shared {
            layout,
            options,
            values: Mutex::new(values),
            registry: Mutex::new(Registry::default()),
            motion: Mutex::new(None),
            events: tx,
        });
        let shutdown = Arc::new(AtomicBool::new(false));
        let tick = shared.options.tick.max(Duration::from_millis(1));

        let notifier = {
            let shared = Arc::clone(&shared);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || {
                loop {
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    match rx.recv_timeout(tick) {
                        Ok((name, value)) => {
                            if !shared.options.notify_latency.is_zero() {
                                std::thread::sleep(shared.options.notify_latency);
                            }
                            shared.deliver(&name, &value);
                        }
                        Err(xch::RecvTimeoutError::Timeout) => {}
                        Err(xch::RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::trace!("sim notifier exiting");
            })
        };

        let scanner = {
            let shared = Arc::clone(&shared);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    shared.scan();
                    std::thread::sleep(tick);
                }
                tracing::trace!("sim scanner exiting");
            })
        };

        Self {
            shared,
            shutdown,
            workers: vec![notifier, scanner],
        }
    }

    /// Simulated controller with the stock layout under `prefix`.
    pub fn with_prefix(prefix: &str, options: SimOptions) -> Self {
        Self::new(SimLayout::with_prefix(prefix), options)
    }

    pub fn layout(&self) -> &SimLayout {
        &self.shared.layout
    }

    /// Current value of `name` as the controller sees it.
    pub fn peek(&self, name: &str) -> Option<PvValue> {
        self.shared.value(name)
    }

    /// Controller-side write: changes a value without triggering command
    /// handling, and notifies subscribers like any other change.
    pub fn inject(&self, name: &str, value: PvValue) {
        self.shared.set(name, value);
    }

    /// Number of live subscriptions on `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        lock(&self.shared.registry)
            .subs
            .values()
            .filter(|s| s.pv == name)
            .count()
    }
}

impl Channel for SimChannel {
    fn connect(&self, name: &str) -> Result<PvHandle, BoxError> {
        let mut reg = lock(&self.shared.registry);
        let idx = match reg.handles.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                reg.handles.push(name.to_string());
                reg.handles.len() - 1
            }
        };
        Ok(PvHandle(idx as u64))
    }

    fn wait_connected(&self, handle: PvHandle, timeout: Duration) -> bool {
        let Some(name) = self.shared.handle_name(handle) else {
            return false;
        };
        wait_until_with_timeout(
            || self.shared.is_connected(&name),
            &name,
            timeout,
            self.shared.options.tick,
        )
        .is_ok()
    }

    fn name(&self, handle: PvHandle) -> Option<String> {
        self.shared.handle_name(handle)
    }

    fn get(&self, handle: PvHandle, _timeout: Duration) -> Result<PvValue, BoxError> {
        let name = self
            .shared
            .handle_name(handle)
            .ok_or(ChannelError::UnknownHandle(handle.0))?;
        if !self.shared.is_connected(&name) {
            return Err(ChannelError::NotConnected(name).into());
        }
        self.shared
            .value(&name)
            .ok_or_else(|| ChannelError::NotConnected(name).into())
    }

    fn put(&self, handle: PvHandle, value: PvValue, _timeout: Duration) -> Result<(), BoxError> {
        let name = self
            .shared
            .handle_name(handle)
            .ok_or(ChannelError::UnknownHandle(handle.0))?;
        if !self.shared.is_connected(&name) {
            return Err(ChannelError::NotConnected(name).into());
        }
        if matches!(self.shared.fault(), Some(SimFault::RejectWrites(suffix)) if name.ends_with(suffix.as_str())) {
            return Err(ChannelError::Rejected(name).into());
        }
        tracing::trace!(pv = %name, %value, "sim put");
        self.shared.set(&name, value.clone());
        self.shared.on_put(&name, &value);
        Ok(())
    }

    fn subscribe(
        &self,
        handle: PvHandle,
        callback: Callback,
    ) -> Result<SubscriptionToken, BoxError> {
        let name = self
            .shared
            .handle_name(handle)
            .ok_or(ChannelError::UnknownHandle(handle.0))?;
        let mut reg = lock(&self.shared.registry);
        reg.next_token += 1;
        let token = reg.next_token;
        reg.subs.insert(
            token,
            Subscription {
                pv: name,
                callback: Arc::new(callback),
            },
        );
        Ok(SubscriptionToken(token))
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        lock(&self.shared.registry).subs.remove(&token.0);
    }
}

impl Drop for SimChannel {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "sim worker panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fault_specs() {
        assert_eq!("never-busy".parse::<SimFault>().unwrap(), SimFault::NeverBusy);
        assert_eq!(
            "position-offset:0.5".parse::<SimFault>().unwrap(),
            SimFault::PositionOffset(0.5)
        );
        assert_eq!(
            "reject:bHalt".parse::<SimFault>().unwrap(),
            SimFault::RejectWrites("bHalt".into())
        );
        assert!("reject:".parse::<SimFault>().is_err());
        assert!("explode".parse::<SimFault>().is_err());
    }

    #[test]
    fn motion_interpolates_and_clamps() {
        let m = Motion {
            kind: MotionKind::Move,
            from: 0.0,
            to: 10.0,
            started: Instant::now(),
            duration: Duration::ZERO,
        };
        assert_eq!(m.fraction(Instant::now()), 1.0);
        assert_eq!(m.position_at(0.25), 2.5);
    }
}
