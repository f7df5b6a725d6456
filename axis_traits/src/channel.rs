//! Process-variable channel seam.
//!
//! A `Channel` is the transport the harness talks through: named variables that
//! can be read, written, and subscribed to. Subscription callbacks run on a
//! thread owned by the implementation, never on the caller's thread.

use std::fmt;
use std::time::Duration;

/// Error type crossing the channel boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Notification callback: `(variable_name, new_value)`.
pub type Callback = Box<dyn Fn(&str, &PvValue) + Send + Sync>;

/// Opaque handle to a connected (or connecting) process variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PvHandle(pub u64);

/// Token identifying one subscription; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(pub u64);

/// Value carried by a process variable.
#[derive(Debug, Clone, PartialEq)]
pub enum PvValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl PvValue {
    /// Truthiness as a controller flag: non-zero numbers and non-empty strings are true.
    pub fn is_truthy(&self) -> bool {
        match self {
            PvValue::Bool(b) => *b,
            PvValue::Int(i) => *i != 0,
            PvValue::Float(f) => *f != 0.0,
            PvValue::Str(s) => !s.is_empty(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PvValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            PvValue::Int(i) => Some(*i as f64),
            PvValue::Float(f) => Some(*f),
            PvValue::Str(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PvValue::Bool(b) => Some(i64::from(*b)),
            PvValue::Int(i) => Some(*i),
            PvValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            PvValue::Float(_) => None,
            PvValue::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Render the value as text, the way a string-typed read would.
    pub fn as_text(&self) -> String {
        match self {
            PvValue::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Equality used by level-match waits: numeric values compare by number,
    /// so `Bool(true)`, `Int(1)` and `Float(1.0)` all match each other.
    pub fn matches(&self, other: &PvValue) -> bool {
        match (self, other) {
            (PvValue::Str(a), PvValue::Str(b)) => a == b,
            (PvValue::Str(_), _) | (_, PvValue::Str(_)) => false,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for PvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PvValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            PvValue::Int(i) => write!(f, "{i}"),
            PvValue::Float(x) => write!(f, "{x}"),
            PvValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for PvValue {
    fn from(b: bool) -> Self {
        PvValue::Bool(b)
    }
}

impl From<i64> for PvValue {
    fn from(i: i64) -> Self {
        PvValue::Int(i)
    }
}

impl From<f64> for PvValue {
    fn from(f: f64) -> Self {
        PvValue::Float(f)
    }
}

impl From<&str> for PvValue {
    fn from(s: &str) -> Self {
        PvValue::Str(s.to_string())
    }
}

/// Client side of a process-variable transport.
///
/// Implementations must be shareable across threads: the harness writes from
/// its control thread while callbacks are delivered elsewhere.
pub trait Channel: Send + Sync {
    /// Begin connecting to `name`; the handle is usable once `wait_connected` succeeds.
    fn connect(&self, name: &str) -> Result<PvHandle, BoxError>;

    /// Block up to `timeout` for the connection; `false` on timeout.
    fn wait_connected(&self, handle: PvHandle, timeout: Duration) -> bool;

    /// Name the handle was connected with.
    fn name(&self, handle: PvHandle) -> Option<String>;

    fn get(&self, handle: PvHandle, timeout: Duration) -> Result<PvValue, BoxError>;

    fn put(&self, handle: PvHandle, value: PvValue, timeout: Duration) -> Result<(), BoxError>;

    /// Register `callback` for every subsequent value change of `handle`.
    fn subscribe(&self, handle: PvHandle, callback: Callback)
    -> Result<SubscriptionToken, BoxError>;

    /// Remove a subscription. Unknown tokens are ignored.
    fn unsubscribe(&self, token: SubscriptionToken);
}
