//! Test and helper mocks for axis_core.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axis_traits::{BoxError, Callback, Channel, PvHandle, PvValue, SubscriptionToken};

#[derive(Default)]
struct Inner {
    names: Vec<String>,
    values: HashMap<String, PvValue>,
    subs: HashMap<u64, (String, Arc<Callback>)>,
    next_token: u64,
    writes: Vec<(String, PvValue)>,
    fail_writes: Vec<String>,
    dropped: Vec<String>,
}

/// A channel whose values change only when the test says so.
///
/// Every name connects. Unknown PVs read as `Int(0)`. Writes are logged and
/// stored but have no side effects, and notifications are delivered
/// synchronously on the thread that calls `fire`.
#[derive(Default, Clone)]
pub struct ManualChannel {
    inner: Arc<Mutex<Inner>>,
}

impl ManualChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a value without notifying.
    pub fn set(&self, name: &str, value: PvValue) {
        self.lock().values.insert(name.to_string(), value);
    }

    /// Set a value and notify every subscriber of `name`.
    pub fn fire(&self, name: &str, value: PvValue) {
        let callbacks: Vec<Arc<Callback>> = {
            let mut inner = self.lock();
            inner.values.insert(name.to_string(), value.clone());
            inner
                .subs
                .values()
                .filter(|(pv, _)| pv == name)
                .map(|(_, cb)| Arc::clone(cb))
                .collect()
        };
        for cb in callbacks {
            cb(name, &value);
        }
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<(String, PvValue)> {
        self.lock().writes.clone()
    }

    /// Make writes to `name` fail.
    pub fn fail_writes_to(&self, name: &str) {
        self.lock().fail_writes.push(name.to_string());
    }

    /// Simulate `name` dropping off the network after it connected.
    pub fn drop_connection(&self, name: &str) {
        self.lock().dropped.push(name.to_string());
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.lock().subs.values().filter(|(pv, _)| pv == name).count()
    }

    fn name_of(&self, handle: PvHandle) -> Result<String, BoxError> {
        usize::try_from(handle.0)
            .ok()
            .and_then(|i| self.lock().names.get(i).cloned())
            .ok_or_else(|| format!("unknown handle {}", handle.0).into())
    }
}

impl Channel for ManualChannel {
    fn connect(&self, name: &str) -> Result<PvHandle, BoxError> {
        let mut inner = self.lock();
        let idx = match inner.names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                inner.names.push(name.to_string());
                inner.names.len() - 1
            }
        };
        Ok(PvHandle(idx as u64))
    }

    fn wait_connected(&self, handle: PvHandle, _timeout: Duration) -> bool {
        self.name_of(handle).is_ok()
    }

    fn name(&self, handle: PvHandle) -> Option<String> {
        self.name_of(handle).ok()
    }

    fn get(&self, handle: PvHandle, _timeout: Duration) -> Result<PvValue, BoxError> {
        let name = self.name_of(handle)?;
        Ok(self
            .lock()
            .values
            .get(&name)
            .cloned()
            .unwrap_or(PvValue::Int(0)))
    }

    fn put(&self, handle: PvHandle, value: PvValue, _timeout: Duration) -> Result<(), BoxError> {
        let name = self.name_of(handle)?;
        let mut inner = self.lock();
        if inner.dropped.contains(&name) {
            return Err(format!("{name} not connected").into());
        }
        if inner.fail_writes.contains(&name) {
            return Err(format!("write to {name} timed out").into());
        }
        inner.writes.push((name.clone(), value.clone()));
        inner.values.insert(name, value);
        Ok(())
    }

    fn subscribe(&self, handle: PvHandle, callback: Callback) -> Result<SubscriptionToken, BoxError> {
        let name = self.name_of(handle)?;
        let mut inner = self.lock();
        inner.next_token += 1;
        let token = inner.next_token;
        inner.subs.insert(token, (name, Arc::new(callback)));
        Ok(SubscriptionToken(token))
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.lock().subs.remove(&token.0);
    }
}
