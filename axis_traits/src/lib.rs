pub mod channel;
pub mod clock;

pub use channel::{BoxError, Callback, Channel, PvHandle, PvValue, SubscriptionToken};
pub use clock::{Clock, MonotonicClock};
