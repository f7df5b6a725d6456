//! Type-state builder for `Harness`.
//!
//! The builder enforces at compile time that a channel and a motor prefix are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks. Building connects every axis PV.

use std::marker::PhantomData;
use std::sync::Arc;

use axis_config::PvSuffixes;
use axis_traits::{Channel, Clock, MonotonicClock};

use crate::config::HarnessCfg;
use crate::error::{BuildError, Result};
use crate::harness::Harness;
use crate::pvs::{AxisPvs, PvNames};
use crate::report::{ConsoleSink, RecordSink};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Harness`. All fields are validated on `build()`.
pub struct HarnessBuilder<C, P> {
    channel: Option<Arc<dyn Channel>>,
    prefix: Option<String>,
    suffixes: Option<PvSuffixes>,
    cfg: Option<HarnessCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn RecordSink>>,
    _c: PhantomData<C>,
    _p: PhantomData<P>,
}

impl Default for HarnessBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            channel: None,
            prefix: None,
            suffixes: None,
            cfg: None,
            clock: None,
            sink: None,
            _c: PhantomData,
            _p: PhantomData,
        }
    }
}

impl Harness {
    /// Start building a Harness.
    pub fn builder() -> HarnessBuilder<Missing, Missing> {
        HarnessBuilder::default()
    }
}

fn validate(cfg: &HarnessCfg) -> Result<()> {
    let invalid = |msg| Err(eyre::Report::new(BuildError::InvalidConfig(msg)));
    if !(cfg.motion.min_time > 0.0) {
        return invalid("min_time must be > 0");
    }
    if !(cfg.motion.min_velocity > 0.0) || cfg.motion.min_velocity > cfg.motion.max_velocity {
        return invalid("velocity limits must satisfy 0 < min <= max");
    }
    if !(cfg.motion.max_acceleration > 0.0) {
        return invalid("max_acceleration must be > 0");
    }
    if cfg.timeouts.poll.is_zero() {
        return invalid("poll interval must be > 0");
    }
    let tol = &cfg.tolerances;
    if !(tol.position > 0.0 && tol.home_position > 0.0 && tol.compensation > 0.0) {
        return invalid("tolerances must be > 0");
    }
    if tol.near_zero.is_sign_negative() {
        return invalid("near_zero must be >= 0");
    }
    Ok(())
}

impl<C, P> HarnessBuilder<C, P> {
    pub fn try_build(self) -> Result<Harness> {
        let channel = self
            .channel
            .ok_or_else(|| eyre::Report::new(BuildError::MissingChannel))?;
        let prefix = self
            .prefix
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPrefix))?;
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg)?;

        let names = PvNames::new(&prefix, &self.suffixes.unwrap_or_default());
        let pvs = AxisPvs::connect(&channel, names, cfg.timeouts.connect)?;
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let sink = self.sink.unwrap_or_else(|| Box::new(ConsoleSink));
        tracing::info!(prefix = %prefix, "harness ready");
        Ok(Harness::new(channel, clock, pvs, cfg, sink))
    }

    pub fn with_config(mut self, cfg: HarnessCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    pub fn with_suffixes(mut self, suffixes: PvSuffixes) -> Self {
        self.suffixes = Some(suffixes);
        self
    }

    /// Take harness settings and PV suffixes from a loaded config file.
    pub fn with_file_config(self, cfg: &axis_config::Config) -> Self {
        self.with_config(HarnessCfg::from(cfg))
            .with_suffixes(cfg.pvs.clone())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl<P> HarnessBuilder<Missing, P> {
    pub fn with_channel(self, channel: Arc<dyn Channel>) -> HarnessBuilder<Set, P> {
        HarnessBuilder {
            channel: Some(channel),
            prefix: self.prefix,
            suffixes: self.suffixes,
            cfg: self.cfg,
            clock: self.clock,
            sink: self.sink,
            _c: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<C> HarnessBuilder<C, Missing> {
    pub fn with_prefix(self, prefix: impl Into<String>) -> HarnessBuilder<C, Set> {
        HarnessBuilder {
            channel: self.channel,
            prefix: Some(prefix.into()),
            suffixes: self.suffixes,
            cfg: self.cfg,
            clock: self.clock,
            sink: self.sink,
            _c: PhantomData,
            _p: PhantomData,
        }
    }
}

impl HarnessBuilder<Set, Set> {
    /// Validate, connect and build. Only available when channel and prefix are set.
    pub fn build(self) -> Result<Harness> {
        self.try_build()
    }
}
