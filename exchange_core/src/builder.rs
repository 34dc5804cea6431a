//! Type-state builder for [`Exchange`].
//!
//! `build()` only exists once a clip sink was provided; every other
//! collaborator has a default. `try_build()` is available in any state.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use exchange_config::{FileAlarmStore, HourRangeNightSchedule, MemoryVolumeStore, Phonebook};
use exchange_traits::{
    AlarmStore, Assets, ClipSink, Clock, LineListener, MonotonicClock, NightSchedule,
    PhonebookLookup, SystemWallClock, VolumeStore, WallClock,
};

use crate::alarm::AlarmScheduler;
use crate::arbiter::OutputArbiter;
use crate::clips::ClipCatalog;
use crate::config::ExchangeConfig;
use crate::coordinator::Exchange;
use crate::error::{BuildError, Result};
use crate::gain::GainTargets;
use crate::line::{Collaborators, LineStateMachine};
use crate::messages::MessageLibrary;
use crate::pulse::PulseCounter;
use crate::util::Timebase;

pub struct Missing;
pub struct Set;

/// Accepts every path and lists nothing. Used when no asset root is wired.
struct PermissiveAssets;

impl Assets for PermissiveAssets {
    fn exists(&self, _path: &str) -> bool {
        true
    }
    fn list(&self, _folder: &str) -> Vec<String> {
        Vec::new()
    }
}

pub struct ExchangeBuilder<S> {
    sink: Option<Box<dyn ClipSink>>,
    config: Option<ExchangeConfig>,
    phonebook: Option<Box<dyn PhonebookLookup>>,
    alarm_store: Option<Box<dyn AlarmStore>>,
    volumes: Option<Box<dyn VolumeStore>>,
    night: Option<Box<dyn NightSchedule>>,
    assets: Option<Box<dyn Assets>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    wall: Option<Arc<dyn WallClock + Send + Sync>>,
    listener: Option<Box<dyn LineListener>>,
    seed: Option<u32>,
    degraded: Option<String>,
    _s: PhantomData<S>,
}

impl Default for ExchangeBuilder<Missing> {
    fn default() -> Self {
        Self {
            sink: None,
            config: None,
            phonebook: None,
            alarm_store: None,
            volumes: None,
            night: None,
            assets: None,
            clock: None,
            wall: None,
            listener: None,
            seed: None,
            degraded: None,
            _s: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(cfg: &ExchangeConfig) -> Result<()> {
    if cfg.input.tick_ms == 0 {
        return Err(invalid("tick period must be > 0"));
    }
    if cfg.line.poll_ms == 0 {
        return Err(invalid("poll period must be > 0"));
    }
    if !(1..=9).contains(&cfg.line.menu_items) {
        return Err(invalid("menu items must be in 1..=9"));
    }
    if cfg.alarm.timer_min_minutes == 0 || cfg.alarm.timer_min_minutes > cfg.alarm.timer_max_minutes
    {
        return Err(invalid("timer range must satisfy 1 <= min <= max"));
    }
    if cfg.alarm.timer_max_minutes > 999 {
        return Err(invalid("timer max must fit in three digits"));
    }
    if !(cfg.alarm.fade_floor > 0.0 && cfg.alarm.fade_floor <= 1.0) {
        return Err(invalid("fade floor must be in (0, 1]"));
    }
    if cfg.route.night_volume_percent > 100 {
        return Err(invalid("night volume percent must be <= 100"));
    }
    if cfg.alarm.alarm_volume > 100 || cfg.alarm.alarm_min_volume > cfg.alarm.alarm_volume {
        return Err(invalid("alarm volumes must satisfy min <= volume <= 100"));
    }
    if !(0.0..=1.0).contains(&cfg.gain.gate_floor) {
        return Err(invalid("gate floor must be in [0, 1]"));
    }
    Ok(())
}

fn default_seed() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() | 1)
        .unwrap_or(1)
}

impl<S> ExchangeBuilder<S> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<Exchange> {
        let sink = self
            .sink
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSink))?;
        let cfg = self.config.unwrap_or_default();
        validate(&cfg)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let time = Timebase::new(clock);
        let wall: Arc<dyn WallClock + Send + Sync> = match self.wall {
            Some(w) => w,
            None => Arc::new(SystemWallClock),
        };

        let io = Collaborators {
            sink,
            phonebook: self
                .phonebook
                .unwrap_or_else(|| Box::new(Phonebook::defaults())),
            alarms: self
                .alarm_store
                .unwrap_or_else(|| Box::new(FileAlarmStore::in_memory())),
            volumes: self
                .volumes
                .unwrap_or_else(|| Box::new(MemoryVolumeStore::new(60, 70))),
            night: self.night.unwrap_or_else(|| {
                Box::new(HourRangeNightSchedule {
                    enabled: true,
                    start_hour: 22,
                    end_hour: 6,
                })
            }),
            assets: self.assets.unwrap_or_else(|| Box::new(PermissiveAssets)),
            wall,
        };

        let targets = GainTargets::new(0.0, 0.0);
        let pulse = PulseCounter::new(cfg.pulse.debounce_ms, cfg.pulse.pulse_active_low);
        let mut line = LineStateMachine::new(
            cfg.line.clone(),
            io,
            time.clone(),
            ClipCatalog::new(&cfg.clips),
            OutputArbiter::new(&cfg.route, &cfg.gain, targets.clone()),
            AlarmScheduler::new(&cfg.alarm),
            MessageLibrary::new(self.seed.unwrap_or_else(default_seed)),
            Some(pulse.clone()),
        );
        if let Some(l) = self.listener {
            line.set_listener(l);
        }
        if let Some(reason) = self.degraded {
            line.set_degraded(reason);
        }

        Ok(Exchange::new(
            line,
            time,
            pulse,
            cfg.pulse.clone(),
            cfg.input.clone(),
            Duration::from_millis(cfg.line.poll_ms),
            targets,
        ))
    }
}

/// Chainable setters that do not affect type-state.
impl<S> ExchangeBuilder<S> {
    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = Some(config);
        self
    }
    pub fn with_phonebook(mut self, phonebook: impl PhonebookLookup + 'static) -> Self {
        self.phonebook = Some(Box::new(phonebook));
        self
    }
    pub fn with_alarm_store(mut self, store: impl AlarmStore + 'static) -> Self {
        self.alarm_store = Some(Box::new(store));
        self
    }
    pub fn with_volumes(mut self, volumes: impl VolumeStore + 'static) -> Self {
        self.volumes = Some(Box::new(volumes));
        self
    }
    pub fn with_night_schedule(mut self, night: impl NightSchedule + 'static) -> Self {
        self.night = Some(Box::new(night));
        self
    }
    pub fn with_assets(mut self, assets: impl Assets + 'static) -> Self {
        self.assets = Some(Box::new(assets));
        self
    }
    /// Monotonic clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Wall clock for daily alarms and time announcements; defaults to local system time.
    pub fn with_wall_clock(mut self, wall: Arc<dyn WallClock + Send + Sync>) -> Self {
        self.wall = Some(wall);
        self
    }
    pub fn with_listener(mut self, listener: impl LineListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }
    /// Seed for message shuffling.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }
    /// Start in degraded mode, e.g. after the asset root failed to mount.
    pub fn degraded(mut self, reason: impl Into<String>) -> Self {
        self.degraded = Some(reason.into());
        self
    }
}

impl ExchangeBuilder<Missing> {
    pub fn with_sink(self, sink: impl ClipSink + 'static) -> ExchangeBuilder<Set> {
        ExchangeBuilder {
            sink: Some(Box::new(sink)),
            config: self.config,
            phonebook: self.phonebook,
            alarm_store: self.alarm_store,
            volumes: self.volumes,
            night: self.night,
            assets: self.assets,
            clock: self.clock,
            wall: self.wall,
            listener: self.listener,
            seed: self.seed,
            degraded: self.degraded,
            _s: PhantomData,
        }
    }
}

impl ExchangeBuilder<Set> {
    pub fn build(self) -> Result<Exchange> {
        self.try_build()
    }
}
