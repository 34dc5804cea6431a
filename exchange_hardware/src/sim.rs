//! Simulated line hardware.
//!
//! `SimulatedSink` pretends to play clips for a fixed duration and reports
//! completion from `poll()`. `SimulatedPin` is a settable digital input.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use exchange_traits::{Assets, BoxError, ClipSink, Clock, DigitalInput, Route};

use crate::assets::DirAssets;
use crate::error::HwError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimAction {
    Play(String),
    Speak(String),
    Finished(String),
    Stop,
    Route(Route),
    Volume(u8),
    Mute(bool),
    Amplifier(bool),
}

/// One sink command with its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimEvent {
    pub at_ms: u64,
    pub action: SimAction,
}

#[derive(Debug, Clone)]
pub struct SimOptions {
    /// How long a clip "plays" unless overridden per path.
    pub clip_ms: u64,
    /// Accept `speak()` requests.
    pub speech: bool,
    /// Refuse clips that are not present under this root.
    pub assets: Option<DirAssets>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            clip_ms: 1500,
            speech: false,
            assets: None,
        }
    }
}

struct Playing {
    clip: String,
    started_ms: u64,
    duration_ms: u64,
}

#[derive(Default)]
struct SinkState {
    playing: Option<Playing>,
    route: Option<Route>,
    volume: u8,
    muted: bool,
    amplifier: bool,
    on_finished: Option<Arc<dyn Fn() + Send + Sync>>,
    durations: HashMap<String, u64>,
    history: Vec<SimEvent>,
}

struct Inner {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    opts: SimOptions,
    state: Mutex<SinkState>,
}

/// Audio sink stand-in. Clones share one device.
#[derive(Clone)]
pub struct SimulatedSink {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SimulatedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("SimulatedSink")
            .field("playing", &st.playing.as_ref().map(|p| p.clip.as_str()))
            .field("route", &st.route)
            .field("volume", &st.volume)
            .finish()
    }
}

impl SimulatedSink {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, opts: SimOptions) -> Self {
        let epoch = clock.now();
        Self {
            inner: Arc::new(Inner {
                clock,
                epoch,
                opts,
                state: Mutex::new(SinkState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        match self.inner.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.inner.clock.ms_since(self.inner.epoch)
    }

    fn record(&self, st: &mut SinkState, action: SimAction) {
        st.history.push(SimEvent {
            at_ms: self.now_ms(),
            action,
        });
    }

    /// Override the playing time of one clip.
    pub fn set_duration(&self, clip: &str, ms: u64) {
        self.lock().durations.insert(clip.to_string(), ms);
    }

    /// Finish the current clip once its time is up. Returns whether one finished.
    pub fn poll(&self) -> bool {
        let now = self.now_ms();
        let cb = {
            let mut st = self.lock();
            let done = st
                .playing
                .as_ref()
                .is_some_and(|p| now.saturating_sub(p.started_ms) >= p.duration_ms);
            if !done {
                return false;
            }
            let Some(p) = st.playing.take() else {
                return false;
            };
            tracing::debug!(clip = %p.clip, "clip finished");
            self.record(&mut st, SimAction::Finished(p.clip));
            st.on_finished.clone()
        };
        // Outside the lock: the callback may call back into the sink.
        if let Some(cb) = cb {
            cb();
        }
        true
    }

    pub fn history(&self) -> Vec<SimEvent> {
        self.lock().history.clone()
    }

    /// Clip paths passed to `play`, in order.
    pub fn played(&self) -> Vec<String> {
        self.lock()
            .history
            .iter()
            .filter_map(|e| match &e.action {
                SimAction::Play(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn current(&self) -> Option<String> {
        self.lock().playing.as_ref().map(|p| p.clip.clone())
    }

    pub fn route(&self) -> Option<Route> {
        self.lock().route
    }

    pub fn volume(&self) -> u8 {
        self.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.lock().muted
    }

    pub fn amplifier(&self) -> bool {
        self.lock().amplifier
    }

    fn start(&self, clip: String, action: SimAction) {
        let started_ms = self.now_ms();
        let mut st = self.lock();
        let duration_ms = st
            .durations
            .get(&clip)
            .copied()
            .unwrap_or(self.inner.opts.clip_ms);
        self.record(&mut st, action);
        st.playing = Some(Playing {
            clip,
            started_ms,
            duration_ms,
        });
    }
}

impl ClipSink for SimulatedSink {
    fn play(&mut self, path: &str) -> Result<(), BoxError> {
        if let Some(assets) = &self.inner.opts.assets
            && !assets.exists(path)
        {
            tracing::warn!(clip = path, "clip missing");
            return Err(HwError::MissingAsset(path.to_string()).into());
        }
        tracing::info!(clip = path, "play");
        self.start(path.to_string(), SimAction::Play(path.to_string()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        let mut st = self.lock();
        if let Some(p) = st.playing.take() {
            tracing::debug!(clip = %p.clip, "stop");
        }
        self.record(&mut st, SimAction::Stop);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.lock().playing.is_some()
    }

    fn on_finished(&mut self, callback: Box<dyn Fn() + Send + Sync>) {
        self.lock().on_finished = Some(Arc::from(callback));
    }

    fn set_route(&mut self, route: Route) -> Result<(), BoxError> {
        let mut st = self.lock();
        st.route = Some(route);
        self.record(&mut st, SimAction::Route(route));
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), BoxError> {
        let mut st = self.lock();
        let volume = volume.min(100);
        st.volume = volume;
        self.record(&mut st, SimAction::Volume(volume));
        Ok(())
    }

    fn mute(&mut self, muted: bool) -> Result<(), BoxError> {
        let mut st = self.lock();
        st.muted = muted;
        self.record(&mut st, SimAction::Mute(muted));
        Ok(())
    }

    fn set_amplifier(&mut self, on: bool) -> Result<(), BoxError> {
        let mut st = self.lock();
        if st.amplifier != on {
            tracing::debug!(on, "amplifier");
            st.amplifier = on;
            self.record(&mut st, SimAction::Amplifier(on));
        }
        Ok(())
    }

    fn speak(&mut self, text: &str) -> Result<(), BoxError> {
        if !self.inner.opts.speech {
            return Err(HwError::Unsupported("speech synthesis").into());
        }
        tracing::info!(text, "speak");
        self.start(format!("speech:{text}"), SimAction::Speak(text.to_string()));
        Ok(())
    }
}

/// Digital input whose level is set by the owner. Clones share the level.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPin {
    level: Arc<AtomicBool>,
}

impl SimulatedPin {
    pub fn new(level: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(level)),
        }
    }

    pub fn set(&self, level: bool) {
        self.level.store(level, Ordering::Relaxed);
    }

    pub fn get(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

impl DigitalInput for SimulatedPin {
    fn level(&mut self) -> Result<bool, BoxError> {
        Ok(self.get())
    }
}
