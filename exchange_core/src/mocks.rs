//! Test and helper mocks for exchange_core
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use exchange_traits::{
    Assets, BoxError, ClipSink, DigitalInput, HookState, LineListener, NightSchedule, Route,
};

/// One command received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCmd {
    Play(String),
    Speak(String),
    Stop,
    Route(Route),
    Volume(u8),
    Mute(bool),
    Amplifier(bool),
}

#[derive(Default)]
struct SinkState {
    log: Vec<SinkCmd>,
    playing: Option<String>,
    on_finished: Option<Box<dyn Fn() + Send + Sync>>,
    fail_play: BTreeSet<String>,
    speech: bool,
}

/// Sink that records every command. Clones share the same log, so a test can
/// keep one handle while the engine owns another.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose `speak` succeeds.
    pub fn with_speech() -> Self {
        let s = Self::new();
        s.with(|st| st.speech = true);
        s
    }

    fn with<R>(&self, f: impl FnOnce(&mut SinkState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn commands(&self) -> Vec<SinkCmd> {
        self.with(|st| st.log.clone())
    }

    /// Paths passed to `play`, in order.
    pub fn played(&self) -> Vec<String> {
        self.with(|st| {
            st.log
                .iter()
                .filter_map(|c| match c {
                    SinkCmd::Play(p) => Some(p.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn current(&self) -> Option<String> {
        self.with(|st| st.playing.clone())
    }

    pub fn clear_log(&self) {
        self.with(|st| st.log.clear());
    }

    /// Make `play(path)` fail.
    pub fn fail_on(&self, path: &str) {
        self.with(|st| {
            st.fail_play.insert(path.to_string());
        });
    }

    /// Let the current clip end on its own; fires the completion callback.
    pub fn finish(&self) -> bool {
        let was_playing = self.with(|st| st.playing.take().is_some());
        if was_playing {
            // Call outside the lock; the callback may touch the sink again.
            let cb = self.with(|st| st.on_finished.take());
            if let Some(cb) = cb {
                cb();
                self.with(|st| {
                    if st.on_finished.is_none() {
                        st.on_finished = Some(cb);
                    }
                });
            }
        }
        was_playing
    }

    /// Drop playback without a completion (a stalled decoder).
    pub fn stall(&self) {
        self.with(|st| st.playing = None);
    }
}

impl ClipSink for RecordingSink {
    fn play(&mut self, path: &str) -> Result<(), BoxError> {
        self.with(|st| {
            st.log.push(SinkCmd::Play(path.to_string()));
            if st.fail_play.contains(path) {
                return Err(format!("clip {path} not found").into());
            }
            st.playing = Some(path.to_string());
            Ok(())
        })
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.with(|st| {
            st.log.push(SinkCmd::Stop);
            st.playing = None;
        });
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.with(|st| st.playing.is_some())
    }

    fn on_finished(&mut self, callback: Box<dyn Fn() + Send + Sync>) {
        self.with(|st| st.on_finished = Some(callback));
    }

    fn set_route(&mut self, route: Route) -> Result<(), BoxError> {
        self.with(|st| st.log.push(SinkCmd::Route(route)));
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), BoxError> {
        self.with(|st| st.log.push(SinkCmd::Volume(volume)));
        Ok(())
    }

    fn mute(&mut self, muted: bool) -> Result<(), BoxError> {
        self.with(|st| st.log.push(SinkCmd::Mute(muted)));
        Ok(())
    }

    fn set_amplifier(&mut self, on: bool) -> Result<(), BoxError> {
        self.with(|st| st.log.push(SinkCmd::Amplifier(on)));
        Ok(())
    }

    fn speak(&mut self, text: &str) -> Result<(), BoxError> {
        self.with(|st| {
            st.log.push(SinkCmd::Speak(text.to_string()));
            if !st.speech {
                return Err("speech synthesis not available".into());
            }
            st.playing = Some(format!("speech:{text}"));
            Ok(())
        })
    }
}

/// In-memory asset listing.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: BTreeSet<String>,
}

impl MemoryAssets {
    pub fn with(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    pub fn add(&mut self, file: &str) {
        self.files.insert(file.to_string());
    }
}

impl Assets for MemoryAssets {
    fn exists(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    fn list(&self, folder: &str) -> Vec<String> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        self.files
            .iter()
            .filter(|f| {
                f.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect()
    }
}

/// Input pin driven by the test. Clones share the level.
#[derive(Debug, Clone, Default)]
pub struct MockPin {
    level: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
}

impl MockPin {
    pub fn new(level: bool) -> Self {
        let p = Self::default();
        p.set(level);
        p
    }

    pub fn set(&self, level: bool) {
        self.level.store(level, Ordering::Relaxed);
    }

    /// Make reads fail until cleared.
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::Relaxed);
    }
}

impl DigitalInput for MockPin {
    fn level(&mut self) -> Result<bool, BoxError> {
        if self.broken.load(Ordering::Relaxed) {
            return Err("pin read failed".into());
        }
        Ok(self.level.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedNight(pub bool);

impl NightSchedule for FixedNight {
    fn is_night_hour(&self, _hour: u8) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    Digit(u8),
    Hook(HookState),
    Button,
    Reboot,
}

/// Listener that records notifications; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ListenerEvent>>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn push(&self, e: ListenerEvent) {
        if let Ok(mut g) = self.events.lock() {
            g.push(e);
        }
    }
}

impl LineListener for RecordingListener {
    fn on_digit(&mut self, digit: u8) {
        self.push(ListenerEvent::Digit(digit));
    }

    fn on_hook(&mut self, state: HookState) {
        self.push(ListenerEvent::Hook(state));
    }

    fn on_button(&mut self) {
        self.push(ListenerEvent::Button);
    }

    fn on_reboot_requested(&mut self) {
        self.push(ListenerEvent::Reboot);
    }
}
