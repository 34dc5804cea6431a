#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use exchange_config::{FileAlarmStore, MemoryVolumeStore, Phonebook};
use exchange_core::mocks::{FixedNight, MemoryAssets, RecordingListener, RecordingSink};
use exchange_core::{Event, Exchange, ExchangeConfig, LineEvent};
use exchange_traits::{HookState, ManualClock, ManualWallClock, Route, VolumeStore, WallTime};

pub const DIAL_TONE: &str = "/system/dialtone_1.wav";
pub const BUSY_TONE: &str = "/system/busy_tone.wav";
pub const ERROR_TONE: &str = "/system/error_tone.wav";
pub const HANGUP_CLICK: &str = "/system/hangup_click.wav";
pub const INVALID_NUMBER: &str = "/system/invalid_number_de.mp3";
pub const MENU: &str = "/system/menu_de.mp3";

pub fn spoken(name: &str) -> String {
    format!("/system/{name}_de.mp3")
}

pub fn number_clip(n: u32) -> String {
    format!("/time/de/{n}.mp3")
}

/// Monday 3 March 2025 at `hour:minute`.
pub fn monday(hour: u8, minute: u8) -> WallTime {
    WallTime {
        year: 2025,
        month: 3,
        day: 3,
        weekday: 1,
        day_of_year: 61,
        hour,
        minute,
        second: 0,
    }
}

/// Volume store whose writes the test can inspect.
#[derive(Clone)]
pub struct SharedVolumes {
    store: Arc<Mutex<MemoryVolumeStore>>,
    writes: Arc<Mutex<Vec<(Route, u8)>>>,
}

impl SharedVolumes {
    pub fn new(handset: u8, speaker: u8) -> Self {
        Self {
            store: Arc::new(Mutex::new(MemoryVolumeStore::new(handset, speaker))),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn writes(&self) -> Vec<(Route, u8)> {
        self.writes.lock().unwrap().clone()
    }
}

impl VolumeStore for SharedVolumes {
    fn get(&self, route: Route) -> u8 {
        self.store.lock().unwrap().get(route)
    }

    fn set(&mut self, route: Route, volume: u8) {
        self.writes.lock().unwrap().push((route, volume));
        self.store.lock().unwrap().set(route, volume);
    }
}

pub struct Options {
    pub config: ExchangeConfig,
    pub phonebook: Phonebook,
    pub alarms: FileAlarmStore,
    pub wall: Option<WallTime>,
    pub assets: Option<MemoryAssets>,
    pub night: Option<bool>,
    pub sink: RecordingSink,
    pub degraded: Option<String>,
    pub volumes: Option<SharedVolumes>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: ExchangeConfig::default(),
            phonebook: Phonebook::defaults(),
            alarms: FileAlarmStore::in_memory(),
            wall: None,
            assets: None,
            night: None,
            sink: RecordingSink::new(),
            degraded: None,
            volumes: None,
        }
    }
}

pub struct Rig {
    pub ex: Exchange,
    pub sink: RecordingSink,
    pub clock: ManualClock,
    pub wall: ManualWallClock,
    pub listener: RecordingListener,
}

impl Rig {
    pub fn new() -> Self {
        Self::with(Options::default())
    }

    /// Builds, starts and lets the startup announcement finish; the sink log is cleared.
    pub fn with(opts: Options) -> Self {
        let sink = opts.sink;
        let clock = ManualClock::new();
        let wall = ManualWallClock::new(opts.wall);
        let listener = RecordingListener::default();
        let mut b = Exchange::builder()
            .with_sink(sink.clone())
            .with_config(opts.config)
            .with_phonebook(opts.phonebook)
            .with_alarm_store(opts.alarms)
            .with_clock(Arc::new(clock.clone()))
            .with_wall_clock(Arc::new(wall.clone()))
            .with_listener(listener.clone())
            .with_seed(7);
        if let Some(a) = opts.assets {
            b = b.with_assets(a);
        }
        if let Some(n) = opts.night {
            b = b.with_night_schedule(FixedNight(n));
        }
        if let Some(v) = opts.volumes {
            b = b.with_volumes(v);
        }
        if let Some(reason) = opts.degraded {
            b = b.degraded(reason);
        }
        let mut ex = b.build().expect("build exchange");
        ex.start();
        let mut rig = Self {
            ex,
            sink,
            clock,
            wall,
            listener,
        };
        rig.finish_all();
        rig.sink.clear_log();
        rig
    }

    pub fn send(&mut self, ev: LineEvent) {
        self.ex.handle(Event::Line(ev));
        self.ex.pump();
    }

    pub fn pickup(&mut self) {
        self.send(LineEvent::Hook(HookState::OffHook));
    }

    pub fn hang_up(&mut self) {
        self.send(LineEvent::Hook(HookState::OnHook));
    }

    pub fn button(&mut self) {
        self.send(LineEvent::ButtonPressed);
    }

    pub fn dial(&mut self, number: &str) {
        for c in number.chars() {
            let d = c.to_digit(10).expect("digit") as u8;
            self.send(LineEvent::Digit(d));
        }
    }

    /// Dial and wait out the inter-digit timeout.
    pub fn call(&mut self, number: &str) {
        self.dial(number);
        self.advance(2001);
    }

    pub fn advance(&mut self, ms: u64) {
        self.clock.advance_ms(ms);
        self.ex.pump();
    }

    /// End the current clip naturally. Returns whether something was playing.
    pub fn finish(&mut self) -> bool {
        let was = self.sink.finish();
        self.ex.pump();
        was
    }

    /// Finish clips until nothing is playing; bounded so a looping tone ends it.
    pub fn finish_all(&mut self) {
        for _ in 0..32 {
            let current = self.sink.current();
            if current.is_none()
                || current.as_deref() == Some(DIAL_TONE)
                || current.as_deref() == Some(BUSY_TONE)
            {
                return;
            }
            self.finish();
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.sink.played()
    }

    pub fn count(&self, clip: &str) -> usize {
        self.played().iter().filter(|p| p.as_str() == clip).count()
    }
}
