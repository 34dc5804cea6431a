pub mod clock;

pub use clock::{Clock, ManualClock, ManualWallClock, MonotonicClock, SystemWallClock, WallClock, WallTime};

/// Boxed error used at every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Physical output path of the single audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Earpiece of the receiver (left channel).
    Handset,
    /// Base loudspeaker (right channel).
    Speaker,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Handset => "handset",
            Route::Speaker => "speaker",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookState {
    #[default]
    OnHook,
    OffHook,
}

impl HookState {
    pub fn is_off_hook(self) -> bool {
        matches!(self, HookState::OffHook)
    }
}

/// A single debounced-or-raw binary line (pulse contact, hook switch, button, mode contact).
pub trait DigitalInput {
    /// Current electrical level, `true` = high.
    fn level(&mut self) -> Result<bool, BoxError>;
}

/// Audio output device. Playback is asynchronous: `play` returns once the clip
/// started, completion is reported through the `on_finished` callback.
pub trait ClipSink {
    fn play(&mut self, path: &str) -> Result<(), BoxError>;
    fn stop(&mut self) -> Result<(), BoxError>;
    fn is_playing(&self) -> bool;
    /// Register the completion callback. Invoked once per clip that ends on its own.
    fn on_finished(&mut self, callback: Box<dyn Fn() + Send + Sync>);
    fn set_route(&mut self, route: Route) -> Result<(), BoxError>;
    /// Volume in percent (0..=100).
    fn set_volume(&mut self, volume: u8) -> Result<(), BoxError>;
    fn mute(&mut self, muted: bool) -> Result<(), BoxError>;

    /// Power the output amplifier. Sinks without a switchable amplifier ignore this.
    fn set_amplifier(&mut self, _on: bool) -> Result<(), BoxError> {
        Ok(())
    }

    /// Speak arbitrary text. Completion is reported like a clip.
    fn speak(&mut self, _text: &str) -> Result<(), BoxError> {
        Err("speech synthesis not available".into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Speech,
    Audio,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonebookEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Text, clip path or function name depending on `kind`.
    pub value: String,
    pub parameter: String,
}

pub trait PhonebookLookup {
    fn find(&self, number: &str) -> Option<PhonebookEntry>;
    /// All known numbers in ascending order.
    fn numbers(&self) -> Vec<String>;
}

/// Daily alarm slot for one weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAlarm {
    pub hour: u8,
    pub minute: u8,
    pub active: bool,
    pub ramp_enabled: bool,
    pub use_random_message: bool,
    /// Ringtone file name; empty selects the default.
    pub ringtone: String,
}

impl Default for DayAlarm {
    fn default() -> Self {
        Self {
            hour: 7,
            minute: 0,
            active: false,
            ramp_enabled: true,
            use_random_message: false,
            ringtone: String::new(),
        }
    }
}

/// Weekday indexed 0 = Sunday .. 6 = Saturday.
pub trait AlarmStore {
    fn get(&self, weekday: u8) -> Result<DayAlarm, BoxError>;
    fn set(&mut self, weekday: u8, alarm: DayAlarm) -> Result<(), BoxError>;
}

pub trait VolumeStore {
    fn get(&self, route: Route) -> u8;
    fn set(&mut self, route: Route, volume: u8);
}

pub trait NightSchedule {
    fn is_night_hour(&self, hour: u8) -> bool;
}

/// Read-only view on the clip storage.
pub trait Assets {
    fn exists(&self, path: &str) -> bool;
    /// Playable files directly inside `folder`, as full paths.
    fn list(&self, folder: &str) -> Vec<String>;
}

/// Observer for line activity. All methods default to no-ops.
pub trait LineListener {
    fn on_digit(&mut self, _digit: u8) {}
    fn on_hook(&mut self, _state: HookState) {}
    fn on_button(&mut self) {}
    fn on_reboot_requested(&mut self) {}
}
