#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, phonebook parsing and file-backed stores for the exchange.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The phonebook CSV loader enforces headers and rejects malformed numbers.
//! - `FileAlarmStore` persists the weekly alarm table with an atomic rename.
use serde::Deserialize;

pub mod phonebook;
pub mod store;

pub use phonebook::{Phonebook, load_phonebook_csv, parse_phonebook_csv};
pub use store::{FileAlarmStore, HourRangeNightSchedule, MemoryVolumeStore, write_atomic};

/// GPIO numbers (BCM). Optional lines are simply not wired.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub pulse: u8,
    pub hook: u8,
    pub button: Option<u8>,
    pub mode: Option<u8>,
    pub amp_enable: Option<u8>,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            pulse: 5,
            hook: 6,
            button: Some(13),
            mode: None,
            amp_enable: Some(21),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DialStrategy {
    /// Digit completes after a quiet gap following the last pulse
    #[default]
    Timeout,
    /// Digit completes when the dial's off-normal contact releases
    Mode,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DialCfg {
    pub strategy: DialStrategy,
    pub pulse_debounce_ms: u64,
    /// Quiet gap closing a pulse train (timeout strategy)
    pub pulse_gap_ms: u64,
    pub mode_debounce_ms: u64,
    /// Pulse contact pulls the line low while closed
    pub pulse_active_low: bool,
    pub mode_active_low: bool,
}

impl Default for DialCfg {
    fn default() -> Self {
        Self {
            strategy: DialStrategy::Timeout,
            pulse_debounce_ms: 30,
            pulse_gap_ms: 500,
            mode_debounce_ms: 20,
            pulse_active_low: true,
            mode_active_low: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputsCfg {
    pub hook_debounce_ms: u64,
    pub button_debounce_ms: u64,
    /// Low level means off-hook
    pub hook_active_low: bool,
    /// Low level means pressed
    pub button_active_low: bool,
    /// Tick period of the input poller
    pub tick_ms: u64,
}

impl Default for InputsCfg {
    fn default() -> Self {
        Self {
            hook_debounce_ms: 50,
            button_debounce_ms: 50,
            hook_active_low: true,
            button_active_low: true,
            tick_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LineCfg {
    /// Silence after the last digit before the number is dispatched
    pub inter_digit_ms: u64,
    /// Off-hook without dialing before the busy tone
    pub busy_timeout_ms: u64,
    pub menu_reannounce_ms: u64,
    /// Highest valid voice-menu item
    pub menu_items: u8,
    /// Coordinator wait per loop iteration
    pub poll_ms: u64,
    /// Language suffix of the spoken clips ("de", "en")
    pub language: String,
    /// Optional dial tone override
    pub dial_tone: Option<String>,
}

impl Default for LineCfg {
    fn default() -> Self {
        Self {
            inter_digit_ms: 2000,
            busy_timeout_ms: 5000,
            menu_reannounce_ms: 200,
            menu_items: 6,
            poll_ms: 100,
            language: "de".to_string(),
            dial_tone: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioCfg {
    pub ramp_ms: u32,
    pub gain_left: f32,
    pub gain_right: f32,
    /// Peak below which the noise gate closes (i16 units)
    pub gate_threshold: i16,
    pub gate_floor: f32,
    pub gate_smooth: f32,
    pub gate_on_handset: bool,
    pub mute_delay_ms: u64,
    pub fade_out_extra_ms: u64,
}

impl Default for AudioCfg {
    fn default() -> Self {
        Self {
            ramp_ms: 40,
            gain_left: 0.5,
            gain_right: 0.5,
            gate_threshold: 700,
            gate_floor: 0.2,
            gate_smooth: 0.08,
            gate_on_handset: true,
            mute_delay_ms: 20,
            fade_out_extra_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VolumeCfg {
    pub handset: u8,
    pub speaker: u8,
    /// Speaker volume below this is raised while an alarm rings
    pub alarm_min: u8,
    pub alarm: u8,
}

impl Default for VolumeCfg {
    fn default() -> Self {
        Self {
            handset: 60,
            speaker: 70,
            alarm_min: 55,
            alarm: 90,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AlarmCfg {
    pub timer_min_minutes: u32,
    pub timer_max_minutes: u32,
    pub timer_ring_minutes: u32,
    pub daily_ring_minutes: u32,
    pub fade_ms: u64,
    pub fade_floor: f32,
    pub retry_ms: u64,
    pub snooze_minutes: u32,
    pub timer_ringtone: String,
    pub ringtone_folder: String,
    pub fallback_ringtone: String,
}

impl Default for AlarmCfg {
    fn default() -> Self {
        Self {
            timer_min_minutes: 1,
            timer_max_minutes: 500,
            timer_ring_minutes: 3,
            daily_ring_minutes: 5,
            fade_ms: 120_000,
            fade_floor: 0.05,
            retry_ms: 2000,
            snooze_minutes: 5,
            timer_ringtone: "standard_ringtone.wav".to_string(),
            ringtone_folder: "/ringtones".to_string(),
            fallback_ringtone: "/system/fallback_alarm.wav".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NightCfg {
    pub enabled: bool,
    pub start_hour: u8,
    pub end_hour: u8,
    /// Speaker volume share during night hours
    pub volume_percent: u8,
}

impl Default for NightCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            start_hour: 22,
            end_hour: 6,
            volume_percent: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AssetsCfg {
    /// Directory the clip paths are relative to
    pub root: String,
    pub phonebook: Option<String>,
    pub alarms: Option<String>,
    pub system_dir: String,
    pub time_dir: String,
    /// Persona folders are `<prefix><n>` for n = 1..=5
    pub persona_prefix: String,
}

impl Default for AssetsCfg {
    fn default() -> Self {
        Self {
            root: "./sd".to_string(),
            phonebook: None,
            alarms: None,
            system_dir: "/system".to_string(),
            time_dir: "/time".to_string(),
            persona_prefix: "/persona_0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub dial: DialCfg,
    pub inputs: InputsCfg,
    pub line: LineCfg,
    pub audio: AudioCfg,
    pub volume: VolumeCfg,
    pub alarm: AlarmCfg,
    pub night: NightCfg,
    pub assets: AssetsCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Dial
        if self.dial.pulse_debounce_ms == 0 || self.dial.pulse_debounce_ms > 100 {
            eyre::bail!("dial.pulse_debounce_ms must be in [1, 100]");
        }
        if !(200..=2000).contains(&self.dial.pulse_gap_ms) {
            eyre::bail!("dial.pulse_gap_ms must be in [200, 2000]");
        }
        if self.dial.pulse_gap_ms <= self.dial.pulse_debounce_ms {
            eyre::bail!("dial.pulse_gap_ms must exceed dial.pulse_debounce_ms");
        }
        if self.dial.strategy == DialStrategy::Mode && self.pins.mode.is_none() {
            eyre::bail!("dial.strategy = \"mode\" requires pins.mode");
        }

        // Inputs
        if self.inputs.tick_ms == 0 || self.inputs.tick_ms > 200 {
            eyre::bail!("inputs.tick_ms must be in [1, 200]");
        }
        if self.inputs.hook_debounce_ms > 1000 || self.inputs.button_debounce_ms > 1000 {
            eyre::bail!("inputs debounce windows must be <= 1000 ms");
        }

        // Line
        if self.line.inter_digit_ms < 500 {
            eyre::bail!("line.inter_digit_ms must be >= 500");
        }
        if self.line.inter_digit_ms <= self.dial.pulse_gap_ms {
            eyre::bail!("line.inter_digit_ms must exceed dial.pulse_gap_ms");
        }
        if self.line.busy_timeout_ms == 0 {
            eyre::bail!("line.busy_timeout_ms must be >= 1");
        }
        if !(1..=9).contains(&self.line.menu_items) {
            eyre::bail!("line.menu_items must be in [1, 9]");
        }
        if self.line.poll_ms == 0 || self.line.poll_ms > 1000 {
            eyre::bail!("line.poll_ms must be in [1, 1000]");
        }
        if self.line.language.is_empty() || !self.line.language.chars().all(|c| c.is_ascii_alphabetic()) {
            eyre::bail!("line.language must be a non-empty alphabetic code");
        }

        // Audio
        if self.audio.ramp_ms == 0 {
            eyre::bail!("audio.ramp_ms must be >= 1");
        }
        for (name, g) in [("gain_left", self.audio.gain_left), ("gain_right", self.audio.gain_right)] {
            if !(0.0..=1.0).contains(&g) {
                eyre::bail!("audio.{name} must be in [0.0, 1.0]");
            }
        }
        if self.audio.gate_threshold < 0 {
            eyre::bail!("audio.gate_threshold must be >= 0");
        }
        if !(0.0..=1.0).contains(&self.audio.gate_floor) {
            eyre::bail!("audio.gate_floor must be in [0.0, 1.0]");
        }
        if !(self.audio.gate_smooth > 0.0 && self.audio.gate_smooth <= 1.0) {
            eyre::bail!("audio.gate_smooth must be in (0.0, 1.0]");
        }

        // Volume
        for (name, v) in [
            ("handset", self.volume.handset),
            ("speaker", self.volume.speaker),
            ("alarm_min", self.volume.alarm_min),
            ("alarm", self.volume.alarm),
        ] {
            if v > 100 {
                eyre::bail!("volume.{name} must be <= 100");
            }
        }

        // Alarm
        if self.alarm.timer_min_minutes == 0 {
            eyre::bail!("alarm.timer_min_minutes must be >= 1");
        }
        if self.alarm.timer_max_minutes < self.alarm.timer_min_minutes {
            eyre::bail!("alarm.timer_max_minutes must be >= alarm.timer_min_minutes");
        }
        if self.alarm.timer_max_minutes > 999 {
            eyre::bail!("alarm.timer_max_minutes must fit three dialed digits (<= 999)");
        }
        if self.alarm.timer_ring_minutes == 0 || self.alarm.daily_ring_minutes == 0 {
            eyre::bail!("alarm ring durations must be >= 1 minute");
        }
        if !(self.alarm.fade_floor > 0.0 && self.alarm.fade_floor <= 1.0) {
            eyre::bail!("alarm.fade_floor must be in (0.0, 1.0]");
        }
        if self.alarm.retry_ms == 0 {
            eyre::bail!("alarm.retry_ms must be >= 1");
        }
        if !(1..=60).contains(&self.alarm.snooze_minutes) {
            eyre::bail!("alarm.snooze_minutes must be in [1, 60]");
        }
        if self.alarm.timer_ringtone.is_empty() {
            eyre::bail!("alarm.timer_ringtone must not be empty");
        }

        // Night
        if self.night.start_hour > 23 || self.night.end_hour > 23 {
            eyre::bail!("night hours must be in [0, 23]");
        }
        if self.night.volume_percent > 100 {
            eyre::bail!("night.volume_percent must be <= 100");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
