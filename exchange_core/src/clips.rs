//! Logical prompts → clip paths, with missing-asset fallback.
use exchange_traits::{Assets, WallTime};

use crate::config::ClipCfg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    BusyTone,
    InvalidNumber,
    ErrorTone,
    HangupClick,
    Startup,
    SystemError,
    TimerSet,
    TimerInvalid,
    TimerMax,
    TimerDeleted,
    AlarmStopped,
    Minutes,
    Menu,
    NextAlarm,
    NoAlarm,
    NightOn,
    NightOff,
    AlarmsOn,
    AlarmsOff,
    AlarmSkipped,
    AlarmNotSkipped,
    PhonebookIntro,
    Status,
    TimerRunning,
}

impl Prompt {
    /// Tones are language independent wav files, everything else is spoken.
    fn file(self) -> (&'static str, bool) {
        match self {
            Prompt::BusyTone => ("busy_tone", false),
            Prompt::ErrorTone => ("error_tone", false),
            Prompt::HangupClick => ("hangup_click", false),
            Prompt::InvalidNumber => ("invalid_number", true),
            Prompt::Startup => ("system_ready", true),
            Prompt::SystemError => ("system_error", true),
            Prompt::TimerSet => ("timer_confirm", true),
            Prompt::TimerInvalid => ("timer_invalid", true),
            Prompt::TimerMax => ("timer_max", true),
            Prompt::TimerDeleted => ("timer_deleted", true),
            Prompt::AlarmStopped => ("alarm_stopped", true),
            Prompt::Minutes => ("minutes", true),
            Prompt::Menu => ("menu", true),
            Prompt::NextAlarm => ("next_alarm", true),
            Prompt::NoAlarm => ("no_alarm", true),
            Prompt::NightOn => ("night_on", true),
            Prompt::NightOff => ("night_off", true),
            Prompt::AlarmsOn => ("alarms_on", true),
            Prompt::AlarmsOff => ("alarms_off", true),
            Prompt::AlarmSkipped => ("alarm_skipped", true),
            Prompt::AlarmNotSkipped => ("alarm_not_skipped", true),
            Prompt::PhonebookIntro => ("phonebook", true),
            Prompt::Status => ("status", true),
            Prompt::TimerRunning => ("timer_running", true),
        }
    }
}

const DEFAULT_DIAL_TONE: &str = "dialtone_1.wav";

#[derive(Debug, Clone)]
pub struct ClipCatalog {
    cfg: ClipCfg,
}

impl ClipCatalog {
    pub fn new(cfg: &ClipCfg) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn path(&self, p: Prompt) -> String {
        let (name, spoken) = p.file();
        if spoken {
            format!("{}/{}_{}.mp3", self.cfg.system_dir, name, self.cfg.language)
        } else {
            format!("{}/{}.wav", self.cfg.system_dir, name)
        }
    }

    fn time_clip(&self, name: &str) -> String {
        format!("{}/{}/{}.mp3", self.cfg.time_dir, self.cfg.language, name)
    }

    /// Spoken cardinal number.
    pub fn number(&self, n: u32) -> String {
        self.time_clip(&n.to_string())
    }

    pub fn persona_folder(&self, category: u8) -> String {
        format!("{}{}", self.cfg.persona_prefix, category)
    }

    /// Configured dial tone unless it is missing or points at a spoken prompt.
    pub fn dial_tone(&self, assets: &dyn Assets) -> String {
        let fallback = format!("{}/{}", self.cfg.system_dir, DEFAULT_DIAL_TONE);
        let Some(custom) = self.cfg.dial_tone.as_deref() else {
            return fallback;
        };
        let looks_spoken = ["timer_", "menu_", "alarm_", "time/"]
            .iter()
            .any(|p| custom.contains(p));
        if looks_spoken || !assets.exists(custom) {
            tracing::warn!(dial_tone = custom, fallback = %fallback, "dial tone override rejected");
            return fallback;
        }
        custom.to_string()
    }

    /// `path` if present, else the error tone.
    pub fn resolve(&self, path: &str, assets: &dyn Assets) -> String {
        if assets.exists(path) {
            return path.to_string();
        }
        let fallback = self.path(Prompt::ErrorTone);
        tracing::warn!(missing = path, fallback = %fallback, "clip missing");
        fallback
    }

    /// Drop missing clips; an empty result degrades to the error tone.
    pub fn sequence(&self, clips: Vec<String>, assets: &dyn Assets) -> Vec<String> {
        let total = clips.len();
        let present: Vec<String> = clips.into_iter().filter(|c| assets.exists(c)).collect();
        if present.len() < total {
            tracing::warn!(missing = total - present.len(), "announcement clips missing");
        }
        if present.is_empty() {
            return vec![self.path(Prompt::ErrorTone)];
        }
        present
    }

    /// "It is 7 o'clock 5, today is Monday, 3 March 2025."
    pub fn time_announcement(&self, t: &WallTime) -> Vec<String> {
        let mut clips = vec![
            self.time_clip("intro"),
            self.time_clip(&format!("h_{}", t.hour)),
            self.time_clip("uhr"),
        ];
        if t.minute != 0 {
            clips.push(self.time_clip(&format!("m_{:02}", t.minute)));
        }
        clips.push(self.time_clip("date_intro"));
        clips.push(self.weekday(t.weekday));
        clips.push(self.time_clip(&format!("day_{}", t.day)));
        clips.push(self.time_clip(&format!("month_{}", t.month)));
        clips.push(self.time_clip(&format!("year_{}", t.year)));
        clips
    }

    /// Hour/minute pair as used by the next-alarm announcement.
    pub fn clock_time(&self, hour: u8, minute: u8) -> Vec<String> {
        let mut clips = vec![self.time_clip(&format!("h_{hour}")), self.time_clip("uhr")];
        if minute != 0 {
            clips.push(self.time_clip(&format!("m_{minute:02}")));
        }
        clips
    }

    pub fn weekday(&self, weekday: u8) -> String {
        self.time_clip(&format!("wday_{weekday}"))
    }
}
