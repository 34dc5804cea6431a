//! Read-only snapshot of the exchange for observers.

use exchange_traits::{HookState, Route};

use crate::alarm::AlarmSource;

/// Named line states, derived from hook state, dial session and playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    OnHookIdle,
    OnHookCollectingTimerDigits,
    OffHookDialTone,
    OffHookCollecting,
    OffHookBusy,
    OffHookVoiceMenu,
    OffHookAnnouncementPlaying,
}

impl LineState {
    pub fn as_str(self) -> &'static str {
        match self {
            LineState::OnHookIdle => "on_hook_idle",
            LineState::OnHookCollectingTimerDigits => "on_hook_collecting_timer_digits",
            LineState::OffHookDialTone => "off_hook_dial_tone",
            LineState::OffHookCollecting => "off_hook_collecting",
            LineState::OffHookBusy => "off_hook_busy",
            LineState::OffHookVoiceMenu => "off_hook_voice_menu",
            LineState::OffHookAnnouncementPlaying => "off_hook_announcement_playing",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlarmStatus {
    pub source: AlarmSource,
    pub snooze_origin: bool,
    pub fade: f32,
    pub remaining_ms: u64,
    pub clip: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerStatus {
    pub minutes: u32,
    pub remaining_ms: u64,
    pub snooze: bool,
    pub announcement_pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeStatus {
    pub state: LineState,
    pub hook: HookState,
    pub requested_route: Route,
    pub effective_route: Route,
    pub dial_buffer: String,
    pub alarm: Option<AlarmStatus>,
    pub timer: Option<TimerStatus>,
    pub night_mode: bool,
    pub alarms_enabled: bool,
    pub skip_next_alarm: bool,
    pub degraded: Option<String>,
    pub reboot_requested: bool,
}
