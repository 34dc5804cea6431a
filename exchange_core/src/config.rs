//! Runtime configuration for the exchange engine.
//!
//! These are the structs the components consume. They are separate from the
//! TOML-deserialized config in `exchange_config`; see `conversions`.

/// How a pulse train is declared complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// The dial's off-normal (mode) contact brackets the pulse train.
    ModeGated,
    /// No pulse for `gap_ms` closes the train.
    TimeoutGated { gap_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct PulseCfg {
    pub strategy: DecodeStrategy,
    /// Minimum spacing between two counted pulses.
    pub debounce_ms: u64,
    /// Contact pulls the line low while closed; pulses are counted on the high (released) level.
    pub pulse_active_low: bool,
    pub mode_active_low: bool,
    pub mode_debounce_ms: u64,
}

impl Default for PulseCfg {
    fn default() -> Self {
        Self {
            strategy: DecodeStrategy::TimeoutGated { gap_ms: 500 },
            debounce_ms: 30,
            pulse_active_low: true,
            mode_active_low: true,
            mode_debounce_ms: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputCfg {
    pub hook_debounce_ms: u64,
    pub button_debounce_ms: u64,
    pub hook_active_low: bool,
    pub button_active_low: bool,
    pub tick_ms: u64,
}

impl Default for InputCfg {
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

/// Gain envelope and noise gate parameters.
#[derive(Debug, Clone)]
pub struct GainCfg {
    pub ramp_ms: u32,
    pub left: f32,
    pub right: f32,
    pub gate_threshold: i16,
    pub gate_floor: f32,
    pub gate_smooth: f32,
    pub gate_on_handset: bool,
}

impl Default for GainCfg {
    fn default() -> Self {
        Self {
            ramp_ms: 40,
            left: 0.5,
            right: 0.5,
            gate_threshold: 700,
            gate_floor: 0.2,
            gate_smooth: 0.08,
            gate_on_handset: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteCfg {
    pub mute_delay_ms: u64,
    pub fade_out_extra_ms: u64,
    pub night_volume_percent: u8,
}

impl Default for RouteCfg {
    fn default() -> Self {
        Self {
            mute_delay_ms: 20,
            fade_out_extra_ms: 20,
            night_volume_percent: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlarmCfg {
    pub timer_min_minutes: u32,
    pub timer_max_minutes: u32,
    pub timer_ring_ms: u64,
    pub daily_ring_ms: u64,
    pub fade_ms: u64,
    pub fade_floor: f32,
    pub retry_ms: u64,
    pub snooze_minutes: u32,
    pub timer_ringtone: String,
    pub ringtone_folder: String,
    pub fallback_ringtone: String,
    pub alarm_min_volume: u8,
    pub alarm_volume: u8,
}

impl Default for AlarmCfg {
    fn default() -> Self {
        Self {
            timer_min_minutes: 1,
            timer_max_minutes: 500,
            timer_ring_ms: 3 * 60_000,
            daily_ring_ms: 5 * 60_000,
            fade_ms: 120_000,
            fade_floor: 0.05,
            retry_ms: 2000,
            snooze_minutes: 5,
            timer_ringtone: "standard_ringtone.wav".to_string(),
            ringtone_folder: "/ringtones".to_string(),
            fallback_ringtone: "/system/fallback_alarm.wav".to_string(),
            alarm_min_volume: 55,
            alarm_volume: 90,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LineCfg {
    pub inter_digit_ms: u64,
    pub busy_timeout_ms: u64,
    pub menu_reannounce_ms: u64,
    pub menu_items: u8,
    pub poll_ms: u64,
}

impl Default for LineCfg {
    fn default() -> Self {
        Self {
            inter_digit_ms: 2000,
            busy_timeout_ms: 5000,
            menu_reannounce_ms: 200,
            menu_items: 6,
            poll_ms: 100,
        }
    }
}

/// Where the prompt clips live.
#[derive(Debug, Clone)]
pub struct ClipCfg {
    pub language: String,
    pub system_dir: String,
    pub time_dir: String,
    pub persona_prefix: String,
    pub dial_tone: Option<String>,
}

impl Default for ClipCfg {
    fn default() -> Self {
        Self {
            language: "de".to_string(),
            system_dir: "/system".to_string(),
            time_dir: "/time".to_string(),
            persona_prefix: "/persona_0".to_string(),
            dial_tone: None,
        }
    }
}

/// Everything the engine needs, one struct per component.
#[derive(Debug, Clone, Default)]
pub struct ExchangeConfig {
    pub pulse: PulseCfg,
    pub input: InputCfg,
    pub gain: GainCfg,
    pub route: RouteCfg,
    pub alarm: AlarmCfg,
    pub line: LineCfg,
    pub clips: ClipCfg,
}
