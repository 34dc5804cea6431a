//! `From` implementations bridging `exchange_config` types to `exchange_core` types.

use crate::config::{
    AlarmCfg, ClipCfg, DecodeStrategy, ExchangeConfig, GainCfg, InputCfg, LineCfg, PulseCfg,
    RouteCfg,
};
use crate::util::minutes_to_ms;

// ── PulseCfg ─────────────────────────────────────────────────────────────────

impl From<&exchange_config::DialCfg> for PulseCfg {
    fn from(c: &exchange_config::DialCfg) -> Self {
        let strategy = match c.strategy {
            exchange_config::DialStrategy::Mode => DecodeStrategy::ModeGated,
            exchange_config::DialStrategy::Timeout => DecodeStrategy::TimeoutGated {
                gap_ms: c.pulse_gap_ms,
            },
        };
        Self {
            strategy,
            debounce_ms: c.pulse_debounce_ms,
            pulse_active_low: c.pulse_active_low,
            mode_active_low: c.mode_active_low,
            mode_debounce_ms: c.mode_debounce_ms,
        }
    }
}

// ── InputCfg ─────────────────────────────────────────────────────────────────

impl From<&exchange_config::InputsCfg> for InputCfg {
    fn from(c: &exchange_config::InputsCfg) -> Self {
        Self {
            hook_debounce_ms: c.hook_debounce_ms,
            button_debounce_ms: c.button_debounce_ms,
            hook_active_low: c.hook_active_low,
            button_active_low: c.button_active_low,
            tick_ms: c.tick_ms,
        }
    }
}

// ── GainCfg ──────────────────────────────────────────────────────────────────

impl From<&exchange_config::AudioCfg> for GainCfg {
    fn from(c: &exchange_config::AudioCfg) -> Self {
        Self {
            ramp_ms: c.ramp_ms,
            left: c.gain_left,
            right: c.gain_right,
            gate_threshold: c.gate_threshold,
            gate_floor: c.gate_floor,
            gate_smooth: c.gate_smooth,
            gate_on_handset: c.gate_on_handset,
        }
    }
}

// ── Whole config ─────────────────────────────────────────────────────────────

impl From<&exchange_config::Config> for ExchangeConfig {
    fn from(c: &exchange_config::Config) -> Self {
        Self {
            pulse: PulseCfg::from(&c.dial),
            input: InputCfg::from(&c.inputs),
            gain: GainCfg::from(&c.audio),
            route: RouteCfg {
                mute_delay_ms: c.audio.mute_delay_ms,
                fade_out_extra_ms: c.audio.fade_out_extra_ms,
                night_volume_percent: c.night.volume_percent,
            },
            alarm: AlarmCfg {
                timer_min_minutes: c.alarm.timer_min_minutes,
                timer_max_minutes: c.alarm.timer_max_minutes,
                timer_ring_ms: minutes_to_ms(c.alarm.timer_ring_minutes),
                daily_ring_ms: minutes_to_ms(c.alarm.daily_ring_minutes),
                fade_ms: c.alarm.fade_ms,
                fade_floor: c.alarm.fade_floor,
                retry_ms: c.alarm.retry_ms,
                snooze_minutes: c.alarm.snooze_minutes,
                timer_ringtone: c.alarm.timer_ringtone.clone(),
                ringtone_folder: c.alarm.ringtone_folder.clone(),
                fallback_ringtone: c.alarm.fallback_ringtone.clone(),
                alarm_min_volume: c.volume.alarm_min,
                alarm_volume: c.volume.alarm,
            },
            line: LineCfg {
                inter_digit_ms: c.line.inter_digit_ms,
                busy_timeout_ms: c.line.busy_timeout_ms,
                menu_reannounce_ms: c.line.menu_reannounce_ms,
                menu_items: c.line.menu_items,
                poll_ms: c.line.poll_ms,
            },
            clips: ClipCfg {
                language: c.line.language.clone(),
                system_dir: c.assets.system_dir.clone(),
                time_dir: c.assets.time_dir.clone(),
                persona_prefix: c.assets.persona_prefix.clone(),
                dial_tone: c.line.dial_tone.clone(),
            },
        }
    }
}
