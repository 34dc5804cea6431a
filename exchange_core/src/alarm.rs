//! Daily alarms, countdown timers and snooze.
//!
//! At most one alarm rings at a time. A ringing alarm loops its clip until it
//! is dismissed or its ring time runs out; the scheduler only decides *what*
//! happens, the line state machine drives the sink and the router.
use exchange_traits::{AlarmStore, Assets, ClipSink, DayAlarm, Route, VolumeStore, WallTime};

use crate::config::AlarmCfg;
use crate::error::ExchangeError;
use crate::hw_error::log_failure;
use crate::util::minutes_to_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmSource {
    Timer,
    Daily,
}

impl AlarmSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmSource::Timer => "timer",
            AlarmSource::Daily => "daily",
        }
    }
}

/// A ringing alarm.
#[derive(Debug, Clone)]
pub struct AlarmContext {
    pub source: AlarmSource,
    pub started_ms: u64,
    pub end_ms: u64,
    pub clip: String,
    pub fade_active: bool,
    pub fade: f32,
    pub use_random_message: bool,
    /// Rings because a snooze ran out.
    pub snooze_origin: bool,
    silent_since_ms: Option<u64>,
}

/// A running countdown.
#[derive(Debug, Clone)]
pub struct TimerContext {
    pub end_ms: u64,
    pub minutes: u32,
    pub announcement_pending: bool,
    /// Silent snooze countdown rather than a dialed timer.
    pub snooze: bool,
    pub clip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCheck {
    Idle,
    Running,
    /// Expired while a daily alarm rings; retried next tick.
    Deferred,
    /// Expired and now ringing.
    Expired,
}

#[derive(Debug)]
pub struct AlarmScheduler {
    cfg: AlarmCfg,
    alarm: Option<AlarmContext>,
    timer: Option<TimerContext>,
    /// (year, day-of-year) of the last daily trigger.
    last_triggered: Option<(i32, u16)>,
    saved_volume: Option<u8>,
    alarms_enabled: bool,
    skip_next: bool,
}

impl AlarmScheduler {
    pub fn new(cfg: &AlarmCfg) -> Self {
        Self {
            cfg: cfg.clone(),
            alarm: None,
            timer: None,
            last_triggered: None,
            saved_volume: None,
            alarms_enabled: true,
            skip_next: false,
        }
    }

    pub fn cfg(&self) -> &AlarmCfg {
        &self.cfg
    }

    pub fn alarm(&self) -> Option<&AlarmContext> {
        self.alarm.as_ref()
    }

    pub fn timer(&self) -> Option<&TimerContext> {
        self.timer.as_ref()
    }

    pub fn is_ringing(&self) -> bool {
        self.alarm.is_some()
    }

    pub fn announcement_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.announcement_pending)
    }

    pub fn clear_announcement(&mut self) {
        if let Some(t) = self.timer.as_mut() {
            t.announcement_pending = false;
        }
    }

    pub fn snooze_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.snooze)
    }

    pub fn alarms_enabled(&self) -> bool {
        self.alarms_enabled
    }

    pub fn skip_next(&self) -> bool {
        self.skip_next
    }

    pub fn toggle_alarms(&mut self) -> bool {
        self.alarms_enabled = !self.alarms_enabled;
        tracing::info!(enabled = self.alarms_enabled, "daily alarms toggled");
        self.alarms_enabled
    }

    pub fn toggle_skip_next(&mut self) -> bool {
        self.skip_next = !self.skip_next;
        tracing::info!(skip = self.skip_next, "skip next alarm toggled");
        self.skip_next
    }

    /// Current fade factor, 1.0 when no fade is running.
    pub fn fade(&self) -> f32 {
        self.alarm
            .as_ref()
            .filter(|a| a.fade_active)
            .map_or(1.0, |a| a.fade)
    }

    /// Ringtone lookup: configured file, else first file in the ringtone folder,
    /// else the built-in fallback.
    pub fn resolve_ringtone(&self, configured: &str, assets: &dyn Assets) -> String {
        if !configured.is_empty() {
            let path = if configured.starts_with('/') {
                configured.to_string()
            } else {
                format!("{}/{}", self.cfg.ringtone_folder, configured)
            };
            if assets.exists(&path) {
                return path;
            }
            tracing::warn!(ringtone = %path, "ringtone missing");
        }
        let mut found = assets.list(&self.cfg.ringtone_folder);
        found.sort();
        if let Some(first) = found.into_iter().next() {
            return first;
        }
        self.cfg.fallback_ringtone.clone()
    }

    /// Fire today's alarm when the wall clock hits its minute. At most once per day.
    pub fn check_daily(
        &mut self,
        wall: Option<WallTime>,
        now_ms: u64,
        store: &dyn AlarmStore,
        assets: &dyn Assets,
    ) -> bool {
        let Some(t) = wall.filter(WallTime::is_plausible) else {
            return false;
        };
        if self.alarm.is_some() || !self.alarms_enabled {
            return false;
        }
        let today = (t.year, t.day_of_year);
        if self.last_triggered == Some(today) {
            return false;
        }
        let day = match store.get(t.weekday) {
            Ok(d) => d,
            Err(e) => {
                log_failure("alarm_store.get", e.as_ref());
                return false;
            }
        };
        if !day.active || day.hour != t.hour || day.minute != t.minute {
            return false;
        }
        self.last_triggered = Some(today);
        if self.skip_next {
            self.skip_next = false;
            tracing::info!(weekday = t.weekday, "daily alarm skipped once");
            return false;
        }
        let clip = self.resolve_ringtone(&day.ringtone, assets);
        tracing::info!(
            weekday = t.weekday,
            hour = t.hour,
            minute = t.minute,
            clip = %clip,
            "daily alarm"
        );
        self.alarm = Some(AlarmContext {
            source: AlarmSource::Daily,
            started_ms: now_ms,
            end_ms: now_ms + self.cfg.daily_ring_ms,
            clip,
            fade_active: day.ramp_enabled,
            fade: if day.ramp_enabled { self.cfg.fade_floor } else { 1.0 },
            use_random_message: day.use_random_message,
            snooze_origin: false,
            silent_since_ms: None,
        });
        true
    }

    /// Start a dialed countdown. The timer ringtone becomes the clip for its expiry.
    pub fn set_timer(
        &mut self,
        minutes: u32,
        now_ms: u64,
        assets: &dyn Assets,
    ) -> Result<(), ExchangeError> {
        let (min, max) = (self.cfg.timer_min_minutes, self.cfg.timer_max_minutes);
        if !(min..=max).contains(&minutes) {
            return Err(ExchangeError::TimerOutOfRange { minutes, min, max });
        }
        let clip = self.resolve_ringtone(&self.cfg.timer_ringtone, assets);
        self.timer = Some(TimerContext {
            end_ms: now_ms + minutes_to_ms(minutes),
            minutes,
            announcement_pending: true,
            snooze: false,
            clip,
        });
        tracing::info!(minutes, "timer set");
        Ok(())
    }

    /// Silent countdown that rings `clip` again after the snooze period.
    pub fn arm_snooze(&mut self, now_ms: u64, clip: String) {
        let minutes = self.cfg.snooze_minutes;
        self.timer = Some(TimerContext {
            end_ms: now_ms + minutes_to_ms(minutes),
            minutes,
            announcement_pending: false,
            snooze: true,
            clip,
        });
        tracing::info!(minutes, "snooze armed");
    }

    pub fn cancel_timer(&mut self) -> Option<TimerContext> {
        let t = self.timer.take();
        if let Some(t) = &t {
            tracing::info!(snooze = t.snooze, "timer cancelled");
        }
        t
    }

    pub fn check_timer(&mut self, now_ms: u64) -> TimerCheck {
        let Some(timer) = self.timer.as_ref() else {
            return TimerCheck::Idle;
        };
        if now_ms < timer.end_ms {
            return TimerCheck::Running;
        }
        if let Some(a) = &self.alarm {
            if a.source == AlarmSource::Daily {
                return TimerCheck::Deferred;
            }
            // a timer alarm already rings; replace it
        }
        let Some(timer) = self.timer.take() else {
            return TimerCheck::Idle;
        };
        tracing::info!(snooze = timer.snooze, clip = %timer.clip, "timer expired");
        self.alarm = Some(AlarmContext {
            source: AlarmSource::Timer,
            started_ms: now_ms,
            end_ms: now_ms + self.cfg.timer_ring_ms,
            clip: timer.clip,
            fade_active: false,
            fade: 1.0,
            use_random_message: false,
            snooze_origin: timer.snooze,
            silent_since_ms: None,
        });
        TimerCheck::Expired
    }

    /// Ring time bound reached.
    pub fn ring_time_elapsed(&self, now_ms: u64) -> bool {
        self.alarm.as_ref().is_some_and(|a| now_ms >= a.end_ms)
    }

    /// Advance the fade-in; returns the new factor while a fade runs.
    pub fn update_fade(&mut self, now_ms: u64) -> Option<f32> {
        let (fade_ms, floor) = (self.cfg.fade_ms.max(1), self.cfg.fade_floor);
        let a = self.alarm.as_mut().filter(|a| a.fade_active)?;
        let elapsed = now_ms.saturating_sub(a.started_ms);
        let f = (elapsed as f32 / fade_ms as f32).clamp(floor, 1.0);
        a.fade = f;
        if f >= 1.0 {
            a.fade_active = false;
            tracing::debug!("alarm fade-in complete");
        }
        Some(f)
    }

    /// True when the ringing alarm has been silent for a full retry interval.
    pub fn needs_retry(&mut self, now_ms: u64, playing: bool) -> bool {
        let retry_ms = self.cfg.retry_ms;
        let Some(a) = self.alarm.as_mut() else {
            return false;
        };
        if playing {
            a.silent_since_ms = None;
            return false;
        }
        match a.silent_since_ms {
            None => {
                a.silent_since_ms = Some(now_ms);
                false
            }
            Some(since) if now_ms.saturating_sub(since) >= retry_ms => {
                a.silent_since_ms = Some(now_ms);
                tracing::warn!(clip = %a.clip, "alarm playback stalled, retrying");
                true
            }
            Some(_) => false,
        }
    }

    /// (Re)start the alarm clip.
    pub fn play(&mut self, sink: &mut dyn ClipSink) {
        let Some(a) = self.alarm.as_mut() else {
            return;
        };
        a.silent_since_ms = None;
        if let Err(e) = sink.play(&a.clip) {
            log_failure("play", e.as_ref());
        }
    }

    /// Raise the speaker to the alarm volume when it sits below the floor.
    pub fn raise_volume(&mut self, volumes: &mut dyn VolumeStore) {
        if self.saved_volume.is_some() {
            return;
        }
        let current = volumes.get(Route::Speaker);
        if current < self.cfg.alarm_min_volume {
            self.saved_volume = Some(current);
            volumes.set(Route::Speaker, self.cfg.alarm_volume);
            tracing::debug!(from = current, to = self.cfg.alarm_volume, "alarm volume raised");
        }
    }

    /// End the ringing alarm and restore the saved volume, once.
    pub fn stop(&mut self, volumes: &mut dyn VolumeStore) -> Option<AlarmContext> {
        let ctx = self.alarm.take()?;
        if let Some(v) = self.saved_volume.take() {
            volumes.set(Route::Speaker, v);
            tracing::debug!(volume = v, "alarm volume restored");
        }
        tracing::info!(source = ctx.source.as_str(), "alarm stopped");
        Some(ctx)
    }

    /// Next enabled daily alarm strictly after `now`, looking one week ahead.
    pub fn next_alarm(&self, now: &WallTime, store: &dyn AlarmStore) -> Option<(u8, DayAlarm)> {
        if !self.alarms_enabled {
            return None;
        }
        let now_min = u16::from(now.hour) * 60 + u16::from(now.minute);
        for offset in 0..=7u8 {
            let weekday = (now.weekday + offset) % 7;
            let Ok(day) = store.get(weekday) else {
                continue;
            };
            if !day.active {
                continue;
            }
            let at = u16::from(day.hour) * 60 + u16::from(day.minute);
            let upcoming = match offset {
                0 => at > now_min,
                7 => at <= now_min,
                _ => true,
            };
            if upcoming {
                return Some((weekday, day));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MemoryAssets;
    use exchange_config::{FileAlarmStore, MemoryVolumeStore};

    fn wall(weekday: u8, hour: u8, minute: u8) -> WallTime {
        WallTime {
            year: 2025,
            month: 3,
            day: 3,
            weekday,
            day_of_year: 61,
            hour,
            minute,
            second: 0,
        }
    }

    fn store_with(weekday: u8, hour: u8, minute: u8) -> FileAlarmStore {
        let mut s = FileAlarmStore::in_memory();
        s.set(
            weekday,
            DayAlarm {
                hour,
                minute,
                active: true,
                ..DayAlarm::default()
            },
        )
        .unwrap();
        s
    }

    #[test]
    fn daily_fires_once_per_day() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let store = store_with(1, 7, 30);
        let assets = MemoryAssets::with(&["/ringtones/a.wav"]);
        assert!(!sch.check_daily(Some(wall(1, 7, 29)), 0, &store, &assets));
        assert!(sch.check_daily(Some(wall(1, 7, 30)), 0, &store, &assets));
        let clip = sch.stop(&mut MemoryVolumeStore::new(60, 70)).unwrap().clip;
        assert_eq!(clip, "/ringtones/a.wav");
        assert!(!sch.check_daily(Some(wall(1, 7, 30)), 1000, &store, &assets));
    }

    #[test]
    fn implausible_clock_never_fires() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let store = store_with(1, 7, 30);
        let assets = MemoryAssets::default();
        let t = WallTime {
            year: 1970,
            ..wall(1, 7, 30)
        };
        assert!(!sch.check_daily(Some(t), 0, &store, &assets));
        assert!(!sch.check_daily(None, 0, &store, &assets));
    }

    #[test]
    fn skip_next_consumes_one_day() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let store = store_with(1, 7, 30);
        let assets = MemoryAssets::default();
        sch.toggle_skip_next();
        assert!(!sch.check_daily(Some(wall(1, 7, 30)), 0, &store, &assets));
        assert!(!sch.skip_next());
        let next_week = WallTime {
            day_of_year: 68,
            ..wall(1, 7, 30)
        };
        assert!(sch.check_daily(Some(next_week), 0, &store, &assets));
    }

    #[test]
    fn ringtone_fallback_chain() {
        let sch = AlarmScheduler::new(&AlarmCfg::default());
        let assets = MemoryAssets::with(&["/ringtones/b.wav", "/ringtones/a.wav"]);
        assert_eq!(sch.resolve_ringtone("b.wav", &assets), "/ringtones/b.wav");
        assert_eq!(sch.resolve_ringtone("zzz.wav", &assets), "/ringtones/a.wav");
        let empty = MemoryAssets::default();
        assert_eq!(sch.resolve_ringtone("zzz.wav", &empty), "/system/fallback_alarm.wav");
    }

    #[test]
    fn fade_ramps_from_floor_to_full() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let store = store_with(1, 7, 30);
        let assets = MemoryAssets::default();
        assert!(sch.check_daily(Some(wall(1, 7, 30)), 1000, &store, &assets));
        assert_eq!(sch.update_fade(1000), Some(0.05));
        let mid = sch.update_fade(61_000).unwrap();
        assert!((mid - 0.5).abs() < 1e-6);
        assert_eq!(sch.update_fade(121_000), Some(1.0));
        assert_eq!(sch.update_fade(122_000), None);
        assert_eq!(sch.fade(), 1.0);
    }

    #[test]
    fn retry_only_after_silent_interval() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let store = store_with(1, 7, 30);
        let assets = MemoryAssets::default();
        sch.check_daily(Some(wall(1, 7, 30)), 0, &store, &assets);
        assert!(!sch.needs_retry(100, false));
        assert!(!sch.needs_retry(1500, false));
        assert!(!sch.needs_retry(1800, true));
        assert!(!sch.needs_retry(1900, false));
        assert!(!sch.needs_retry(3800, false));
        assert!(sch.needs_retry(3900, false));
    }

    #[test]
    fn timer_range_is_enforced() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let assets = MemoryAssets::default();
        assert!(matches!(
            sch.set_timer(0, 0, &assets),
            Err(ExchangeError::TimerOutOfRange { max: 500, .. })
        ));
        assert!(sch.set_timer(501, 0, &assets).is_err());
        assert!(sch.set_timer(500, 0, &assets).is_ok());
        assert!(sch.announcement_pending());
    }

    #[test]
    fn timer_expiry_deferred_while_daily_rings() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let store = store_with(1, 7, 30);
        let assets = MemoryAssets::default();
        sch.set_timer(1, 0, &assets).unwrap();
        assert!(sch.check_daily(Some(wall(1, 7, 30)), 10_000, &store, &assets));
        assert_eq!(sch.check_timer(60_000), TimerCheck::Deferred);
        assert_eq!(sch.alarm().unwrap().source, AlarmSource::Daily);
        sch.stop(&mut MemoryVolumeStore::new(60, 70));
        assert_eq!(sch.check_timer(60_100), TimerCheck::Expired);
        let a = sch.alarm().unwrap();
        assert_eq!(a.source, AlarmSource::Timer);
        assert_eq!(a.clip, "/system/fallback_alarm.wav");
        assert!(sch.timer().is_none());
    }

    #[test]
    fn volume_saved_and_restored_exactly_once() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let mut volumes = MemoryVolumeStore::new(60, 30);
        let store = store_with(1, 7, 30);
        let assets = MemoryAssets::default();
        sch.check_daily(Some(wall(1, 7, 30)), 0, &store, &assets);
        sch.raise_volume(&mut volumes);
        sch.raise_volume(&mut volumes);
        assert_eq!(volumes.get(Route::Speaker), 90);
        sch.stop(&mut volumes);
        assert_eq!(volumes.get(Route::Speaker), 30);
        volumes.set(Route::Speaker, 45);
        assert!(sch.stop(&mut volumes).is_none());
        assert_eq!(volumes.get(Route::Speaker), 45);
    }

    #[test]
    fn loud_speaker_is_left_alone() {
        let mut sch = AlarmScheduler::new(&AlarmCfg::default());
        let mut volumes = MemoryVolumeStore::new(60, 70);
        sch.raise_volume(&mut volumes);
        assert_eq!(volumes.get(Route::Speaker), 70);
    }

    #[test]
    fn next_alarm_looks_ahead_a_week() {
        let sch = AlarmScheduler::new(&AlarmCfg::default());
        let store = store_with(3, 6, 0);
        let (wd, a) = sch.next_alarm(&wall(1, 22, 0), &store).unwrap();
        assert_eq!((wd, a.hour), (3, 6));
        // same weekday, already past → next week
        let (wd, _) = sch.next_alarm(&wall(3, 7, 0), &store).unwrap();
        assert_eq!(wd, 3);
        let none = FileAlarmStore::in_memory();
        assert!(sch.next_alarm(&wall(3, 7, 0), &none).is_none());
    }
}
