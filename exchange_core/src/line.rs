//! Line state machine: hook, dialing, dispatch and the completion chain.
//!
//! Owns the prompt queue, the output arbiter and the alarm scheduler, and is
//! the only component that talks to the sink outside of a route switch.
use std::sync::Arc;

use exchange_traits::{
    AlarmStore, Assets, ClipSink, EntryKind, HookState, LineListener, NightSchedule,
    PhonebookLookup, Route, VolumeStore, WallClock, WallTime,
};

use crate::alarm::{AlarmScheduler, AlarmSource, TimerCheck};
use crate::arbiter::{Forcing, OutputArbiter, RouteEnv};
use crate::clips::{ClipCatalog, Prompt};
use crate::config::LineCfg;
use crate::error::ExchangeError;
use crate::hw_error::log_failure;
use crate::messages::MessageLibrary;
use crate::prompt::{Advance, PromptQueue};
use crate::pulse::PulseCounter;
use crate::status::{AlarmStatus, ExchangeStatus, LineState, TimerStatus};
use crate::util::Timebase;

/// External collaborators of the line.
pub struct Collaborators {
    pub sink: Box<dyn ClipSink>,
    pub phonebook: Box<dyn PhonebookLookup>,
    pub alarms: Box<dyn AlarmStore>,
    pub volumes: Box<dyn VolumeStore>,
    pub night: Box<dyn NightSchedule>,
    pub assets: Box<dyn Assets>,
    pub wall: Arc<dyn WallClock + Send + Sync>,
}

/// Digits collected since pickup (or, on-hook, since the first timer digit).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialSession {
    pub digits: String,
    pub last_digit_ms: Option<u64>,
    pub any_digit: bool,
    pub busy: bool,
    /// Pickup or last dial-tone start.
    pub since_ms: u64,
}

impl DialSession {
    fn push(&mut self, digit: u8, now_ms: u64) {
        self.digits.push(char::from(b'0' + digit));
        self.last_digit_ms = Some(now_ms);
        self.any_digit = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Idle,
    DialTone,
    BusyTone,
    Announcement,
    Message,
    Alarm,
}

/// What the next natural clip end leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Followup {
    None,
    Startup,
    MenuReannounce,
    RestoreRoute,
    HangupClick,
    BusyTone,
}

/// Built-in phonebook functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhonebookFunction {
    AnnounceTime,
    Persona(u8),
    PersonaMix,
    VoiceMenu,
    Reboot,
    SystemStatus,
    ToggleAlarms,
    SkipNextAlarm,
}

impl PhonebookFunction {
    pub fn parse(name: &str, parameter: &str) -> Option<Self> {
        Some(match name.trim() {
            "ANNOUNCE_TIME" | "SPEAK_TIME" => Self::AnnounceTime,
            "COMPLIMENT_CAT" => {
                let cat: u8 = parameter.trim().parse().ok()?;
                if !(1..=crate::messages::PERSONA_CATEGORIES).contains(&cat) {
                    return None;
                }
                Self::Persona(cat)
            }
            "COMPLIMENT_MIX" => Self::PersonaMix,
            "VOICE_MENU" => Self::VoiceMenu,
            "REBOOT" => Self::Reboot,
            "SYSTEM_STATUS" => Self::SystemStatus,
            "TOGGLE_ALARMS" => Self::ToggleAlarms,
            "SKIP_NEXT_ALARM" => Self::SkipNextAlarm,
            _ => return None,
        })
    }
}

/// Voice menu items, selected by a single digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    NextAlarm,
    NightMode,
    Phonebook,
    Diagnostics,
    ToggleAlarms,
    SkipNextAlarm,
}

impl MenuItem {
    pub fn from_digit(d: u8) -> Option<Self> {
        Some(match d {
            1 => Self::NextAlarm,
            2 => Self::NightMode,
            3 => Self::Phonebook,
            4 => Self::Diagnostics,
            5 => Self::ToggleAlarms,
            6 => Self::SkipNextAlarm,
            _ => return None,
        })
    }
}

const LISTED_NUMBERS_MAX: usize = 10;

pub struct LineStateMachine {
    cfg: LineCfg,
    io: Collaborators,
    time: Timebase,
    catalog: ClipCatalog,
    prompts: PromptQueue,
    arbiter: OutputArbiter,
    alarms: AlarmScheduler,
    messages: MessageLibrary,
    pulse: Option<PulseCounter>,
    listener: Option<Box<dyn LineListener>>,
    hook: HookState,
    session: DialSession,
    playback: Playback,
    followup: Followup,
    menu_active: bool,
    menu_reannounce_at: Option<u64>,
    night_scheduled: bool,
    night_override: Option<bool>,
    degraded: Option<String>,
    reboot_requested: bool,
}

impl LineStateMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: LineCfg,
        io: Collaborators,
        time: Timebase,
        catalog: ClipCatalog,
        arbiter: OutputArbiter,
        alarms: AlarmScheduler,
        messages: MessageLibrary,
        pulse: Option<PulseCounter>,
    ) -> Self {
        Self {
            cfg,
            io,
            time,
            catalog,
            prompts: PromptQueue::new(),
            arbiter,
            alarms,
            messages,
            pulse,
            listener: None,
            hook: HookState::OnHook,
            session: DialSession::default(),
            playback: Playback::Idle,
            followup: Followup::None,
            menu_active: false,
            menu_reannounce_at: None,
            night_scheduled: false,
            night_override: None,
            degraded: None,
            reboot_requested: false,
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn LineListener>) {
        self.listener = Some(listener);
    }

    /// Run without phonebook/alarm handling; pickup only reports the fault.
    pub fn set_degraded(&mut self, reason: String) {
        tracing::warn!(reason = %reason, "entering degraded mode");
        self.degraded = Some(reason);
    }

    pub fn sink_mut(&mut self) -> &mut dyn ClipSink {
        self.io.sink.as_mut()
    }

    pub fn reboot_requested(&self) -> bool {
        self.reboot_requested
    }

    pub fn now_ms(&self) -> u64 {
        self.time.now_ms()
    }

    /// Boot: apply the speaker route and play the startup sequence on it.
    pub fn start(&mut self) {
        self.arbiter.set_user_route(false);
        self.arbiter.set_force_base(true);
        self.refresh_night();
        self.reroute();
        let mut clips = vec![self.catalog.path(Prompt::Startup)];
        if self.degraded.is_some() {
            clips.push(self.catalog.path(Prompt::SystemError));
        }
        if !self.announce(clips, Followup::Startup) {
            self.finish_startup();
        }
        tracing::info!(degraded = self.degraded.is_some(), "exchange started");
    }

    // ── Events ───────────────────────────────────────────────────────────────

    pub fn on_hook(&mut self, state: HookState) {
        if state == self.hook {
            return;
        }
        self.hook = state;
        if let Some(l) = self.listener.as_mut() {
            l.on_hook(state);
        }
        match state {
            HookState::OffHook => self.pickup(),
            HookState::OnHook => self.hang_up(),
        }
    }

    pub fn on_digit(&mut self, digit: u8) {
        if let Some(l) = self.listener.as_mut() {
            l.on_digit(digit);
        }
        if self.degraded.is_some() {
            tracing::debug!(digit, "digit ignored in degraded mode");
            return;
        }
        if self.alarms.is_ringing() {
            tracing::debug!(digit, "digit ignored while alarm rings");
            return;
        }
        let now = self.now_ms();
        if self.hook == HookState::OnHook {
            self.session.push(digit, now);
            tracing::info!(digit, buffer = %self.session.digits, "timer digit");
            return;
        }
        if self.session.busy {
            tracing::debug!(digit, "digit ignored on busy line");
            return;
        }
        if self.playback == Playback::DialTone {
            self.stop_audio();
        }
        if self.menu_active
            && self.session.digits.is_empty()
            && digit <= self.cfg.menu_items
            && let Some(item) = MenuItem::from_digit(digit)
        {
            self.stop_audio();
            self.menu_reannounce_at = None;
            self.session.any_digit = true;
            self.run_menu_item(item);
            return;
        }
        self.session.push(digit, now);
        tracing::info!(digit, buffer = %self.session.digits, "digit");
    }

    pub fn on_button(&mut self) {
        if let Some(l) = self.listener.as_mut() {
            l.on_button();
        }
        if self.degraded.is_some() {
            let clips = self.diagnostics_clips();
            self.announce(clips, Followup::None);
            return;
        }
        let now = self.now_ms();
        if self.alarms.is_ringing() {
            if let Some(ctx) = self.alarms.stop(self.io.volumes.as_mut()) {
                self.stop_audio();
                self.arbiter.set_fade(1.0);
                match ctx.source {
                    AlarmSource::Daily => self.alarms.arm_snooze(now, ctx.clip),
                    AlarmSource::Timer => {
                        self.alarms.cancel_timer();
                    }
                }
                tracing::info!(source = ctx.source.as_str(), "alarm dismissed by button");
            }
            self.reroute();
            self.settle();
            return;
        }
        if self.io.sink.is_playing() || self.prompts.is_active() {
            self.stop_audio();
            self.alarms.clear_announcement();
            self.followup = Followup::None;
            self.reroute();
            self.settle();
            tracing::info!("playback interrupted by button");
            return;
        }
        let clips = match self.io.wall.wall_now().filter(WallTime::is_plausible) {
            Some(t) => self.catalog.time_announcement(&t),
            None => vec![self.catalog.path(Prompt::ErrorTone)],
        };
        self.announce(clips, Followup::None);
    }

    /// Completion chain. Only the first matching continuation runs.
    pub fn on_clip_finished(&mut self) {
        let now = self.now_ms();

        if self.prompts.is_active()
            && let Advance::Next(clip) = self.prompts.on_clip_finished(self.io.sink.as_mut())
        {
            tracing::trace!(clip = %clip, "announcement continues");
            return;
        }

        if self.followup == Followup::Startup {
            self.finish_startup();
            return;
        }

        if self.alarms.announcement_pending() {
            self.alarms.clear_announcement();
            self.reroute();
            self.settle();
            return;
        }

        if self.followup == Followup::MenuReannounce && self.menu_active && self.off_hook() {
            self.followup = Followup::None;
            self.playback = Playback::Idle;
            self.menu_reannounce_at = Some(now + self.cfg.menu_reannounce_ms);
            return;
        }

        if self.followup == Followup::RestoreRoute {
            self.followup = Followup::None;
            self.arbiter.set_force_base(false);
            self.reroute();
            if self.off_hook() {
                self.enter_dial_tone(now);
            } else {
                self.settle();
            }
            return;
        }

        if self.alarms.is_ringing() {
            self.alarms.play(self.io.sink.as_mut());
            self.playback = Playback::Alarm;
            return;
        }

        if self.followup == Followup::HangupClick && self.off_hook() {
            let click = self.catalog.resolve(
                &self.catalog.path(Prompt::HangupClick),
                self.io.assets.as_ref(),
            );
            self.play_clip(&click, Playback::Announcement);
            self.followup = Followup::BusyTone;
            return;
        }

        if self.off_hook() && (self.followup == Followup::BusyTone || self.session.busy) {
            self.followup = Followup::None;
            self.enter_busy();
            return;
        }

        if self.off_hook() && self.playback == Playback::DialTone {
            let tone = self.catalog.dial_tone(self.io.assets.as_ref());
            self.play_clip(&tone, Playback::DialTone);
            return;
        }

        self.settle();
    }

    /// Periodic work between events: alarms, timers, fades, dial and busy timeouts.
    pub fn housekeeping(&mut self) {
        let now = self.now_ms();
        self.refresh_night();

        if self.degraded.is_none() {
            let wall = self.io.wall.wall_now();
            if self
                .alarms
                .check_daily(wall, now, self.io.alarms.as_ref(), self.io.assets.as_ref())
            {
                self.begin_ringing();
            }
            match self.alarms.check_timer(now) {
                TimerCheck::Expired => self.begin_ringing(),
                TimerCheck::Deferred => tracing::trace!("timer expiry deferred"),
                TimerCheck::Idle | TimerCheck::Running => {}
            }
            if self.alarms.ring_time_elapsed(now) {
                tracing::info!("alarm ring time elapsed");
                self.end_ringing();
            }
            if let Some(f) = self.alarms.update_fade(now) {
                self.arbiter.set_fade(f);
            }
            let playing = self.io.sink.is_playing();
            if self.alarms.needs_retry(now, playing) {
                self.alarms.play(self.io.sink.as_mut());
                self.playback = Playback::Alarm;
            }
        }

        let new_pulse = self.pulse.as_ref().is_some_and(PulseCounter::take_new_pulse);
        if new_pulse && self.playback == Playback::DialTone {
            tracing::debug!("dial tone interrupted by first pulse");
            self.stop_audio();
        }

        let pulse_train = self.pulse.as_ref().is_some_and(PulseCounter::is_dialing);
        if let Some(last) = self.session.last_digit_ms
            && !self.session.digits.is_empty()
            && now.saturating_sub(last) > self.cfg.inter_digit_ms
            && !pulse_train
        {
            self.dispatch(now);
        }

        if self.off_hook()
            && self.degraded.is_none()
            && !self.session.busy
            && !self.session.any_digit
            && !self.menu_active
            && self.followup == Followup::None
            && matches!(self.playback, Playback::DialTone | Playback::Idle)
            && !self.alarms.is_ringing()
            && !self.alarms.snooze_pending()
            && now.saturating_sub(self.session.since_ms) > self.cfg.busy_timeout_ms
        {
            tracing::info!("no dialing after pickup, busy");
            self.stop_audio();
            self.enter_busy();
        }

        if let Some(at) = self.menu_reannounce_at
            && now >= at
        {
            self.menu_reannounce_at = None;
            if self.off_hook() && self.menu_active {
                let menu = self.catalog.path(Prompt::Menu);
                self.announce(vec![menu], Followup::None);
            }
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    fn pickup(&mut self) {
        let now = self.now_ms();
        tracing::info!("off hook");
        self.session = DialSession {
            since_ms: now,
            ..DialSession::default()
        };
        self.menu_active = false;
        self.menu_reannounce_at = None;
        self.followup = Followup::None;
        self.alarms.clear_announcement();
        self.arbiter.set_user_route(true);
        // Lifting the handset overrides a boot or error announcement on the base.
        self.arbiter.set_force_base(false);

        if self.degraded.is_some() {
            self.reroute();
            let err = self.catalog.path(Prompt::SystemError);
            self.announce(vec![err], Followup::None);
            return;
        }

        if self.alarms.is_ringing() {
            let Some(ctx) = self.alarms.stop(self.io.volumes.as_mut()) else {
                return;
            };
            self.stop_audio();
            self.arbiter.set_fade(1.0);
            match ctx.source {
                AlarmSource::Timer => {
                    self.alarms.cancel_timer();
                    self.arbiter.set_force_base(true);
                    self.reroute();
                    let feedback = if ctx.snooze_origin {
                        Prompt::AlarmStopped
                    } else {
                        Prompt::TimerDeleted
                    };
                    let clip = self.catalog.path(feedback);
                    if !self.announce(vec![clip], Followup::RestoreRoute) {
                        self.arbiter.set_force_base(false);
                        self.reroute();
                    }
                    tracing::info!(snooze_origin = ctx.snooze_origin, "timer alarm deleted on pickup");
                }
                AlarmSource::Daily => {
                    let message = ctx.use_random_message;
                    self.alarms.arm_snooze(now, ctx.clip);
                    self.reroute();
                    if message
                        && let Some(clip) =
                            self.messages.pick(None, &self.catalog, self.io.assets.as_ref())
                    {
                        self.play_clip(&clip, Playback::Message);
                    } else {
                        self.settle();
                    }
                    tracing::info!("daily alarm snoozed on pickup");
                }
            }
            return;
        }

        self.reroute();
        self.enter_dial_tone(now);
    }

    fn hang_up(&mut self) {
        tracing::info!("on hook");
        self.prompts.clear();
        if !self.alarms.is_ringing() {
            if let Err(e) = self.io.sink.stop() {
                log_failure("stop", e.as_ref());
            }
            self.playback = Playback::Idle;
            self.amplifier(false);
        }
        self.menu_active = false;
        self.menu_reannounce_at = None;
        self.followup = Followup::None;
        self.arbiter.set_force_base(false);
        self.session = DialSession::default();
        if self.alarms.snooze_pending() {
            self.alarms.cancel_timer();
            tracing::info!("snooze cancelled on hang-up");
        }
        self.arbiter.set_user_route(false);
        self.reroute();
    }

    fn dispatch(&mut self, now: u64) {
        let number = std::mem::take(&mut self.session.digits);
        self.session.last_digit_ms = None;
        tracing::info!(number = %number, hook = ?self.hook, menu = self.menu_active, "dispatch");
        match self.hook {
            HookState::OnHook => self.dispatch_timer(&number, now),
            HookState::OffHook if self.menu_active => self.dispatch_menu(&number),
            HookState::OffHook => self.dispatch_number(&number),
        }
    }

    fn dispatch_timer(&mut self, number: &str, now: u64) {
        let (min, max) = (
            self.alarms.cfg().timer_min_minutes,
            self.alarms.cfg().timer_max_minutes,
        );
        let parsed = number.parse::<u32>().ok().filter(|_| number.len() <= 3);
        let outcome = match parsed {
            Some(m) => self
                .alarms
                .set_timer(m, now, self.io.assets.as_ref())
                .map(|()| m),
            None => Err(ExchangeError::TimerOutOfRange {
                minutes: number.parse().unwrap_or(u32::MAX),
                min,
                max,
            }),
        };
        match outcome {
            Ok(m) => {
                self.reroute();
                let clips = vec![
                    self.catalog.path(Prompt::TimerSet),
                    self.catalog.number(m),
                    self.catalog.path(Prompt::Minutes),
                ];
                if !self.announce(clips, Followup::None) {
                    self.alarms.clear_announcement();
                    self.reroute();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, number, "timer rejected");
                self.arbiter.set_force_base(true);
                self.reroute();
                let clips = vec![
                    self.catalog.path(Prompt::TimerInvalid),
                    self.catalog.path(Prompt::TimerMax),
                    self.catalog.number(max),
                    self.catalog.path(Prompt::Minutes),
                ];
                self.announce(clips, Followup::RestoreRoute);
            }
        }
    }

    fn dispatch_menu(&mut self, number: &str) {
        let item = number
            .parse::<u8>()
            .ok()
            .filter(|d| number.len() == 1 && *d <= self.cfg.menu_items)
            .and_then(MenuItem::from_digit);
        match item {
            Some(item) => self.run_menu_item(item),
            None => {
                tracing::info!(number, "invalid menu choice");
                let err = self.catalog.path(Prompt::InvalidNumber);
                self.announce(vec![err], Followup::MenuReannounce);
            }
        }
    }

    fn dispatch_number(&mut self, number: &str) {
        let Some(entry) = self.io.phonebook.find(number) else {
            tracing::info!(number, "unknown number");
            let msg = self.catalog.path(Prompt::InvalidNumber);
            self.announce(vec![msg], Followup::BusyTone);
            return;
        };
        tracing::info!(number, name = %entry.name, kind = ?entry.kind, "calling");
        match entry.kind {
            EntryKind::Speech => {
                self.prompts.clear();
                self.amplifier(true);
                match self.io.sink.speak(&entry.value) {
                    Ok(()) => {
                        self.playback = Playback::Message;
                        self.followup = Followup::HangupClick;
                    }
                    Err(e) => {
                        log_failure("speak", e.as_ref());
                        self.error_then_busy();
                    }
                }
            }
            EntryKind::Audio => {
                let clip = self.catalog.resolve(&entry.value, self.io.assets.as_ref());
                if self.play_clip(&clip, Playback::Message) {
                    self.followup = Followup::HangupClick;
                }
            }
            EntryKind::Function => match PhonebookFunction::parse(&entry.value, &entry.parameter) {
                Some(f) => self.run_function(f),
                None => {
                    tracing::warn!(function = %entry.value, "unknown phonebook function");
                    self.error_then_busy();
                }
            },
        }
    }

    fn run_function(&mut self, f: PhonebookFunction) {
        match f {
            PhonebookFunction::AnnounceTime => {
                match self.io.wall.wall_now().filter(WallTime::is_plausible) {
                    Some(t) => {
                        let clips = self.catalog.time_announcement(&t);
                        self.announce(clips, Followup::HangupClick);
                    }
                    None => {
                        tracing::warn!("time unavailable");
                        self.error_then_busy();
                    }
                }
            }
            PhonebookFunction::Persona(cat) => self.play_message(Some(cat)),
            PhonebookFunction::PersonaMix => self.play_message(None),
            PhonebookFunction::VoiceMenu => {
                self.menu_active = true;
                let menu = self.catalog.path(Prompt::Menu);
                self.announce(vec![menu], Followup::None);
            }
            PhonebookFunction::Reboot => {
                tracing::warn!("reboot requested");
                self.reboot_requested = true;
                self.stop_audio();
                if let Some(l) = self.listener.as_mut() {
                    l.on_reboot_requested();
                }
            }
            PhonebookFunction::SystemStatus => {
                let clips = self.diagnostics_clips();
                self.announce(clips, Followup::HangupClick);
            }
            PhonebookFunction::ToggleAlarms => {
                let on = self.alarms.toggle_alarms();
                let p = if on { Prompt::AlarmsOn } else { Prompt::AlarmsOff };
                let clip = self.catalog.path(p);
                self.announce(vec![clip], Followup::HangupClick);
            }
            PhonebookFunction::SkipNextAlarm => {
                let skip = self.alarms.toggle_skip_next();
                let p = if skip {
                    Prompt::AlarmSkipped
                } else {
                    Prompt::AlarmNotSkipped
                };
                let clip = self.catalog.path(p);
                self.announce(vec![clip], Followup::HangupClick);
            }
        }
    }

    fn run_menu_item(&mut self, item: MenuItem) {
        tracing::info!(item = ?item, "menu action");
        let clips = match item {
            MenuItem::NextAlarm => {
                let next = self
                    .io
                    .wall
                    .wall_now()
                    .filter(WallTime::is_plausible)
                    .and_then(|t| self.alarms.next_alarm(&t, self.io.alarms.as_ref()));
                match next {
                    Some((weekday, day)) => {
                        let mut clips = vec![
                            self.catalog.path(Prompt::NextAlarm),
                            self.catalog.weekday(weekday),
                        ];
                        clips.extend(self.catalog.clock_time(day.hour, day.minute));
                        clips
                    }
                    None => vec![self.catalog.path(Prompt::NoAlarm)],
                }
            }
            MenuItem::NightMode => {
                let on = !self.night_mode();
                self.night_override = Some(on);
                self.reroute();
                let p = if on { Prompt::NightOn } else { Prompt::NightOff };
                vec![self.catalog.path(p)]
            }
            MenuItem::Phonebook => {
                let mut clips = vec![self.catalog.path(Prompt::PhonebookIntro)];
                for number in self.io.phonebook.numbers().iter().take(LISTED_NUMBERS_MAX) {
                    clips.extend(
                        number
                            .chars()
                            .filter_map(|c| c.to_digit(10))
                            .map(|d| self.catalog.number(d)),
                    );
                }
                clips
            }
            MenuItem::Diagnostics => self.diagnostics_clips(),
            MenuItem::ToggleAlarms => {
                let on = self.alarms.toggle_alarms();
                let p = if on { Prompt::AlarmsOn } else { Prompt::AlarmsOff };
                vec![self.catalog.path(p)]
            }
            MenuItem::SkipNextAlarm => {
                let skip = self.alarms.toggle_skip_next();
                let p = if skip {
                    Prompt::AlarmSkipped
                } else {
                    Prompt::AlarmNotSkipped
                };
                vec![self.catalog.path(p)]
            }
        };
        self.announce(clips, Followup::MenuReannounce);
    }

    fn diagnostics_clips(&self) -> Vec<String> {
        let mut clips = vec![self.catalog.path(Prompt::Status)];
        if self.degraded.is_some() {
            clips.push(self.catalog.path(Prompt::SystemError));
        }
        clips.push(self.catalog.path(if self.alarms.alarms_enabled() {
            Prompt::AlarmsOn
        } else {
            Prompt::AlarmsOff
        }));
        clips.push(self.catalog.path(if self.night_mode() {
            Prompt::NightOn
        } else {
            Prompt::NightOff
        }));
        if let Some(t) = self.alarms.timer().filter(|t| !t.snooze) {
            let left_ms = t.end_ms.saturating_sub(self.now_ms());
            let minutes = left_ms.div_ceil(crate::util::MILLIS_PER_MINUTE);
            clips.push(self.catalog.path(Prompt::TimerRunning));
            clips.push(self.catalog.number(minutes as u32));
            clips.push(self.catalog.path(Prompt::Minutes));
        }
        clips
    }

    fn play_message(&mut self, category: Option<u8>) {
        match self
            .messages
            .pick(category, &self.catalog, self.io.assets.as_ref())
        {
            Some(clip) => {
                if self.play_clip(&clip, Playback::Message) {
                    self.followup = Followup::HangupClick;
                }
            }
            None => self.error_then_busy(),
        }
    }

    fn begin_ringing(&mut self) {
        self.stop_audio();
        self.followup = Followup::None;
        self.menu_reannounce_at = None;
        self.alarms.raise_volume(self.io.volumes.as_mut());
        self.arbiter.set_fade(self.alarms.fade());
        self.reroute();
        self.amplifier(true);
        self.alarms.play(self.io.sink.as_mut());
        self.playback = Playback::Alarm;
    }

    fn end_ringing(&mut self) {
        if self.alarms.stop(self.io.volumes.as_mut()).is_none() {
            return;
        }
        self.stop_audio();
        self.arbiter.set_fade(1.0);
        self.reroute();
        self.settle();
    }

    fn finish_startup(&mut self) {
        self.followup = Followup::None;
        self.arbiter.set_force_base(false);
        self.reroute();
        self.settle();
    }

    fn enter_dial_tone(&mut self, now: u64) {
        self.session.since_ms = now;
        let tone = self.catalog.dial_tone(self.io.assets.as_ref());
        self.play_clip(&tone, Playback::DialTone);
    }

    fn enter_busy(&mut self) {
        self.session.busy = true;
        let tone = self.catalog.resolve(
            &self.catalog.path(Prompt::BusyTone),
            self.io.assets.as_ref(),
        );
        self.play_clip(&tone, Playback::BusyTone);
    }

    fn error_then_busy(&mut self) {
        let err = self.catalog.path(Prompt::ErrorTone);
        self.announce(vec![err], Followup::BusyTone);
    }

    // ── Output helpers ───────────────────────────────────────────────────────

    fn forcing(&self) -> Forcing {
        Forcing {
            alarm_active: self.alarms.is_ringing(),
            announcement_pending: self.alarms.announcement_pending(),
        }
    }

    fn reroute(&mut self) -> Route {
        let forcing = self.forcing();
        let night_mode = self.night_mode();
        let env = RouteEnv {
            sink: self.io.sink.as_mut(),
            volumes: self.io.volumes.as_ref(),
            clock: self.time.clock(),
            night_mode,
        };
        self.arbiter.recompute(forcing, env)
    }

    /// Start a multi-clip announcement; missing clips are dropped.
    fn announce(&mut self, clips: Vec<String>, followup: Followup) -> bool {
        let seq = self.catalog.sequence(clips, self.io.assets.as_ref());
        self.amplifier(true);
        if self.prompts.start(seq, self.io.sink.as_mut()) {
            self.playback = Playback::Announcement;
            self.followup = followup;
            true
        } else {
            self.settle();
            false
        }
    }

    fn play_clip(&mut self, path: &str, kind: Playback) -> bool {
        self.prompts.clear();
        self.amplifier(true);
        match self.io.sink.play(path) {
            Ok(()) => {
                self.playback = kind;
                true
            }
            Err(e) => {
                log_failure("play", e.as_ref());
                self.playback = Playback::Idle;
                false
            }
        }
    }

    fn stop_audio(&mut self) {
        self.prompts.clear();
        if let Err(e) = self.io.sink.stop() {
            log_failure("stop", e.as_ref());
        }
        self.playback = Playback::Idle;
    }

    fn settle(&mut self) {
        self.playback = Playback::Idle;
        self.followup = Followup::None;
        if self.off_hook() {
            // The busy timeout counts from the end of the last audio.
            self.session.since_ms = self.now_ms();
        }
        if !self.alarms.is_ringing() {
            self.amplifier(false);
        }
    }

    fn amplifier(&mut self, on: bool) {
        if let Err(e) = self.io.sink.set_amplifier(on) {
            log_failure("amplifier", e.as_ref());
        }
    }

    fn off_hook(&self) -> bool {
        self.hook.is_off_hook()
    }

    fn night_mode(&self) -> bool {
        self.night_override.unwrap_or(self.night_scheduled)
    }

    fn refresh_night(&mut self) {
        let Some(t) = self.io.wall.wall_now().filter(WallTime::is_plausible) else {
            return;
        };
        let scheduled = self.io.night.is_night_hour(t.hour);
        if scheduled != self.night_scheduled {
            self.night_scheduled = scheduled;
            self.night_override = None;
            tracing::info!(night = scheduled, "night schedule changed");
            self.reroute();
        }
    }

    // ── Snapshot ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> LineState {
        match self.hook {
            HookState::OnHook if self.session.digits.is_empty() => LineState::OnHookIdle,
            HookState::OnHook => LineState::OnHookCollectingTimerDigits,
            HookState::OffHook => {
                if self.session.busy {
                    LineState::OffHookBusy
                } else if self.menu_active {
                    LineState::OffHookVoiceMenu
                } else if !self.session.digits.is_empty() {
                    LineState::OffHookCollecting
                } else {
                    match self.playback {
                        Playback::DialTone => LineState::OffHookDialTone,
                        Playback::BusyTone => LineState::OffHookBusy,
                        Playback::Announcement | Playback::Message | Playback::Alarm => {
                            LineState::OffHookAnnouncementPlaying
                        }
                        Playback::Idle if self.session.any_digit => LineState::OffHookCollecting,
                        Playback::Idle => LineState::OffHookDialTone,
                    }
                }
            }
        }
    }

    pub fn status(&self) -> ExchangeStatus {
        let now = self.now_ms();
        ExchangeStatus {
            state: self.state(),
            hook: self.hook,
            requested_route: self.arbiter.requested(),
            effective_route: self.arbiter.effective(self.forcing()),
            dial_buffer: self.session.digits.clone(),
            alarm: self.alarms.alarm().map(|a| AlarmStatus {
                source: a.source,
                snooze_origin: a.snooze_origin,
                fade: if a.fade_active { a.fade } else { 1.0 },
                remaining_ms: a.end_ms.saturating_sub(now),
                clip: a.clip.clone(),
            }),
            timer: self.alarms.timer().map(|t| TimerStatus {
                minutes: t.minutes,
                remaining_ms: t.end_ms.saturating_sub(now),
                snooze: t.snooze,
                announcement_pending: t.announcement_pending,
            }),
            night_mode: self.night_mode(),
            alarms_enabled: self.alarms.alarms_enabled(),
            skip_next_alarm: self.alarms.skip_next(),
            degraded: self.degraded.clone(),
            reboot_requested: self.reboot_requested,
        }
    }
}
