//! Single-output arbitration between handset and base speaker.
//!
//! The effective route is the user's request unless something forces the base
//! speaker. Every change runs the click-free sequence: fade gains out, mute,
//! switch, load volume, unmute, publish gains.
use std::sync::Arc;
use std::time::Duration;

use exchange_traits::{ClipSink, Clock, Route, VolumeStore};

use crate::config::{GainCfg, RouteCfg};
use crate::gain::GainTargets;
use crate::hw_error::log_failure;
use crate::util::scale_percent;

/// Conditions that override the user's handset request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Forcing {
    pub alarm_active: bool,
    pub announcement_pending: bool,
}

/// Borrowed collaborators for one recompute.
pub struct RouteEnv<'a> {
    pub sink: &'a mut dyn ClipSink,
    pub volumes: &'a dyn VolumeStore,
    pub clock: &'a dyn Clock,
    pub night_mode: bool,
}

#[derive(Debug)]
pub struct OutputArbiter {
    cfg: RouteCfg,
    gain: GainCfg,
    targets: Arc<GainTargets>,
    handset_requested: bool,
    force_base: bool,
    applied: Option<Route>,
    fade: f32,
}

impl OutputArbiter {
    pub fn new(cfg: &RouteCfg, gain: &GainCfg, targets: Arc<GainTargets>) -> Self {
        Self {
            cfg: cfg.clone(),
            gain: gain.clone(),
            targets,
            handset_requested: false,
            force_base: false,
            applied: None,
            fade: 1.0,
        }
    }

    pub fn set_user_route(&mut self, handset: bool) {
        self.handset_requested = handset;
    }

    pub fn set_force_base(&mut self, on: bool) {
        self.force_base = on;
    }

    pub fn force_base(&self) -> bool {
        self.force_base
    }

    pub fn requested(&self) -> Route {
        if self.handset_requested {
            Route::Handset
        } else {
            Route::Speaker
        }
    }

    pub fn applied(&self) -> Option<Route> {
        self.applied
    }

    pub fn effective(&self, forcing: Forcing) -> Route {
        let forced = forcing.alarm_active || forcing.announcement_pending || self.force_base;
        if self.handset_requested && !forced {
            Route::Handset
        } else {
            Route::Speaker
        }
    }

    /// Alarm fade-in factor multiplied into the published gains.
    pub fn set_fade(&mut self, fade: f32) {
        self.fade = fade.clamp(0.0, 1.0);
        if let Some(route) = self.applied {
            self.publish(route);
        }
    }

    /// Volume for `route`: night mode scales the speaker unless an alarm rings.
    pub fn volume_for(&self, route: Route, volumes: &dyn VolumeStore, night: bool, alarm: bool) -> u8 {
        let base = volumes.get(route);
        if night && !alarm && route == Route::Speaker {
            scale_percent(base, self.cfg.night_volume_percent)
        } else {
            base
        }
    }

    /// Apply the effective route. Without a change only the volume is reloaded.
    pub fn recompute(&mut self, forcing: Forcing, env: RouteEnv<'_>) -> Route {
        let route = self.effective(forcing);
        if self.applied == Some(route) {
            let v = self.volume_for(route, env.volumes, env.night_mode, forcing.alarm_active);
            if let Err(e) = env.sink.set_volume(v) {
                log_failure("set_volume", e.as_ref());
            }
            return route;
        }
        self.switch(route, forcing, env);
        route
    }

    fn switch(&mut self, route: Route, forcing: Forcing, env: RouteEnv<'_>) {
        let mute_delay = Duration::from_millis(self.cfg.mute_delay_ms);

        self.targets.set(0.0, 0.0);
        env.clock.sleep(Duration::from_millis(
            u64::from(self.gain.ramp_ms) + self.cfg.fade_out_extra_ms,
        ));
        if let Err(e) = env.sink.mute(true) {
            log_failure("mute", e.as_ref());
        }
        env.clock.sleep(mute_delay);
        if let Err(e) = env.sink.set_route(route) {
            log_failure("set_route", e.as_ref());
        }
        let v = self.volume_for(route, env.volumes, env.night_mode, forcing.alarm_active);
        if let Err(e) = env.sink.set_volume(v) {
            log_failure("set_volume", e.as_ref());
        }
        env.clock.sleep(mute_delay);
        if let Err(e) = env.sink.mute(false) {
            log_failure("unmute", e.as_ref());
        }

        let from = self.applied.map(Route::as_str);
        self.applied = Some(route);
        self.publish(route);
        tracing::info!(from, to = route.as_str(), volume = v, "output route switched");
    }

    fn publish(&self, route: Route) {
        match route {
            Route::Handset => {
                self.targets.set(self.gain.left * self.fade, 0.0);
                self.targets.set_gate_enabled(self.gain.gate_on_handset);
            }
            Route::Speaker => {
                self.targets.set(0.0, self.gain.right * self.fade);
                self.targets.set_gate_enabled(false);
            }
        }
    }
}
