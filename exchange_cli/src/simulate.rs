//! `exchange simulate`: replay a script of line events in virtual time.
//!
//! Script syntax, one command per line, `#` starts a comment:
//!
//! ```text
//! time 06:59 mon    # set the wall clock (weekday name or 0 = Sunday .. 6)
//! pickup
//! dial 110
//! wait 2500         # advance virtual time in milliseconds
//! finish            # let the clip that is playing end
//! button
//! hangup
//! ```
//!
//! The wall clock runs along with virtual time once set.

use crossbeam_channel as xch;
use std::sync::Arc;

use exchange_core::{
    Event, Exchange, ExchangeBuilder, ExchangeStatus, LineEvent, Missing, RunOutcome,
};
use exchange_hardware::{SimAction, SimEvent, SimOptions, SimulatedSink};
use exchange_traits::{HookState, ManualClock, ManualWallClock, WallTime};

/// Virtual time advanced per simulation tick.
const TICK_MS: u64 = 10;
/// Upper bound for `finish`.
const FINISH_LIMIT_MS: u64 = 10 * 60 * 1000;
const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Pickup,
    Hangup,
    Dial(Vec<u8>),
    Button,
    Wait(u64),
    Time { hour: u8, minute: u8, weekday: u8 },
    Finish,
}

fn parse_weekday(s: &str) -> Option<u8> {
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
    if let Ok(n) = s.parse::<u8>() {
        return (n < 7).then_some(n);
    }
    let lower = s.to_ascii_lowercase();
    NAMES
        .iter()
        .position(|n| lower.starts_with(n))
        .map(|i| i as u8)
}

fn parse_clock(s: &str) -> Option<(u8, u8)> {
    let (h, m) = s.split_once(':')?;
    let hour = h.parse::<u8>().ok().filter(|h| *h < 24)?;
    let minute = m.parse::<u8>().ok().filter(|m| *m < 60)?;
    Some((hour, minute))
}

pub fn parse_script(text: &str) -> eyre::Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        let cmd = words.next().unwrap_or("").to_ascii_lowercase();
        let arg = words.next();
        let step = match (cmd.as_str(), arg) {
            ("pickup", None) => Step::Pickup,
            ("hangup", None) => Step::Hangup,
            ("button", None) => Step::Button,
            ("finish", None) => Step::Finish,
            ("dial", Some(number)) => {
                if !number.bytes().all(|b| b.is_ascii_digit()) {
                    eyre::bail!("script line {line_no}: dial expects digits, got {number:?}");
                }
                Step::Dial(number.bytes().map(|b| b - b'0').collect())
            }
            ("wait", Some(ms)) => match ms.parse::<u64>() {
                Ok(ms) => Step::Wait(ms),
                Err(_) => eyre::bail!("script line {line_no}: wait expects milliseconds, got {ms:?}"),
            },
            ("time", Some(clock)) => {
                let Some((hour, minute)) = parse_clock(clock) else {
                    eyre::bail!("script line {line_no}: time expects HH:MM, got {clock:?}");
                };
                let weekday = match words.next() {
                    Some(w) => match parse_weekday(w) {
                        Some(d) => d,
                        None => eyre::bail!("script line {line_no}: unknown weekday {w:?}"),
                    },
                    None => 1,
                };
                Step::Time {
                    hour,
                    minute,
                    weekday,
                }
            }
            _ => eyre::bail!("script line {line_no}: cannot parse {line:?}"),
        };
        if let Some(extra) = words.next() {
            eyre::bail!("script line {line_no}: unexpected argument {extra:?}");
        }
        steps.push(step);
    }
    Ok(steps)
}

/// Wall time for a position in the week (seconds since Sunday 00:00).
/// Dates fall in the week of Sunday 2025-03-02.
pub fn week_time(secs: u64) -> WallTime {
    let secs = secs % (7 * SECS_PER_DAY);
    let weekday = (secs / SECS_PER_DAY) as u8;
    let rem = secs % SECS_PER_DAY;
    let day = 2 + weekday;
    WallTime {
        year: 2025,
        month: 3,
        day,
        weekday,
        // Jan + Feb = 59 days, 0-based
        day_of_year: 58 + u16::from(day),
        hour: (rem / 3600) as u8,
        minute: (rem % 3600 / 60) as u8,
        second: (rem % 60) as u8,
    }
}

pub struct Simulation {
    ex: Exchange,
    tx: xch::Sender<Event>,
    sink: SimulatedSink,
    clock: ManualClock,
    wall: ManualWallClock,
    /// (seconds into the week, virtual ms when set)
    anchor: Option<(u64, u64)>,
    outcome: Option<RunOutcome>,
}

/// What a simulation produced.
#[derive(Debug, Clone)]
pub struct SimReport {
    pub events: Vec<SimEvent>,
    pub status: ExchangeStatus,
    pub elapsed_ms: u64,
    pub reboot_requested: bool,
}

impl Simulation {
    pub fn new(builder: ExchangeBuilder<Missing>, opts: SimOptions) -> eyre::Result<Self> {
        let clock = ManualClock::new();
        let wall = ManualWallClock::new(None);
        let sink = SimulatedSink::new(Arc::new(clock.clone()), opts);
        let mut ex = builder
            .with_clock(Arc::new(clock.clone()))
            .with_wall_clock(Arc::new(wall.clone()))
            .with_sink(sink.clone())
            .build()?;
        let tx = ex.sender();
        ex.start();
        let mut sim = Self {
            ex,
            tx,
            sink,
            clock,
            wall,
            anchor: None,
            outcome: None,
        };
        sim.settle();
        Ok(sim)
    }

    fn now_ms(&self) -> u64 {
        self.ex.timebase().now_ms()
    }

    fn sync_wall(&self) {
        if let Some((secs, set_at)) = self.anchor {
            let elapsed = self.now_ms().saturating_sub(set_at) / 1000;
            self.wall.set(Some(week_time(secs + elapsed)));
        }
    }

    fn settle(&mut self) {
        self.sync_wall();
        self.sink.poll();
        self.ex.pump();
        if self.outcome.is_none() && self.ex.status().reboot_requested {
            tracing::info!(at_ms = self.now_ms(), "reboot requested, script stops");
            self.outcome = Some(RunOutcome::RebootRequested);
        }
    }

    fn tick(&mut self) {
        self.clock.advance_ms(TICK_MS);
        self.settle();
    }

    fn wait(&mut self, ms: u64) {
        let end = self.now_ms() + ms;
        while self.now_ms() < end && self.outcome.is_none() {
            self.tick();
        }
    }

    fn send(&mut self, ev: LineEvent) {
        // The receiver lives in `self.ex`.
        let _ = self.tx.send(Event::Line(ev));
        self.settle();
    }

    fn finished_count(&self) -> usize {
        self.sink
            .history()
            .iter()
            .filter(|e| matches!(e.action, SimAction::Finished(_)))
            .count()
    }

    fn finish(&mut self) {
        let before = self.finished_count();
        let end = self.now_ms() + FINISH_LIMIT_MS;
        while self.finished_count() == before && self.now_ms() < end && self.outcome.is_none() {
            self.tick();
        }
    }

    pub fn step(&mut self, step: &Step) {
        tracing::debug!(?step, at_ms = self.now_ms(), "script step");
        match step {
            Step::Pickup => self.send(LineEvent::Hook(HookState::OffHook)),
            Step::Hangup => self.send(LineEvent::Hook(HookState::OnHook)),
            Step::Button => self.send(LineEvent::ButtonPressed),
            Step::Dial(digits) => {
                for d in digits {
                    self.send(LineEvent::Digit(*d));
                }
            }
            Step::Wait(ms) => self.wait(*ms),
            Step::Time {
                hour,
                minute,
                weekday,
            } => {
                let secs = u64::from(*weekday) * SECS_PER_DAY
                    + u64::from(*hour) * 3600
                    + u64::from(*minute) * 60;
                self.anchor = Some((secs, self.now_ms()));
                self.settle();
            }
            Step::Finish => self.finish(),
        }
    }

    /// Run every step, stopping early when a reboot was dialed.
    pub fn run(&mut self, steps: &[Step]) {
        for step in steps {
            if self.outcome.is_some() {
                break;
            }
            self.step(step);
        }
    }

    pub fn report(&self) -> SimReport {
        SimReport {
            events: self.sink.history(),
            status: self.ex.status(),
            elapsed_ms: self.now_ms(),
            reboot_requested: self.outcome == Some(RunOutcome::RebootRequested),
        }
    }
}

fn action_parts(action: &SimAction) -> (&'static str, serde_json::Value) {
    use serde_json::Value;
    match action {
        SimAction::Play(c) => ("play", Value::from(c.as_str())),
        SimAction::Speak(t) => ("speak", Value::from(t.as_str())),
        SimAction::Finished(c) => ("finished", Value::from(c.as_str())),
        SimAction::Stop => ("stop", Value::Null),
        SimAction::Route(r) => ("route", Value::from(r.as_str())),
        SimAction::Volume(v) => ("volume", Value::from(*v)),
        SimAction::Mute(m) => ("mute", Value::from(*m)),
        SimAction::Amplifier(on) => ("amplifier", Value::from(*on)),
    }
}

pub fn status_json(st: &ExchangeStatus) -> serde_json::Value {
    use serde_json::json;
    json!({
        "state": st.state.as_str(),
        "off_hook": st.hook.is_off_hook(),
        "requested_route": st.requested_route.as_str(),
        "effective_route": st.effective_route.as_str(),
        "dial_buffer": st.dial_buffer,
        "alarm": st.alarm.as_ref().map(|a| json!({
            "source": a.source.as_str(),
            "snooze_origin": a.snooze_origin,
            "fade": a.fade,
            "remaining_ms": a.remaining_ms,
            "clip": a.clip,
        })),
        "timer": st.timer.as_ref().map(|t| json!({
            "minutes": t.minutes,
            "remaining_ms": t.remaining_ms,
            "snooze": t.snooze,
            "announcement_pending": t.announcement_pending,
        })),
        "night_mode": st.night_mode,
        "alarms_enabled": st.alarms_enabled,
        "skip_next_alarm": st.skip_next_alarm,
        "degraded": st.degraded,
        "reboot_requested": st.reboot_requested,
    })
}

impl SimReport {
    pub fn to_json(&self) -> serde_json::Value {
        let events: Vec<serde_json::Value> = self
            .events
            .iter()
            .map(|e| {
                let (action, value) = action_parts(&e.action);
                serde_json::json!({ "at_ms": e.at_ms, "action": action, "value": value })
            })
            .collect();
        serde_json::json!({
            "elapsed_ms": self.elapsed_ms,
            "reboot_requested": self.reboot_requested,
            "events": events,
            "status": status_json(&self.status),
        })
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for e in &self.events {
            let (action, value) = action_parts(&e.action);
            let value = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            out.push_str(&format!("{:>8} ms  {action:<9} {value}\n", e.at_ms));
        }
        out.push_str(&format!(
            "state: {} (route {}) after {} ms\n",
            self.status.state.as_str(),
            self.status.effective_route.as_str(),
            self.elapsed_ms
        ));
        if self.reboot_requested {
            out.push_str("reboot requested\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange_config::{FileAlarmStore, Phonebook};
    use exchange_core::LineState;
    use rstest::rstest;

    fn simulation() -> Simulation {
        let cfg = exchange_config::Config::default();
        let stores = crate::setup::Stores {
            phonebook: Phonebook::defaults(),
            alarms: FileAlarmStore::in_memory(),
            assets: None,
            degraded: None,
        };
        let builder = crate::setup::exchange_builder(&cfg, stores).with_seed(3);
        Simulation::new(builder, SimOptions::default()).unwrap()
    }

    #[rstest]
    #[case("pickup", Step::Pickup)]
    #[case("  HANGUP  # done", Step::Hangup)]
    #[case("dial 110", Step::Dial(vec![1, 1, 0]))]
    #[case("wait 2500", Step::Wait(2500))]
    #[case("time 06:59", Step::Time { hour: 6, minute: 59, weekday: 1 })]
    #[case("time 23:05 sat", Step::Time { hour: 23, minute: 5, weekday: 6 })]
    #[case("time 7:00 0", Step::Time { hour: 7, minute: 0, weekday: 0 })]
    fn parses_single_commands(#[case] line: &str, #[case] expected: Step) {
        assert_eq!(parse_script(line).unwrap(), vec![expected]);
    }

    #[rstest]
    #[case("dial 1a")]
    #[case("wait soon")]
    #[case("time 25:00")]
    #[case("time 07:00 someday")]
    #[case("pickup now")]
    #[case("ring")]
    fn rejects_bad_lines_with_line_number(#[case] line: &str) {
        let err = parse_script(&format!("# header\n{line}\n")).unwrap_err();
        assert!(err.to_string().starts_with("script line 2:"), "{err}");
    }

    #[test]
    fn week_time_rolls_over_days() {
        let t = week_time(SECS_PER_DAY + 7 * 3600 + 30 * 60);
        assert_eq!((t.weekday, t.hour, t.minute), (1, 7, 30));
        assert_eq!(t.day, 3);
        assert_eq!(t.day_of_year, 61);
        let wrapped = week_time(7 * SECS_PER_DAY + 60);
        assert_eq!((wrapped.weekday, wrapped.minute), (0, 1));
    }

    #[test]
    fn pickup_plays_dial_tone_on_the_handset() {
        let mut sim = simulation();
        sim.run(&parse_script("finish\npickup\nwait 200").unwrap());
        let report = sim.report();
        assert_eq!(report.status.state, LineState::OffHookDialTone);
        assert!(
            report
                .events
                .iter()
                .any(|e| e.action == SimAction::Play("/system/dialtone_1.wav".into()))
        );
        assert_eq!(report.status.effective_route.as_str(), "handset");
    }

    #[test]
    fn time_announcement_follows_wall_clock() {
        let mut sim = simulation();
        sim.run(&parse_script("finish\ntime 07:05 mon\npickup\ndial 110\nwait 5000").unwrap());
        let played: Vec<String> = sim
            .report()
            .events
            .into_iter()
            .filter_map(|e| match e.action {
                SimAction::Play(c) => Some(c),
                _ => None,
            })
            .collect();
        assert!(played.contains(&"/time/de/h_7.mp3".to_string()), "{played:?}");
    }

    #[test]
    fn reboot_stops_the_script() {
        let mut sim = simulation();
        sim.run(&parse_script("finish\npickup\ndial 999\nwait 2500\nhangup\npickup").unwrap());
        let report = sim.report();
        assert!(report.reboot_requested);
        assert!(report.status.hook.is_off_hook());
        let json = report.to_json();
        assert_eq!(json["reboot_requested"], true);
        assert!(report.to_text().ends_with("reboot requested\n"));
    }
}
