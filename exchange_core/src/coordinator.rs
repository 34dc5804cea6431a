//! Single-consumer event loop around the line state machine.
//!
//! Tick and sink threads only send [`Event`]s; all state changes happen on
//! the thread that drives [`Exchange::run_once`] or [`Exchange::pump`].
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::builder::{ExchangeBuilder, Missing};
use crate::config::{InputCfg, PulseCfg};
use crate::gain::GainTargets;
use crate::input::{InputPoller, Inputs, LineEvent, TickTask};
use crate::line::LineStateMachine;
use crate::pulse::{DialDecoder, PulseCounter};
use crate::status::ExchangeStatus;
use crate::util::Timebase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Line(LineEvent),
    ClipFinished,
}

/// Why [`Exchange::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Stopped,
    RebootRequested,
}

pub struct Exchange {
    line: LineStateMachine,
    tx: xch::Sender<Event>,
    rx: xch::Receiver<Event>,
    time: Timebase,
    pulse: PulseCounter,
    pulse_cfg: PulseCfg,
    input_cfg: InputCfg,
    poll: Duration,
    targets: Arc<GainTargets>,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.line.status();
        f.debug_struct("Exchange")
            .field("state", &st.state)
            .field("route", &st.effective_route)
            .field("pending_events", &self.rx.len())
            .finish()
    }
}

impl Exchange {
    pub fn builder() -> ExchangeBuilder<Missing> {
        ExchangeBuilder::default()
    }

    pub(crate) fn new(
        mut line: LineStateMachine,
        time: Timebase,
        pulse: PulseCounter,
        pulse_cfg: PulseCfg,
        input_cfg: InputCfg,
        poll: Duration,
        targets: Arc<GainTargets>,
    ) -> Self {
        let (tx, rx) = xch::unbounded();
        let finished_tx = tx.clone();
        line.sink_mut().on_finished(Box::new(move || {
            // Only fails once the exchange is gone.
            let _ = finished_tx.send(Event::ClipFinished);
        }));
        Self {
            line,
            tx,
            rx,
            time,
            pulse,
            pulse_cfg,
            input_cfg,
            poll,
            targets,
        }
    }

    /// Handle for producers (tick thread, tests, simulators).
    pub fn sender(&self) -> xch::Sender<Event> {
        self.tx.clone()
    }

    pub fn start(&mut self) {
        self.line.start();
    }

    /// Wait up to one poll period for an event, then run housekeeping.
    /// Returns whether an event was handled.
    pub fn run_once(&mut self) -> bool {
        let ev = self.rx.recv_timeout(self.poll);
        self.line.housekeeping();
        match ev {
            Ok(ev) => {
                self.handle(ev);
                true
            }
            Err(_) => false,
        }
    }

    /// Non-blocking: housekeeping, then drain queued events. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        self.line.housekeeping();
        let mut n = 0;
        while let Ok(ev) = self.rx.try_recv() {
            self.handle(ev);
            n += 1;
        }
        n
    }

    pub fn handle(&mut self, ev: Event) {
        tracing::trace!(event = ?ev, "event");
        match ev {
            Event::Line(LineEvent::Digit(d)) => self.line.on_digit(d),
            Event::Line(LineEvent::Hook(h)) => self.line.on_hook(h),
            Event::Line(LineEvent::ButtonPressed) => self.line.on_button(),
            Event::ClipFinished => self.line.on_clip_finished(),
        }
    }

    pub fn housekeeping(&mut self) {
        self.line.housekeeping();
    }

    /// Main loop. Returns when `stop` is raised or a reboot was dialed.
    pub fn run(&mut self, stop: &AtomicBool) -> RunOutcome {
        tracing::info!(poll_ms = self.poll.as_millis() as u64, "exchange loop running");
        loop {
            if stop.load(Ordering::Relaxed) {
                tracing::info!("stop requested");
                return RunOutcome::Stopped;
            }
            self.run_once();
            if self.line.reboot_requested() {
                return RunOutcome::RebootRequested;
            }
        }
    }

    pub fn status(&self) -> ExchangeStatus {
        self.line.status()
    }

    /// Counter the pulse interrupt feeds.
    pub fn pulse_counter(&self) -> PulseCounter {
        self.pulse.clone()
    }

    pub fn timebase(&self) -> Timebase {
        self.time.clone()
    }

    /// Gains the audio thread applies through a `GainEnvelope`.
    pub fn gain_targets(&self) -> Arc<GainTargets> {
        self.targets.clone()
    }

    pub fn input_poller(&self, inputs: Inputs) -> InputPoller {
        let decoder = DialDecoder::new(self.pulse.clone(), &self.pulse_cfg);
        InputPoller::new(inputs, decoder, &self.input_cfg)
    }

    /// Poll `inputs` on a background thread at the configured tick period.
    pub fn spawn_inputs(&self, inputs: Inputs) -> TickTask {
        let period = Duration::from_millis(self.input_cfg.tick_ms.max(1));
        TickTask::spawn(
            self.input_poller(inputs),
            self.sender(),
            self.time.clone(),
            period,
        )
    }
}
