//! Input polling: hook switch, function button and the dial decoder.
//!
//! `TickTask` owns the `InputPoller` on its own thread and forwards line
//! events to the coordinator. The pulse contact itself is counted from the
//! edge interrupt (see `pulse::PulseCounter`); this side only completes trains.
use crossbeam_channel as xch;
use exchange_traits::{DigitalInput, HookState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::InputCfg;
use crate::coordinator::Event;
use crate::debounce::Debouncer;
use crate::hw_error::log_failure;
use crate::pulse::DialDecoder;
use crate::util::Timebase;

/// Raw inputs of the line. Button and mode contact are optional.
pub struct Inputs {
    pub hook: Box<dyn DigitalInput + Send>,
    pub button: Option<Box<dyn DigitalInput + Send>>,
    pub mode: Option<Box<dyn DigitalInput + Send>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    Digit(u8),
    Hook(HookState),
    ButtonPressed,
}

#[derive(Debug, Default)]
struct ReadHealth {
    hook: bool,
    button: bool,
    mode: bool,
}

fn read_level(input: &mut dyn DigitalInput, name: &'static str, failed: &mut bool) -> Option<bool> {
    match input.level() {
        Ok(level) => {
            if *failed {
                tracing::info!(input = name, "input read recovered");
                *failed = false;
            }
            Some(level)
        }
        Err(e) => {
            if !*failed {
                log_failure(name, e.as_ref());
                *failed = true;
            }
            None
        }
    }
}

pub struct InputPoller {
    inputs: Inputs,
    decoder: DialDecoder,
    hook: Debouncer,
    hook_active_low: bool,
    button: Debouncer,
    button_active_low: bool,
    health: ReadHealth,
}

impl InputPoller {
    pub fn new(inputs: Inputs, decoder: DialDecoder, cfg: &InputCfg) -> Self {
        // Both contacts start released: on-hook, button up.
        Self {
            inputs,
            decoder,
            hook: Debouncer::new(cfg.hook_active_low, cfg.hook_debounce_ms),
            hook_active_low: cfg.hook_active_low,
            button: Debouncer::new(cfg.button_active_low, cfg.button_debounce_ms),
            button_active_low: cfg.button_active_low,
            health: ReadHealth::default(),
        }
    }

    pub fn hook_state(&self) -> HookState {
        if self.hook.stable() != self.hook_active_low {
            HookState::OffHook
        } else {
            HookState::OnHook
        }
    }

    /// Sample every input once. Events come out in hook, digit, button order.
    pub fn poll(&mut self, now_ms: u64) -> Vec<LineEvent> {
        let mut events = Vec::new();

        if let Some(level) = read_level(self.inputs.hook.as_mut(), "hook", &mut self.health.hook)
            && self.hook.update(level, now_ms).is_some()
        {
            events.push(LineEvent::Hook(self.hook_state()));
        }

        let mode_level = match self.inputs.mode.as_mut() {
            Some(m) => read_level(m.as_mut(), "mode", &mut self.health.mode),
            None => None,
        };
        if let Some(digit) = self.decoder.poll(now_ms, mode_level) {
            events.push(LineEvent::Digit(digit));
        }

        if let Some(b) = self.inputs.button.as_mut()
            && let Some(level) = read_level(b.as_mut(), "button", &mut self.health.button)
            && let Some(stable) = self.button.update(level, now_ms)
            && stable != self.button_active_low
        {
            events.push(LineEvent::ButtonPressed);
        }

        events
    }
}

/// Background thread that polls the inputs at a fixed period.
///
/// The thread exits when the task is dropped or the receiving side hangs up.
pub struct TickTask {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TickTask {
    pub fn spawn(
        mut poller: InputPoller,
        tx: xch::Sender<Event>,
        time: Timebase,
        period: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let join_handle = std::thread::spawn(move || {
            while !shutdown_clone.load(Ordering::Relaxed) {
                for ev in poller.poll(time.now_ms()) {
                    if tx.send(Event::Line(ev)).is_err() {
                        tracing::debug!("tick consumer disconnected, exiting thread");
                        return;
                    }
                }
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                time.clock().sleep(period);
            }
            tracing::trace!("tick thread exiting cleanly");
        });
        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for TickTask {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("tick thread panicked during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PulseCfg;
    use crate::mocks::MockPin;
    use crate::pulse::PulseCounter;
    use exchange_traits::MonotonicClock;

    fn poller(hook: &MockPin, button: &MockPin) -> (InputPoller, PulseCounter) {
        let pcfg = PulseCfg::default();
        let counter = PulseCounter::new(pcfg.debounce_ms, pcfg.pulse_active_low);
        let decoder = DialDecoder::new(counter.clone(), &pcfg);
        let inputs = Inputs {
            hook: Box::new(hook.clone()),
            button: Some(Box::new(button.clone())),
            mode: None,
        };
        (InputPoller::new(inputs, decoder, &InputCfg::default()), counter)
    }

    #[test]
    fn hook_change_needs_stable_level() {
        let hook = MockPin::new(true);
        let button = MockPin::new(true);
        let (mut p, _) = poller(&hook, &button);
        assert!(p.poll(0).is_empty());
        hook.set(false);
        assert!(p.poll(20).is_empty());
        assert!(p.poll(40).is_empty());
        assert_eq!(p.poll(60), vec![LineEvent::Hook(HookState::OffHook)]);
        assert_eq!(p.hook_state(), HookState::OffHook);
    }

    #[test]
    fn button_reports_press_not_release() {
        let hook = MockPin::new(true);
        let button = MockPin::new(true);
        let (mut p, _) = poller(&hook, &button);
        p.poll(0);
        button.set(false);
        assert_eq!(p.poll(60), vec![LineEvent::ButtonPressed]);
        button.set(true);
        assert!(p.poll(70).is_empty());
        assert!(p.poll(200).is_empty());
    }

    #[test]
    fn digit_completes_after_gap() {
        let hook = MockPin::new(true);
        let button = MockPin::new(true);
        let (mut p, counter) = poller(&hook, &button);
        for i in 0..3u64 {
            counter.on_edge(true, 100 + i * 100);
            counter.on_edge(false, 150 + i * 100);
        }
        assert!(p.poll(400).is_empty());
        assert_eq!(p.poll(900), vec![LineEvent::Digit(3)]);
    }

    #[test]
    fn failing_read_produces_no_events() {
        let hook = MockPin::new(true);
        let button = MockPin::new(true);
        let (mut p, _) = poller(&hook, &button);
        hook.set_broken(true);
        hook.set(false);
        assert!(p.poll(100).is_empty());
        assert!(p.poll(200).is_empty());
        hook.set_broken(false);
        assert_eq!(p.poll(300), vec![LineEvent::Hook(HookState::OffHook)]);
    }

    #[test]
    fn tick_task_forwards_and_stops() {
        let hook = MockPin::new(true);
        let button = MockPin::new(true);
        let (p, _) = poller(&hook, &button);
        let (tx, rx) = xch::unbounded();
        let time = Timebase::new(Arc::new(MonotonicClock::new()));
        let task = TickTask::spawn(p, tx, time, Duration::from_millis(2));
        hook.set(false);
        let ev = rx.recv_timeout(Duration::from_secs(2));
        assert!(matches!(ev, Ok(Event::Line(LineEvent::Hook(HookState::OffHook)))));
        drop(task);
    }
}
