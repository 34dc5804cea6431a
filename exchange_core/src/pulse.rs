//! Rotary pulse decoding.
//!
//! Split in two halves:
//! - [`PulseCounter`]: the interrupt half. `on_edge` only touches atomics, so it
//!   is safe to call from a GPIO interrupt callback.
//! - [`DialDecoder`]: the tick half. Decides when a pulse train is complete and
//!   turns the count into a digit.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::config::{DecodeStrategy, PulseCfg};
use crate::debounce::Debouncer;

/// Map a completed pulse count to a digit: ten pulses dial 0.
#[inline]
pub const fn digit_from_pulses(count: u32) -> Option<u8> {
    match count {
        10 => Some(0),
        1..=9 => Some(count as u8),
        _ => None,
    }
}

#[derive(Debug)]
struct Shared {
    count: AtomicU32,
    last_pulse_ms: AtomicU64,
    last_gap_ms: AtomicU64,
    dialing: AtomicBool,
    new_pulse: AtomicBool,
    debounce_ms: u64,
    /// Level at which a pulse is counted.
    count_level: bool,
}

/// Pulse state shared between interrupt and tick contexts. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PulseCounter {
    inner: Arc<Shared>,
}

impl PulseCounter {
    /// `pulse_active_low`: the contact pulls the line low while closed, so a
    /// pulse is counted when the line returns to the released (high) level.
    pub fn new(debounce_ms: u64, pulse_active_low: bool) -> Self {
        Self {
            inner: Arc::new(Shared {
                count: AtomicU32::new(0),
                last_pulse_ms: AtomicU64::new(0),
                last_gap_ms: AtomicU64::new(0),
                dialing: AtomicBool::new(false),
                new_pulse: AtomicBool::new(false),
                debounce_ms,
                count_level: pulse_active_low,
            }),
        }
    }

    /// Interrupt entry point. Returns whether the edge was counted.
    ///
    /// No locks, no allocation, no logging.
    #[inline]
    pub fn on_edge(&self, level: bool, now_ms: u64) -> bool {
        let s = &*self.inner;
        if level != s.count_level {
            return false;
        }
        let last = s.last_pulse_ms.load(Ordering::Acquire);
        let gap = now_ms.saturating_sub(last);
        if gap <= s.debounce_ms {
            return false;
        }
        s.last_pulse_ms.store(now_ms, Ordering::Release);
        s.last_gap_ms.store(gap, Ordering::Relaxed);
        s.count.fetch_add(1, Ordering::AcqRel);
        s.dialing.store(true, Ordering::Release);
        s.new_pulse.store(true, Ordering::Release);
        true
    }

    /// Read-and-clear the pulse count in one atomic step.
    ///
    /// `dialing` is cleared before the swap: an edge landing in between is
    /// either part of this count or raises `dialing` again for the next train.
    pub fn take(&self) -> u32 {
        self.inner.dialing.store(false, Ordering::Release);
        self.inner.count.swap(0, Ordering::AcqRel)
    }

    /// Drop any partial count (mode contact just engaged).
    pub fn reset(&self) {
        self.inner.dialing.store(false, Ordering::Release);
        self.inner.count.store(0, Ordering::Release);
    }

    /// A pulse train is in progress.
    pub fn is_dialing(&self) -> bool {
        self.inner.dialing.load(Ordering::Acquire)
    }

    /// True once after each counted pulse.
    pub fn take_new_pulse(&self) -> bool {
        self.inner.new_pulse.swap(false, Ordering::AcqRel)
    }

    pub fn pending(&self) -> u32 {
        self.inner.count.load(Ordering::Acquire)
    }

    pub fn last_pulse_ms(&self) -> u64 {
        self.inner.last_pulse_ms.load(Ordering::Acquire)
    }

    pub fn last_gap_ms(&self) -> u64 {
        self.inner.last_gap_ms.load(Ordering::Relaxed)
    }
}

/// Tick-side completion of pulse trains.
#[derive(Debug)]
pub struct DialDecoder {
    counter: PulseCounter,
    strategy: DecodeStrategy,
    mode: Debouncer,
    mode_active_low: bool,
}

impl DialDecoder {
    pub fn new(counter: PulseCounter, cfg: &PulseCfg) -> Self {
        // Start with the mode contact at rest.
        let rest_level = cfg.mode_active_low;
        Self {
            counter,
            strategy: cfg.strategy,
            mode: Debouncer::new(rest_level, cfg.mode_debounce_ms),
            mode_active_low: cfg.mode_active_low,
        }
    }

    pub fn counter(&self) -> &PulseCounter {
        &self.counter
    }

    /// Poll once per tick. `mode_level` is the raw mode contact level when wired.
    pub fn poll(&mut self, now_ms: u64, mode_level: Option<bool>) -> Option<u8> {
        match self.strategy {
            DecodeStrategy::ModeGated => {
                let level = mode_level?;
                let changed = self.mode.update(level, now_ms)?;
                let active = changed != self.mode_active_low;
                if active {
                    tracing::trace!("dial left rest position");
                    self.counter.reset();
                    None
                } else {
                    self.complete()
                }
            }
            DecodeStrategy::TimeoutGated { gap_ms } => {
                if !self.counter.is_dialing() {
                    return None;
                }
                if now_ms.saturating_sub(self.counter.last_pulse_ms()) <= gap_ms {
                    return None;
                }
                self.complete()
            }
        }
    }

    fn complete(&mut self) -> Option<u8> {
        let pulses = self.counter.take();
        let digit = digit_from_pulses(pulses);
        match digit {
            Some(d) => tracing::debug!(pulses, digit = d, "digit decoded"),
            None if pulses > 0 => tracing::debug!(pulses, "pulse train discarded"),
            None => {}
        }
        digit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, None)]
    #[case(1, Some(1))]
    #[case(9, Some(9))]
    #[case(10, Some(0))]
    #[case(11, None)]
    #[case(40, None)]
    fn pulse_mapping(#[case] pulses: u32, #[case] digit: Option<u8>) {
        assert_eq!(digit_from_pulses(pulses), digit);
    }

    #[test]
    fn wrong_level_is_ignored() {
        let c = PulseCounter::new(30, true);
        assert!(!c.on_edge(false, 100));
        assert!(c.on_edge(true, 100));
        assert_eq!(c.pending(), 1);
    }

    #[test]
    fn active_high_contact_counts_low_level() {
        let c = PulseCounter::new(30, false);
        assert!(!c.on_edge(true, 100));
        assert!(c.on_edge(false, 100));
    }

    #[test]
    fn bounce_within_window_is_rejected() {
        let c = PulseCounter::new(30, true);
        assert!(c.on_edge(true, 100));
        assert!(!c.on_edge(true, 110));
        assert!(!c.on_edge(true, 130));
        assert!(c.on_edge(true, 131));
        assert_eq!(c.last_gap_ms(), 31);
        assert_eq!(c.take(), 2);
        assert!(!c.is_dialing());
        assert_eq!(c.pending(), 0);
    }

    #[test]
    fn new_pulse_flag_is_one_shot() {
        let c = PulseCounter::new(30, true);
        c.on_edge(true, 100);
        assert!(c.take_new_pulse());
        assert!(!c.take_new_pulse());
    }

    #[test]
    fn edge_after_take_opens_a_new_train() {
        let c = PulseCounter::new(30, true);
        c.on_edge(true, 100);
        assert_eq!(c.take(), 1);
        assert!(!c.is_dialing());
        c.on_edge(true, 200);
        assert!(c.is_dialing());
        assert_eq!(c.pending(), 1);
    }

    #[test]
    fn concurrent_take_never_strands_a_count() {
        let c = PulseCounter::new(0, true);
        let edges = c.clone();
        let feeder = std::thread::spawn(move || {
            for t in 1..=20_000u64 {
                edges.on_edge(true, t);
            }
        });
        let mut taken = 0u32;
        while !feeder.is_finished() {
            taken += c.take();
        }
        feeder.join().unwrap();
        let left = c.pending();
        assert_eq!(taken + left, 20_000);
        if left > 0 {
            assert!(c.is_dialing(), "{left} pulses pending without a train");
        }
    }

    fn feed_train(c: &PulseCounter, start_ms: u64, pulses: u32) -> u64 {
        let mut t = start_ms;
        for _ in 0..pulses {
            c.on_edge(true, t);
            t += 100;
        }
        t - 100
    }

    #[test]
    fn timeout_strategy_completes_after_gap() {
        let cfg = PulseCfg::default();
        let c = PulseCounter::new(cfg.debounce_ms, cfg.pulse_active_low);
        let mut d = DialDecoder::new(c.clone(), &cfg);
        let last = feed_train(&c, 1000, 4);
        assert_eq!(d.poll(last + 200, None), None);
        assert_eq!(d.poll(last + 500, None), None);
        assert_eq!(d.poll(last + 501, None), Some(4));
        assert_eq!(d.poll(last + 900, None), None);
    }

    #[test]
    fn mode_strategy_brackets_train() {
        let cfg = PulseCfg {
            strategy: DecodeStrategy::ModeGated,
            ..PulseCfg::default()
        };
        let c = PulseCounter::new(cfg.debounce_ms, cfg.pulse_active_low);
        let mut d = DialDecoder::new(c.clone(), &cfg);
        // rest level is high for an active-low contact
        assert_eq!(d.poll(0, Some(true)), None);
        // stray pulse before the dial is wound is dropped on activation
        c.on_edge(true, 500);
        assert_eq!(d.poll(1000, Some(false)), None);
        assert_eq!(d.poll(1030, Some(false)), None);
        assert_eq!(c.pending(), 0);
        let last = feed_train(&c, 1200, 10);
        assert_eq!(d.poll(last + 10, Some(false)), None);
        assert_eq!(d.poll(last + 20, Some(true)), None);
        assert_eq!(d.poll(last + 40, Some(true)), Some(0));
    }

    #[test]
    fn mode_strategy_without_mode_line_never_completes() {
        let cfg = PulseCfg {
            strategy: DecodeStrategy::ModeGated,
            ..PulseCfg::default()
        };
        let c = PulseCounter::new(cfg.debounce_ms, cfg.pulse_active_low);
        let mut d = DialDecoder::new(c.clone(), &cfg);
        feed_train(&c, 1000, 3);
        assert_eq!(d.poll(5000, None), None);
    }
}
