//! Click-free per-channel gain and a handset noise gate.
//!
//! The arbiter writes target gains into [`GainTargets`]; the audio context owns a
//! [`GainEnvelope`] and walks the applied gain linearly toward the targets, one
//! sample at a time.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::GainCfg;
use crate::util::ramp_samples;

/// Target gains shared with the audio context. Values are stored as f32 bits.
#[derive(Debug)]
pub struct GainTargets {
    left: AtomicU32,
    right: AtomicU32,
    gate_enabled: AtomicBool,
}

impl GainTargets {
    pub fn new(left: f32, right: f32) -> Arc<Self> {
        Arc::new(Self {
            left: AtomicU32::new(left.to_bits()),
            right: AtomicU32::new(right.to_bits()),
            gate_enabled: AtomicBool::new(false),
        })
    }

    pub fn set(&self, left: f32, right: f32) {
        self.left.store(left.to_bits(), Ordering::Release);
        self.right.store(right.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> (f32, f32) {
        (
            f32::from_bits(self.left.load(Ordering::Acquire)),
            f32::from_bits(self.right.load(Ordering::Acquire)),
        )
    }

    pub fn set_gate_enabled(&self, on: bool) {
        self.gate_enabled.store(on, Ordering::Release);
    }

    pub fn gate_enabled(&self) -> bool {
        self.gate_enabled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    /// Interleaved L,R
    Stereo,
}

#[derive(Debug)]
pub struct GainEnvelope {
    targets: Arc<GainTargets>,
    current: [f32; 2],
    target: [f32; 2],
    step: [f32; 2],
    ramp_ms: u32,
    rate: u32,
    gate: f32,
    gate_threshold: i16,
    gate_floor: f32,
    gate_smooth: f32,
}

impl GainEnvelope {
    /// Starts silent; the first buffer ramps up to whatever the targets hold.
    pub fn new(targets: Arc<GainTargets>, cfg: &GainCfg) -> Self {
        Self {
            targets,
            current: [0.0; 2],
            target: [0.0; 2],
            step: [0.0; 2],
            ramp_ms: cfg.ramp_ms,
            rate: 0,
            gate: 1.0,
            gate_threshold: cfg.gate_threshold,
            gate_floor: cfg.gate_floor,
            gate_smooth: cfg.gate_smooth,
        }
    }

    /// Currently applied (left, right) gain.
    pub fn current(&self) -> (f32, f32) {
        (self.current[0], self.current[1])
    }

    pub fn gate_factor(&self) -> f32 {
        self.gate
    }

    /// Apply gains to one buffer and append interleaved stereo to `out`.
    /// Mono input is duplicated to both channels.
    pub fn process(
        &mut self,
        input: &[i16],
        layout: ChannelLayout,
        sample_rate: u32,
        out: &mut Vec<i16>,
    ) {
        self.refresh_targets(sample_rate);
        self.update_gate(input);
        let gate = self.gate;

        match layout {
            ChannelLayout::Mono => {
                out.reserve(input.len() * 2);
                for &s in input {
                    let l = self.advance(0);
                    let r = self.advance(1);
                    out.push(scale(s, l * gate));
                    out.push(scale(s, r * gate));
                }
            }
            ChannelLayout::Stereo => {
                out.reserve(input.len());
                for frame in input.chunks_exact(2) {
                    let l = self.advance(0);
                    let r = self.advance(1);
                    out.push(scale(frame[0], l * gate));
                    out.push(scale(frame[1], r * gate));
                }
            }
        }
    }

    fn refresh_targets(&mut self, sample_rate: u32) {
        let (l, r) = self.targets.get();
        let rate_changed = sample_rate != self.rate;
        self.rate = sample_rate;
        let n = ramp_samples(sample_rate, self.ramp_ms) as f32;
        for (ch, t) in [l, r].into_iter().enumerate() {
            if rate_changed || t.to_bits() != self.target[ch].to_bits() {
                self.target[ch] = t;
                self.step[ch] = (t - self.current[ch]) / n;
            }
        }
    }

    fn update_gate(&mut self, input: &[i16]) {
        let peak = input
            .iter()
            .map(|s| i32::from(*s).abs())
            .max()
            .unwrap_or(0);
        let closing = self.targets.gate_enabled() && peak < i32::from(self.gate_threshold);
        let goal = if closing { self.gate_floor } else { 1.0 };
        self.gate += (goal - self.gate) * self.gate_smooth;
    }

    #[inline]
    fn advance(&mut self, ch: usize) -> f32 {
        let cur = self.current[ch];
        let tgt = self.target[ch];
        if cur == tgt {
            return cur;
        }
        let step = self.step[ch];
        let next = cur + step;
        // Snap on arrival and never overshoot.
        let remaining = (tgt - next) * step.signum();
        self.current[ch] = if step == 0.0 || remaining <= step.abs() * 0.5 {
            tgt
        } else {
            next
        };
        self.current[ch]
    }
}

#[inline]
fn scale(sample: i16, gain: f32) -> i16 {
    (f32::from(sample) * gain)
        .round()
        .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}
