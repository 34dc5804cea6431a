//! Common time helpers for exchange_core.
use std::sync::Arc;
use std::time::Instant;

use exchange_traits::Clock;

/// Shared clock plus the epoch all millisecond timestamps are measured from.
///
/// The pulse interrupt, the tick thread and the coordinator must agree on the
/// epoch, so they all hold clones of one `Timebase`.
#[derive(Clone)]
pub struct Timebase {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
}

impl Timebase {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self { clock, epoch }
    }

    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn shared_clock(&self) -> Arc<dyn Clock + Send + Sync> {
        self.clock.clone()
    }
}

impl std::fmt::Debug for Timebase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timebase")
            .field("now_ms", &self.now_ms())
            .finish()
    }
}

/// Number of milliseconds in one minute.
pub const MILLIS_PER_MINUTE: u64 = 60_000;

#[inline]
pub fn minutes_to_ms(minutes: u32) -> u64 {
    u64::from(minutes) * MILLIS_PER_MINUTE
}

/// Samples covering `ms` at `sample_rate`, never less than one.
#[inline]
pub fn ramp_samples(sample_rate: u32, ms: u32) -> u32 {
    let n = u64::from(sample_rate) * u64::from(ms) / 1000;
    (n.min(u64::from(u32::MAX)) as u32).max(1)
}

/// Scale a percent volume by another percentage, rounding down.
#[inline]
pub fn scale_percent(volume: u8, percent: u8) -> u8 {
    ((u16::from(volume) * u16::from(percent.min(100))) / 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_samples_floor_is_one() {
        assert_eq!(ramp_samples(44_100, 40), 1764);
        assert_eq!(ramp_samples(8_000, 0), 1);
        assert_eq!(ramp_samples(10, 1), 1);
    }

    #[test]
    fn percent_scaling() {
        assert_eq!(scale_percent(70, 50), 35);
        assert_eq!(scale_percent(99, 150), 99);
        assert_eq!(minutes_to_ms(3), 180_000);
    }
}
