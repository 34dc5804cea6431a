//! `exchange run`: the live line loop.
//!
//! Audio decoding is outside this binary; the clip sink is the simulated
//! device, which times clips and reports completion. With the `hardware`
//! feature on Linux the hook, button, mode and pulse contacts come from GPIO
//! and the amplifier supply is switched by the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use exchange_core::{Inputs, RunOutcome};
use exchange_hardware::{SimOptions, SimulatedSink};
use exchange_traits::{Clock, MonotonicClock};

use crate::rt::{RtOptions, setup_rt_once};
use crate::setup::{LoadedConfig, Stores, exchange_builder};

/// Period of the sink completion poller.
const SINK_POLL: Duration = Duration::from_millis(10);

/// Background thread reporting clip completion for the simulated sink.
struct SinkPoller {
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SinkPoller {
    fn spawn(sink: SimulatedSink) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let handle = std::thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                sink.poll();
                std::thread::sleep(SINK_POLL);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for SinkPoller {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take()
            && h.join().is_err()
        {
            tracing::warn!("sink poller panicked during shutdown");
        }
    }
}

/// Raises `stop` after `secs` seconds. The thread is detached.
fn stop_after(stop: Arc<AtomicBool>, secs: u64) {
    std::thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(secs);
        while Instant::now() < deadline {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        tracing::info!(secs, "run duration elapsed");
        stop.store(true, Ordering::Relaxed);
    });
}

pub fn run_line(
    loaded: &LoadedConfig,
    stores: Stores,
    rt: RtOptions,
    duration: Option<u64>,
    stop: Arc<AtomicBool>,
) -> eyre::Result<RunOutcome> {
    setup_rt_once(rt);

    let cfg = &loaded.cfg;
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let sink = SimulatedSink::new(
        clock.clone(),
        SimOptions {
            assets: stores.assets.clone(),
            ..SimOptions::default()
        },
    );
    let builder = exchange_builder(cfg, stores).with_clock(clock);

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let (mut ex, inputs, _pulse_irq) = {
        use exchange_hardware::gpio::{AmplifierGate, GpioInput, PulseInterrupt};
        use exchange_traits::DigitalInput;

        let gpio = exchange_hardware::gpio::open()?;
        let mut ex = match cfg.pins.amp_enable {
            Some(pin) => builder
                .with_sink(AmplifierGate::new(&gpio, pin, sink.clone())?)
                .build()?,
            None => builder.with_sink(sink.clone()).build()?,
        };
        let counter = ex.pulse_counter();
        let time = ex.timebase();
        let irq = PulseInterrupt::attach(&gpio, cfg.pins.pulse, move |level| {
            counter.on_edge(level, time.now_ms());
        })?;
        let button: Option<Box<dyn DigitalInput + Send>> = match cfg.pins.button {
            Some(pin) => Some(Box::new(GpioInput::new(&gpio, pin)?)),
            None => None,
        };
        let mode: Option<Box<dyn DigitalInput + Send>> = match cfg.pins.mode {
            Some(pin) => Some(Box::new(GpioInput::new(&gpio, pin)?)),
            None => None,
        };
        let inputs = Inputs {
            hook: Box::new(GpioInput::new(&gpio, cfg.pins.hook)?),
            button,
            mode,
        };
        ex.start();
        (ex, inputs, irq)
    };

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let (mut ex, inputs) = {
        use exchange_hardware::SimulatedPin;

        tracing::warn!("built without GPIO support; line inputs are simulated and idle");
        let mut ex = builder.with_sink(sink.clone()).build()?;
        // Idle levels: on-hook and button released.
        let inputs = Inputs {
            hook: Box::new(SimulatedPin::new(cfg.inputs.hook_active_low)),
            button: Some(Box::new(SimulatedPin::new(cfg.inputs.button_active_low))),
            mode: None,
        };
        ex.start();
        (ex, inputs)
    };

    let _sink_poller = SinkPoller::spawn(sink);
    let _tick = ex.spawn_inputs(inputs);
    if let Some(secs) = duration {
        stop_after(stop.clone(), secs);
    }

    let outcome = ex.run(&stop);
    tracing::info!(?outcome, state = ex.status().state.as_str(), "line stopped");
    Ok(outcome)
}
