//! Raspberry Pi GPIO via rppal.
//!
//! Pin numbers are BCM. Inputs use the internal pull-up; contacts switch to
//! ground, so "closed" reads low.
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};

use exchange_traits::{BoxError, ClipSink, DigitalInput, Route};

use crate::error::{HwError, Result};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

pub fn open() -> Result<Gpio> {
    Gpio::new().map_err(gpio_err)
}

/// Polled contact (hook switch, button, dial mode contact).
pub struct GpioInput {
    pin: InputPin,
}

impl GpioInput {
    pub fn new(gpio: &Gpio, bcm: u8) -> Result<Self> {
        let pin = gpio.get(bcm).map_err(gpio_err)?.into_input_pullup();
        Ok(Self { pin })
    }
}

impl DigitalInput for GpioInput {
    fn level(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self.pin.is_high())
    }
}

/// Pulse contact with an edge interrupt. The callback runs on rppal's
/// interrupt thread and receives the new level; keep it short.
pub struct PulseInterrupt {
    // Dropping the pin clears the interrupt.
    _pin: InputPin,
}

impl PulseInterrupt {
    pub fn attach<F>(gpio: &Gpio, bcm: u8, mut on_edge: F) -> Result<Self>
    where
        F: FnMut(bool) + Send + 'static,
    {
        let mut pin = gpio.get(bcm).map_err(gpio_err)?.into_input_pullup();
        pin.set_async_interrupt(Trigger::Both, move |level: Level| {
            on_edge(level == Level::High);
        })
        .map_err(gpio_err)?;
        tracing::info!(pin = bcm, "pulse interrupt attached");
        Ok(Self { _pin: pin })
    }
}

/// Sink decorator that switches the amplifier supply on a GPIO output.
pub struct AmplifierGate<S> {
    inner: S,
    enable: OutputPin,
}

impl<S: ClipSink> AmplifierGate<S> {
    pub fn new(gpio: &Gpio, bcm: u8, inner: S) -> Result<Self> {
        let mut enable = gpio.get(bcm).map_err(gpio_err)?.into_output();
        enable.set_low();
        Ok(Self { inner, enable })
    }
}

impl<S: ClipSink> ClipSink for AmplifierGate<S> {
    fn play(&mut self, path: &str) -> std::result::Result<(), BoxError> {
        self.inner.play(path)
    }
    fn stop(&mut self) -> std::result::Result<(), BoxError> {
        self.inner.stop()
    }
    fn is_playing(&self) -> bool {
        self.inner.is_playing()
    }
    fn on_finished(&mut self, callback: Box<dyn Fn() + Send + Sync>) {
        self.inner.on_finished(callback);
    }
    fn set_route(&mut self, route: Route) -> std::result::Result<(), BoxError> {
        self.inner.set_route(route)
    }
    fn set_volume(&mut self, volume: u8) -> std::result::Result<(), BoxError> {
        self.inner.set_volume(volume)
    }
    fn mute(&mut self, muted: bool) -> std::result::Result<(), BoxError> {
        self.inner.mute(muted)
    }
    fn set_amplifier(&mut self, on: bool) -> std::result::Result<(), BoxError> {
        if on {
            self.enable.set_high();
        } else {
            self.enable.set_low();
        }
        self.inner.set_amplifier(on)
    }
    fn speak(&mut self, text: &str) -> std::result::Result<(), BoxError> {
        self.inner.speak(text)
    }
}
