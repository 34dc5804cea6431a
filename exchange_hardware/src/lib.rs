//! Hardware adapters for the exchange: simulated audio sink and pins,
//! filesystem assets, and (with the `hardware` feature) Raspberry Pi GPIO.
pub mod assets;
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;

pub use assets::DirAssets;
pub use error::HwError;
pub use sim::{SimAction, SimEvent, SimOptions, SimulatedPin, SimulatedSink};
