#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Exchange line engine (hardware-agnostic).
//!
//! Emulates a single rotary-dial subscriber line: pulse decoding, dial tone,
//! number dispatch, a voice menu, a kitchen timer and daily alarms. All
//! hardware goes through the `exchange_traits` collaborator traits.
//!
//! ## Architecture
//!
//! - **Input**: pulse counting from the edge interrupt, debounced hook and button (`pulse`, `input`)
//! - **Line**: the state machine and its completion chain (`line`)
//! - **Output**: route arbitration and the per-sample gain envelope (`arbiter`, `gain`)
//! - **Alarms**: dialed timers, daily alarms, snooze, fade-in (`alarm`)
//! - **Coordinator**: event channel and main loop (`coordinator`)
//!
//! Timestamps are milliseconds since the [`util::Timebase`] epoch, shared by
//! every thread.

pub mod alarm;
pub mod arbiter;
pub mod builder;
pub mod clips;
pub mod config;
pub mod conversions;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod gain;
pub mod hw_error;
pub mod input;
pub mod line;
pub mod messages;
pub mod mocks;
pub mod prompt;
pub mod pulse;
pub mod status;
pub mod util;

pub use alarm::{AlarmScheduler, AlarmSource};
pub use arbiter::OutputArbiter;
pub use builder::{ExchangeBuilder, Missing, Set};
pub use config::{DecodeStrategy, ExchangeConfig};
pub use coordinator::{Event, Exchange, RunOutcome};
pub use error::{BuildError, ExchangeError, Report, Result};
pub use gain::{ChannelLayout, GainEnvelope, GainTargets};
pub use input::{InputPoller, Inputs, LineEvent, TickTask};
pub use line::{MenuItem, PhonebookFunction};
pub use pulse::{DialDecoder, PulseCounter, digit_from_pulses};
pub use status::{AlarmStatus, ExchangeStatus, LineState, TimerStatus};
pub use util::Timebase;
