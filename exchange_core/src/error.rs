use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ExchangeError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("missing asset: {0}")]
    Asset(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("timer of {minutes} min out of range {min}..={max}")]
    TimerOutOfRange { minutes: u32, min: u32, max: u32 },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing clip sink")]
    MissingSink,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
