//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "exchange", version, about = "Rotary telephone exchange line")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/exchange.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            return RtLock::Current;
        }
        #[allow(unreachable_code)]
        RtLock::None
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Operate the line until interrupted (Ctrl-C) or a reboot is dialed
    Run {
        /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority, pins to a CPU, and calls mlockall to lock the process address space into RAM. This keeps the pulse interrupt and tick thread responsive but may require elevated privileges or ulimits (e.g., memlock)."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO (1..=max)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Select memory locking mode for --rt: none, current, or all
        #[arg(long, value_enum, value_name = "MODE")]
        rt_lock: Option<RtLock>,
        /// CPU index to pin the process to when --rt is enabled. Defaults to 0.
        #[arg(long, value_name = "CPU")]
        rt_cpu: Option<usize>,
        /// Stop after this many seconds (for soak tests)
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,
    },
    /// Replay a script of line events in virtual time and print what was played
    Simulate {
        /// Script file: one command per line (pickup, hangup, dial N, button, wait MS, time HH:MM [WEEKDAY], finish)
        #[arg(long, value_name = "FILE")]
        script: PathBuf,
        /// Playing time of every simulated clip
        #[arg(long, value_name = "MS", default_value_t = 1500)]
        clip_ms: u64,
        /// Pretend the sink can synthesize speech
        #[arg(long, action = ArgAction::SetTrue)]
        speech: bool,
    },
    /// Validate config, phonebook, alarm table and the system clips
    SelfCheck,
}
