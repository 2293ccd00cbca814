//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "turret", version, about = "Turret motion control CLI")]
pub struct Cli {
    /// Path to config TOML (typed); factory defaults when omitted
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Partial settings TOML layered on top of the config (watched by `run`)
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "warn",
        global = true
    )]
    pub log_level: String,

    /// Simulated backend only: run the executor in virtual time
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub virtual_time: bool,

    #[command(flatten)]
    pub rt: RtArgs,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long = "rt",
        visible_alias = "realtime",
        action = ArgAction::SetTrue,
        global = true,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: Attempts SCHED_FIFO priority, pins to one CPU, and calls mlockall to lock the process address space into RAM. This keeps the control task period steady but may require elevated privileges or ulimits (e.g., memlock).\n\nmacOS: Only mlockall is applied."
    )]
    pub enabled: bool,
    /// Real-time priority for SCHED_FIFO on Linux (1..=max); ignored on macOS
    #[arg(long = "rt-prio", value_name = "PRIO", global = true)]
    pub prio: Option<i32>,
    /// Select memory locking mode for --rt: none, current, or all
    #[arg(long = "rt-lock", value_enum, value_name = "MODE", global = true)]
    pub lock: Option<RtLock>,
    /// CPU index to pin the process to when --rt is enabled (Linux only; default 0)
    #[arg(long = "rt-cpu", value_name = "CPU", global = true)]
    pub cpu: Option<usize>,
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
        if cfg!(target_os = "linux") {
            Self::Current
        } else {
            Self::None
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rotate to a quarter-turn angle along the shorter way round
    Rotate {
        /// Target angle: 0, 90, 180 or 270
        #[arg(long)]
        angle: u16,
        /// Give up when the move has not finished after this many seconds
        #[arg(long, value_name = "SECS", default_value_t = 60)]
        timeout_s: u64,
    },
    /// Move to an absolute encoder count
    Goto {
        /// Target encoder count
        #[arg(long, allow_negative_numbers = true)]
        position: i64,
        /// Give up when the move has not finished after this many seconds
        #[arg(long, value_name = "SECS", default_value_t = 60)]
        timeout_s: u64,
    },
    /// Run the turret (auto-rotation, settings reload) until stopped
    Run {
        /// Stop after this many seconds; runs until Ctrl-C when omitted
        #[arg(long, value_name = "SECS")]
        seconds: Option<u64>,
        /// Force auto-rotation on, regardless of the config
        #[arg(long, action = ArgAction::SetTrue)]
        auto: bool,
        /// Print per-task executor counters on exit
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
