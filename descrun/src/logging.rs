//! Console logging for the runtime.
//!
//! The level starts from `DESCRUN_TRACE` (`1`/`basic` or `full`) and a host
//! may override it at any time with [`set_trace_level`]. Trace lines go to
//! stdout; warnings, errors and critical messages go to stderr.

use std::env;
use std::fmt::Arguments;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TraceLevel {
    Off,
    Basic,
    Full,
}

impl TraceLevel {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(TraceLevel::Off),
            1 => Some(TraceLevel::Basic),
            2 => Some(TraceLevel::Full),
            _ => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Severity {
    Trace,
    Warning,
    Error,
    Critical,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Severity::Trace => "34",
            Severity::Warning => "33",
            Severity::Error => "91",
            Severity::Critical => "31",
        }
    }

    /// Lowest level at which this severity is printed; `None` means always.
    fn threshold(self) -> Option<TraceLevel> {
        match self {
            Severity::Trace | Severity::Error => Some(TraceLevel::Basic),
            Severity::Warning => Some(TraceLevel::Full),
            Severity::Critical => None,
        }
    }
}

const UNSET: u8 = u8::MAX;

static TRACE_LEVEL: AtomicU8 = AtomicU8::new(UNSET);

/// Parse a `DESCRUN_TRACE` value. Anything unrecognised turns tracing off.
pub fn parse_trace_level(value: &str) -> TraceLevel {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "basic" => TraceLevel::Basic,
        "2" | "full" => TraceLevel::Full,
        _ => TraceLevel::Off,
    }
}

/// Current level; read from `DESCRUN_TRACE` on first use.
pub fn trace_level() -> TraceLevel {
    if let Some(level) = TraceLevel::from_u8(TRACE_LEVEL.load(Ordering::Relaxed)) {
        return level;
    }
    let level = env::var("DESCRUN_TRACE")
        .map(|value| parse_trace_level(&value))
        .unwrap_or(TraceLevel::Off);
    // A concurrent `set_trace_level` wins over the environment.
    match TRACE_LEVEL.compare_exchange(UNSET, level as u8, Ordering::Relaxed, Ordering::Relaxed) {
        Ok(_) => level,
        Err(current) => TraceLevel::from_u8(current).unwrap_or(level),
    }
}

/// Override the level for the rest of the process.
pub fn set_trace_level(level: TraceLevel) {
    TRACE_LEVEL.store(level as u8, Ordering::Relaxed);
}

fn enabled(severity: Severity) -> bool {
    match severity.threshold() {
        Some(threshold) => trace_level() >= threshold,
        None => true,
    }
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs() % 86_400;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3_600,
        (secs % 3_600) / 60,
        secs % 60,
        now.subsec_millis()
    )
}

fn emit(severity: Severity, args: Arguments) {
    if !enabled(severity) {
        return;
    }
    let line = format!(
        "{} [\u{001b}[{}m{}\u{001b}[0m] descrun -- {}",
        timestamp(),
        severity.color(),
        severity.label(),
        args
    );
    match severity {
        Severity::Trace => println!("{}", line),
        _ => eprintln!("{}", line),
    }
}

pub fn emit_trace(args: Arguments) {
    emit(Severity::Trace, args);
}

pub fn emit_warning(args: Arguments) {
    emit(Severity::Warning, args);
}

pub fn emit_error(args: Arguments) {
    emit(Severity::Error, args);
}

pub fn emit_critical(args: Arguments) {
    emit(Severity::Critical, args);
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::logging::emit_trace(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::logging::emit_warning(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logging::emit_error(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => {
        $crate::logging::emit_critical(format_args!($($arg)*))
    };
}

/// Unconditional progress line on stdout.
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        println!($($arg)*)
    };
}
