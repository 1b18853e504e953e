#![deny(missing_docs)]
//! Shared logging utilities for the export workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every line is stamped
//! with the scheduler tick that produced it, so interleaved job output can be
//! read back in order.

use std::cell::Cell;

#[doc(hidden)]
pub use log as __log;

thread_local! {
    /// Thread-local storage for the current scheduler tick count.
    static SCHEDULER_TICK: Cell<u64> = const { Cell::new(0) };
}

/// Sets the scheduler tick count for the current thread.
/// The scheduler calls this once per poll.
pub fn set_scheduler_tick(tick: u64) {
    SCHEDULER_TICK.with(|v| v.set(tick));
}

/// Retrieves the scheduler tick count for the current thread.
/// Returns 0 if no scheduler has polled on this thread yet.
pub fn scheduler_tick() -> u64 {
    SCHEDULER_TICK.with(|v| v.get())
}

/// Logs a trace-level message, prefixed with the scheduler tick.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!("[tick {}] {}", $crate::scheduler_tick(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message, prefixed with the scheduler tick.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!("[tick {}] {}", $crate::scheduler_tick(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message, prefixed with the scheduler tick.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!("[tick {}] {}", $crate::scheduler_tick(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message, prefixed with the scheduler tick.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!("[tick {}] {}", $crate::scheduler_tick(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message, prefixed with the scheduler tick.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!("[tick {}] {}", $crate::scheduler_tick(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
