// Category-based logging infrastructure
//
// This will be used from multiple threads, so it needs to be stateless.
// The category names and severities below mirror the ones the runtime has
// always used; the backend is the `log` facade so any binary can plug in
// whatever subscriber it likes (env_logger, tracing-log, ...) instead of
// this crate hand-rolling a stderr/file writer.
//
// Austin Shafer - 2020

#[allow(dead_code, non_camel_case_types)]
pub enum LogLevel {
    critical,
    error,
    debug,
    verbose,
    info,
    profiling,
}

impl LogLevel {
    pub fn get_name(&self) -> &'static str {
        match self {
            LogLevel::critical => "critical",
            LogLevel::error => "error",
            LogLevel::debug => "debug",
            LogLevel::verbose => "verbose",
            LogLevel::info => "info",
            LogLevel::profiling => "profiling",
        }
    }
}

/// Urgent, always displayed. Maps to `log::error!` with a tag.
#[macro_export]
macro_rules! critical {
    ($($format_args:tt)+) => {
        log::error!(target: "critical", $($format_args)+)
    };
}

/// Debugging related, fairly verbose.
#[macro_export]
macro_rules! debug {
    ($($format_args:tt)+) => {
        log::debug!($($format_args)+)
    };
}

/// More verbose than `debug!`, used for per-tile/per-array chatter.
#[macro_export]
macro_rules! verbose {
    ($($format_args:tt)+) => {
        log::trace!($($format_args)+)
    };
}

/// Profiling related timing, absurdly verbose.
#[macro_export]
macro_rules! profiling {
    ($($format_args:tt)+) => {
        log::trace!(target: "profiling", $($format_args)+)
    };
}

/// Most verbose informational logging.
#[macro_export]
macro_rules! info {
    ($($format_args:tt)+) => {
        log::info!($($format_args)+)
    };
}

/// Recoverable errors, always displayed.
#[macro_export]
macro_rules! error {
    ($($format_args:tt)+) => {
        log::error!($($format_args)+)
    };
}
