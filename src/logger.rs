use tracing_subscriber::{EnvFilter, fmt};

#[doc(hidden)]
pub use tracing;

/// Install the global subscriber. `RUST_LOG` wins over the default level.
pub fn init_logger() {
    init_with_level("info");
}

pub fn init_verbose_logger() {
    init_with_level("debug");
}

fn init_with_level(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vmpanel={default_level},{default_level}")));

    // A second call (tests, or a GUI embedding the CLI) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::tracing::error!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::tracing::debug!($($arg)*)
    };
}
