// src/utils/log.rs

//! Structured logging for the XTC encoder.
//!
//! Built on the `tracing` crate. The library only emits events; a binary
//! (or a test harness) opts into output by installing a subscriber once
//! at startup:
//!
//! ```ignore
//! xtc_encoder::utils::log::init_subscriber(tracing::Level::INFO);
//! ```

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Initializes a global logging subscriber.
///
/// This should be called once at the beginning of the program's execution.
/// It sets up a simple subscriber that logs messages to standard error.
///
/// # Arguments
/// * `max_level` - The maximum level of messages to log (e.g., `Level::INFO`, `Level::DEBUG`).
pub fn init_subscriber(max_level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default tracing subscriber failed");
}
