//! `gatehouse-observability` — process-wide log subscriber setup.
//!
//! Libraries in this workspace only emit `tracing` events; the embedding
//! process calls [`init`] once at startup to decide where they go.

pub mod subscriber;

pub use subscriber::{LogFormat, LogSettings};

/// Install the subscriber configured from the environment.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init() -> bool {
    subscriber::init(&LogSettings::from_env())
}
