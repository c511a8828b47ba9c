// SPDX-License-Identifier: GPL-3.0-only

//! Tracing subscriber setup
//!
//! Set the RUST_LOG environment variable to control the log level.
//! Examples: RUST_LOG=debug, RUST_LOG=resistor_scan=debug, RUST_LOG=info

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// `default_directive` applies when RUST_LOG is unset or invalid. Logs go
/// to stderr so stdout stays free for JSON output. Calling this twice is
/// harmless; the second call is ignored.
pub fn init(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}
