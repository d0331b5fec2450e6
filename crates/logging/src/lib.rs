#![deny(unsafe_code)]

//! # Overview
//!
//! Thin wrapper around [`tracing_subscriber`] shared by the `sender` and
//! `receiver` binaries. The count of `-v` flags on the command line maps to
//! a default filter level; `RUST_LOG` always takes precedence when set, so
//! operators can still target individual modules.
//!
//! # Design
//!
//! - 0 `-v` flags: `warn`.
//! - 1: `info`.
//! - 2: `debug`.
//! - 3 or more: `trace`.

use tracing_subscriber::EnvFilter;

/// Maps a `-v` repeat count to a default `tracing` level, then installs a
/// compact `fmt` subscriber as the global default.
///
/// `RUST_LOG`, if set, overrides the level derived from `verbosity`.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
