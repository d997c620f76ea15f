// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

mod clock;

pub use clock::{as_millis_f32, FrameClock};

/// Installs the global `tracing` subscriber. `RUST_LOG` wins; otherwise `info`.
/// Safe to call more than once (later calls are ignored).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
