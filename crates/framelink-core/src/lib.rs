// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

/// Installs the global subscriber. Filtering follows `RUST_LOG`; without it
/// this workspace logs at `info` and dependencies only at `warn`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
    tracing::debug!("tracing initialised");
}

const DEFAULT_FILTER: &str = "warn,framelink_app=info,framelink_vk=info,framelink_present=info";
