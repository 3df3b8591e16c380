//! Logging setup
//!
//! Library code only uses the `log` macros. Applications that want output call one of
//! these initialisers once; repeated calls are harmless.

use log::LevelFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "warn,d1_client=info";

/// Install `env_logger` with this crate at `level` and everything else at `warn`.
///
/// Returns false when a logger was already installed.
pub fn init(level: LevelFilter) -> bool {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("d1_client", level)
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

/// Install `env_logger` configured from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn init_from_env() -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
