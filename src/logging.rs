//! Logger setup for the binary and for callers embedding the engine

use crate::config::EngineConfig;

/// Initialise `env_logger` with the config's level as the default filter.
///
/// `RUST_LOG` overrides the config. Calling this more than once is harmless.
pub fn init(config: &EngineConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
