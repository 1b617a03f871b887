use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{self, ConfigBuilder};

/// Modules to filter out from logging when not in Trace mode.
/// HTTP stack internals that clutter the output of a token exchange.
const FILTERED_MODULES: &[&str] = &["reqwest", "hyper", "hyper_util", "h2", "rustls", "mio", "want"];

pub struct Logger {}

impl Logger {
    /// Initializes the global terminal logger at the configured level.
    ///
    /// Dependency logs only show at Trace level.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let apply_filters = Self::should_filter_dependencies(config.log_level_filter);
        let log_config = Self::build_log_config(apply_filters);

        simplelog::TermLogger::init(
            config.log_level_filter,
            log_config,
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto,
        )
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
