//! tracing subscriber setup
//!
//! Log lines go to stderr so `sonda check --format json` and `sonda config`
//! keep stdout machine-readable. `RUST_LOG` wins over `-v`/`-q`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{CliConfig, LogFormat};
use crate::error::{CliError, CliResult};

/// Filter from `RUST_LOG`, falling back to the verbosity default
fn env_filter(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.default_filter()))
}

/// Install the global subscriber
pub fn init(config: &CliConfig) -> CliResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = match config.log_format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(config.color.should_color_stderr()),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
    };

    result.map_err(|e| CliError::logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;

    #[test]
    fn test_second_init_fails() {
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);
        // the first call may lose to another test in this binary
        let _ = init(&config);
        let err = init(&config).unwrap_err();
        assert!(matches!(err, CliError::Logging { .. }));
    }
}
