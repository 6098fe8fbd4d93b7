use std::env;
use std::io::IsTerminal;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber. Logs are always written to stderr.
pub fn init_tracing(config: &Config) {
    let (level, env_filter) = parse_rust_log(config.logging.level);

    let format = match config.logging.format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        format => format,
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let layer = match format {
        LogFormat::Pretty => layer.pretty().with_filter(level).boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_filter(level)
            .boxed(),
        LogFormat::Auto | LogFormat::Simplified => {
            layer.compact().with_ansi(false).with_filter(level).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();
}

/// Resolves the effective level and directive filter.
///
/// A plain level in `RUST_LOG` overrides the configured level. Anything else is used literally as
/// a set of directives.
pub fn parse_rust_log(configured: LevelFilter) -> (LevelFilter, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<Level>() {
            Ok(level) => LevelFilter::from(level),
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => configured,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new(
        "INFO,\
        mixbench_cli=TRACE,\
        mixbench_engine=TRACE,\
        mixbench_types=TRACE,\
        ",
    );

    (level, env_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_without_rust_log() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();

            let (level, _) = parse_rust_log(LevelFilter::DEBUG);
            assert_eq!(level, LevelFilter::DEBUG);

            Ok(())
        });
    }

    #[test]
    fn plain_rust_log_level_wins() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUST_LOG", "warn");

            let (level, _) = parse_rust_log(LevelFilter::DEBUG);
            assert_eq!(level, LevelFilter::WARN);

            Ok(())
        });
    }

    #[test]
    fn rust_log_directives_are_used_literally() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUST_LOG", "mixbench_engine=debug");

            let (level, filter) = parse_rust_log(LevelFilter::INFO);
            assert_eq!(level, LevelFilter::TRACE);
            assert_eq!(filter.to_string(), "mixbench_engine=debug");

            Ok(())
        });
    }
}
