use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber. `RUST_LOG` overrides `log_level`.
///
/// Keep the returned guard alive for the life of the process or buffered
/// file output is lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(true).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}

/// Dependencies log at `warn`; the ledger's own modules at `log_level`,
/// then any `log_targets` overrides, which win because they come last.
pub fn filter_directives(config: &AppConfig) -> String {
    let mut directives = vec![
        "warn".to_string(),
        // sqlx logs every statement at info, so it stays under the base level
        format!("medtrace={}", config.log_level),
    ];
    directives.extend(
        config
            .log_targets
            .iter()
            .map(|(target, level)| format!("{}={}", target, level)),
    );
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_targets: &[(&str, &str)]) -> AppConfig {
        let mut config = AppConfig::from_yaml(
            r#"
log_level: debug
log_dir: ./logs
log_file: medtrace.log
use_json: false
rotation: never
gateway:
  host: 127.0.0.1
  port: 8080
"#,
        )
        .unwrap();
        config.log_targets = log_targets
            .iter()
            .map(|(t, l)| (t.to_string(), l.to_string()))
            .collect();
        config
    }

    #[test]
    fn test_ledger_modules_follow_log_level() {
        assert_eq!(
            filter_directives(&config(&[])),
            "warn,medtrace=debug"
        );
    }

    #[test]
    fn test_target_overrides_follow_defaults() {
        let directives = filter_directives(&config(&[
            ("medtrace::store", "trace"),
            ("sqlx", "info"),
        ]));
        assert_eq!(
            directives,
            "warn,medtrace=debug,medtrace::store=trace,sqlx=info"
        );
        EnvFilter::try_new(&directives).unwrap();
    }
}
