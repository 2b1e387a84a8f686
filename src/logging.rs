//! Tracing subscriber setup for binaries and tests embedding the engine.

use crate::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Build the filter: `RUST_LOG` first, then the configured directive.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&config.filter).unwrap_or_else(|e| {
            eprintln!("Invalid log filter {:?} ({}), using 'info'", config.filter, e);
            EnvFilter::new("info")
        })
    })
}

/// Install the global subscriber.
///
/// When a log file is configured the returned guard must be kept alive for
/// the file writer to flush. Returns `None` without a file, or when a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().unwrap_or_else(|| "nodegraph.log".as_ref());
            let appender = tracing_appender::rolling::never(dir.unwrap_or_else(|| ".".as_ref()), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(config.with_target)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer().with_target(config.with_target))
        .with(file_layer)
        .try_init();

    match result {
        Ok(()) => guard,
        Err(e) => {
            tracing::debug!("Logging already initialized: {}", e);
            None
        }
    }
}
