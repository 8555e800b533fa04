//! Process-wide tracing subscriber setup.

use std::sync::Mutex;

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

static INITIALIZED: Mutex<bool> = Mutex::new(false);

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log level/filter '{value}': {source}")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },

    #[error("a global tracing subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),
}

/// Installs the global subscriber and routes `log` records into it.
///
/// `RUST_LOG` overrides the configured level. Calling this again after a
/// successful call does nothing.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let mut initialized = INITIALIZED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if *initialized {
        return Ok(());
    }

    let filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_target(false)),
        )?,
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().json().with_current_span(true)),
        )?,
    }

    tracing_log::LogTracer::init()?;
    *initialized = true;
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|source| LoggingError::EnvFilter {
            value: level.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_build_filter_from_level() {
        std::env::remove_var("RUST_LOG");
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("docintake=trace,warn").is_ok());
    }

    #[test]
    #[serial]
    fn test_build_filter_rejects_garbage() {
        std::env::remove_var("RUST_LOG");
        let err = build_filter("docintake=loud").unwrap_err();
        assert!(matches!(err, LoggingError::EnvFilter { ref value, .. } if value == "docintake=loud"));
    }

    #[test]
    #[serial]
    fn test_init_is_idempotent() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
        tracing::info!("logging initialized");
        log::info!("log records are bridged");
    }

    #[test]
    #[serial]
    fn test_concurrent_init_all_succeed() {
        std::env::remove_var("RUST_LOG");
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| init_logging(&LoggingConfig::default())))
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }
}
