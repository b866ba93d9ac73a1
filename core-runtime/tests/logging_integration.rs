//! Integration tests for the logging system

use bridge_traits::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_url, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait::async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[test]
fn test_global_initialization_forwards_to_sink_once() {
    // Only one global subscriber can exist per process, so this is the only
    // test in this binary that installs one.
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Info)
        .with_logger_sink(sink.clone());

    init_logging(config).expect("first initialization succeeds");

    tracing::info!(target: "core_playback::adapter", url = %redact_url("https://cdn.example.com/a.mp4?sig=1"), "Loading source");
    tracing::debug!(target: "core_playback::adapter", "below the configured level");
    tracing::info!(target: "hyper::client", "third-party noise held at warn");

    let entries = sink.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "Loading source");
    assert_eq!(
        entries[0].fields.get("url"),
        Some(&"https://cdn.example.com/a.mp4?[REDACTED]".to_string())
    );
    drop(entries);

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(Error::LoggingInstalled(_))));
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
