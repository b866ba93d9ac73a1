//! # Logging & Tracing Infrastructure
//!
//! Structured logging with the `tracing` crate:
//! - Pretty, JSON and compact output formats (native)
//! - Browser console output through `tracing-wasm` (wasm32)
//! - Module-level filtering
//! - Forwarding to a host [`LoggerSink`]
//! - URL redaction for signed video links
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//!
//! init_logging(config)?;
//! tracing::info!("Player started");
//! ```
//!
//! ## Signed URLs
//!
//! Video URLs usually carry short-lived signatures in their query string.
//! Log them through [`redact_url`] only:
//!
//! ```rust
//! use core_runtime::logging::redact_url;
//!
//! assert_eq!(
//!     redact_url("https://cdn.example.com/game.mp4?X-Amz-Signature=abc"),
//!     "https://cdn.example.com/game.mp4?[REDACTED]"
//! );
//! ```

use crate::error::{Error, Result};
use bridge_traits::{LogLevel, LoggerSink};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::{ParseError, Position, Url};

#[cfg(not(target_arch = "wasm32"))]
use bridge_traits::LogEntry;
#[cfg(not(target_arch = "wasm32"))]
use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::{fmt, io};
#[cfg(not(target_arch = "wasm32"))]
use tracing::field::{Field, Visit};
#[cfg(not(target_arch = "wasm32"))]
use tracing::{Event, Subscriber};
#[cfg(not(target_arch = "wasm32"))]
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::Context,
    registry::LookupSpan,
    Layer,
};

/// Crates whose events are governed by the configured level. Everything else
/// is held at `warn`.
const ENGINE_CRATES: &[&str] = &[
    "courtside",
    "core_runtime",
    "core_playback",
    "core_async",
    "bridge_traits",
    "bridge_wasm",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Single-line format
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Minimum level for engine crates
    pub level: LogLevel,
    /// Custom filter string (e.g., "core_playback::recovery=trace")
    pub filter: Option<String>,
    /// Optional sink mirroring events to the host
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span enter/exit (pretty format only)
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Builds the default directive string: engine crates at `level`,
/// everything else at `warn`.
fn default_directives(level: LogLevel) -> String {
    let level = level_name(level);
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        ENGINE_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, level)),
    );
    directives.join(",")
}

/// Initialize the logging system
///
/// Call once during startup. Subsequent calls return an error.
///
/// # Errors
///
/// `Error::Config` for an invalid filter, `Error::LoggingInstalled` when a
/// global subscriber already exists.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let span_events = if config.enable_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_span_events(span_events)
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_writer(io::stdout)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_writer(io::stdout)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(LoggerSinkLayer::new(config.logger_sink))
        .try_init()
        .map_err(|e| Error::LoggingInstalled(e.to_string()))
}

/// Initialize logging for the browser.
///
/// Events go to the developer console through `tracing-wasm`. A host
/// `LoggerSink` is not attached on wasm: browser bridges are not `Send`, which
/// a global subscriber requires.
#[cfg(target_arch = "wasm32")]
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let max_level = match config.level {
        LogLevel::Trace => tracing::Level::TRACE,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    };
    let wasm_config = tracing_wasm::WASMLayerConfigBuilder::new()
        .set_max_level(max_level)
        .build();

    tracing_subscriber::registry()
        .with(tracing_wasm::WASMLayer::new(wasm_config))
        .try_init()
        .map_err(|e| Error::LoggingInstalled(e.to_string()))
}

#[cfg(not(target_arch = "wasm32"))]
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = config
        .filter
        .clone()
        .unwrap_or_else(|| default_directives(config.level));

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

// ============================================================================
// Host sink forwarding
// ============================================================================

/// Layer that forwards events to a `LoggerSink` implementation.
#[cfg(not(target_arch = "wasm32"))]
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

#[cfg(not(target_arch = "wasm32"))]
impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = tracing_level_to_log_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut visitor = SinkVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (key, value) in visitor.fields {
            entry = entry.with_field(key, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_field("span", span.name());
        }

        let sink = Arc::clone(sink);
        if let Ok(handle) = core_async::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
            return;
        }

        if let Err(err) = core_async::runtime::block_on(sink.log(entry)) {
            eprintln!("LoggerSink error: {}", err);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Default)]
struct SinkVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

#[cfg(not(target_arch = "wasm32"))]
impl SinkVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Visit for SinkVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, format!("{:.3}", value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn tracing_level_to_log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

// ============================================================================
// Redaction
// ============================================================================

/// Strips the query string and fragment from a URL for logging.
///
/// Signed storage URLs carry their credentials in the query string. The path
/// is kept so logs still identify the file. Relative URLs stay relative;
/// anything that does not parse is replaced entirely.
pub fn redact_url(raw: &str) -> String {
    let base = Url::parse(REDACTION_BASE).ok();
    let relative = matches!(Url::parse(raw), Err(ParseError::RelativeUrlWithoutBase));
    let Ok(url) = Url::options().base_url(base.as_ref()).parse(raw) else {
        return REDACTED.to_string();
    };

    let start = if relative {
        Position::BeforePath
    } else {
        Position::BeforeScheme
    };
    let kept = &url[start..Position::AfterPath];
    match url.query() {
        Some(_) => format!("{kept}?{REDACTED}"),
        None => kept.to_string(),
    }
}

const REDACTED: &str = "[REDACTED]";

/// Resolves relative URLs during redaction; never part of the output.
const REDACTION_BASE: &str = "http://relative.invalid/";

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_filter("core_playback=trace")
            .with_spans(true)
            .with_target(false)
            .with_thread_info(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter, Some("core_playback=trace".to_string()));
        assert!(config.enable_spans);
        assert!(!config.display_target);
        assert!(config.display_thread_info);
    }

    #[test]
    fn test_default_directives_cover_engine_crates() {
        let directives = default_directives(LogLevel::Debug);

        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("core_playback=debug"));
        assert!(directives.contains("bridge_wasm=debug"));
    }

    #[test]
    fn test_build_filter() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let filter = build_filter(&config).unwrap();
        assert!(filter.to_string().contains("core_playback=debug"));
    }

    #[test]
    fn test_build_custom_filter() {
        let config = LoggingConfig::default().with_filter("core_playback::recovery=trace");
        let filter = build_filter(&config).unwrap();
        assert!(filter
            .to_string()
            .contains("core_playback::recovery=trace"));
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://cdn.example.com/v/game.mp4?token=abc&exp=1"),
            "https://cdn.example.com/v/game.mp4?[REDACTED]"
        );
        assert_eq!(
            redact_url("https://cdn.example.com/v/game.mp4#t=10"),
            "https://cdn.example.com/v/game.mp4"
        );
        assert_eq!(
            redact_url("https://cdn.example.com/v/game.webm"),
            "https://cdn.example.com/v/game.webm"
        );
        assert_eq!(
            redact_url("/videos/game.mp4?sig=abc#t=4"),
            "/videos/game.mp4?[REDACTED]"
        );
        assert_eq!(redact_url("https://[::1/game.mp4?sig=abc"), "[REDACTED]");
    }

    #[test]
    fn test_logger_sink_layer_forwards_event() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::warn!(target: "core_playback::recovery", attempt = 2_u64, "Retrying playback");
        tracing::trace!(target: "core_playback::recovery", "dropped below sink level");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_playback::recovery");
        assert_eq!(entry.message, "Retrying playback");
        assert_eq!(entry.fields.get("attempt"), Some(&"2".to_string()));
    }

    #[derive(Default)]
    struct TestLoggerSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for TestLoggerSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }
}
