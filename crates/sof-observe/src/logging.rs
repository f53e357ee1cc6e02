//! Structured logging utilities
//!
//! Provides logging setup with formatting options plus span helpers carrying
//! the registry's contextual fields.

use std::str::FromStr;

use tracing::Span;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use crate::DEFAULT_FILTER;

/// How log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored
    Pretty,
    /// Single line per event
    Compact,
    /// One JSON object per event
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json]
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| anyhow::anyhow!("unsupported log format `{name}`"))
    }
}

impl LogFormat {
    pub fn name(self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Emit source file and line
    pub include_location: bool,
    pub include_target: bool,
    /// Emit span open/close events
    pub log_spans: bool,
    /// Directive string such as "info,sof=debug"; falls back to `RUST_LOG`
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            include_location: cfg!(debug_assertions),
            include_target: true,
            log_spans: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Build from a configured level and format name
    pub fn from_settings(level: &str, format: &str) -> anyhow::Result<Self> {
        Ok(Self {
            format: format.parse()?,
            filter: Some(format!("{level},sof={level}")),
            ..Self::default()
        })
    }

    fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        match &self.filter {
            Some(directives) => Ok(EnvFilter::try_new(directives)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.log_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber; fails if one is already installed
pub fn init_logging(config: LogConfig) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter()?)
        .with_span_events(config.span_events())
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("cannot install {} subscriber: {e}", config.format.name()))?;

    tracing::info!(format = config.format.name(), spans = config.log_spans, "Logging initialized");
    Ok(())
}

/// Span around one call-access evaluation
pub fn access_span(caller: &str, system: &str, function: &str) -> Span {
    tracing::info_span!(
        "call_access",
        caller = caller,
        system = system,
        function = function,
        decision = tracing::field::Empty,
        cached = tracing::field::Empty,
    )
}

/// Span around one registry mutation
pub fn mutation_span(operation: &str, caller: &str) -> Span {
    tracing::debug_span!(
        "mutation",
        operation = operation,
        caller = caller,
        staged_writes = tracing::field::Empty,
    )
}

/// Record the outcome in an access span
pub fn record_access_decision(span: &Span, decision: &str, cached: bool) {
    span.record("decision", decision);
    span.record("cached", cached);
}

/// Record how many writes a committed mutation staged
pub fn record_staged_writes(span: &Span, staged: usize) {
    span.record("staged_writes", staged);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::OnceLock;

    use super::*;

    fn init_test_logging() {
        static INSTALLED: OnceLock<()> = OnceLock::new();
        INSTALLED.get_or_init(|| {
            let config = LogConfig {
                format: LogFormat::Compact,
                log_spans: true,
                filter: Some("trace".into()),
                ..LogConfig::default()
            };
            let _ = init_logging(config);
        });
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_from_settings() {
        let config = LogConfig::from_settings("warn", "compact").unwrap();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.filter.as_deref(), Some("warn,sof=warn"));
        assert!(LogConfig::from_settings("info", "yaml").is_err());
    }

    #[test]
    fn test_access_span_creation() {
        init_test_logging();
        let span = access_span("0x01", "evefrontier:EntitySystem", "0xdeadbeef");
        assert_eq!(span.metadata().map(|m| m.name()), Some("call_access"));
        record_access_decision(&span, "allow", false);
    }

    #[test]
    fn test_mutation_span_creation() {
        init_test_logging();
        let span = mutation_span("grant_role", "0x01");
        assert_eq!(span.metadata().map(|m| m.name()), Some("mutation"));
        record_staged_writes(&span, 4);
    }
}
