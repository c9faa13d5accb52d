//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names fall back to [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Event filter.
    pub filter: EnvFilter,
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Default level directive.
    pub const DEFAULT_LEVEL: &'static str = "warn";

    /// Resolves logging configuration.
    ///
    /// `RUST_LOG` overrides the configured level. `verbose` forces `debug`
    /// when `RUST_LOG` is unset.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let level = if verbose {
            "debug"
        } else {
            settings
                .and_then(|s| s.level.as_deref())
                .unwrap_or(Self::DEFAULT_LEVEL)
        };
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new(Self::DEFAULT_LEVEL));

        Self {
            filter,
            format: settings
                .and_then(|s| s.format.as_deref())
                .map(LogFormat::parse)
                .unwrap_or_default(),
            file: settings.and_then(|s| s.file.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json" => LogFormat::Json; "json")]
    #[test_case("JSON" => LogFormat::Json; "uppercase")]
    #[test_case("pretty" => LogFormat::Pretty; "pretty")]
    #[test_case("xml" => LogFormat::Pretty; "unknown")]
    fn test_log_format_parse(s: &str) -> LogFormat {
        LogFormat::parse(s)
    }

    #[test]
    fn test_from_settings_reads_format_and_file() {
        let settings = LoggingSettings {
            level: Some("info".to_string()),
            format: Some("json".to_string()),
            file: Some(PathBuf::from("/tmp/userstore.log")),
        };

        let config = LoggingConfig::from_settings(Some(&settings), false);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/userstore.log")));
    }

    #[test]
    fn test_from_settings_defaults() {
        let config = LoggingConfig::from_settings(None, true);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.file, None);
    }
}
