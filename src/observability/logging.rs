//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything but `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub directive: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr otherwise.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_settings(&LoggingSettings::default(), false)
    }
}

impl LoggingConfig {
    /// Builds logging configuration from settings.
    ///
    /// `verbose` raises the crate's own level to `debug`.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = if verbose {
            format!("{},marksearch=debug", settings.level)
        } else {
            settings.level.clone()
        };
        Self {
            directive,
            format: LogFormat::parse(&settings.format),
            file: settings.file.clone(),
        }
    }

    /// Builds the event filter. `RUST_LOG` wins over the configured level.
    #[must_use]
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(&self.directive).unwrap_or_else(|_| EnvFilter::new("info"))
        })
    }
}
