//! Configuration management.
//!
//! Values are layered: built-in defaults, then a TOML file, then
//! `MARKSEARCH_*` environment variables, then command-line flags.

use crate::embedding::{DEFAULT_LOGO_DIMENSIONS, DEFAULT_TEXT_DIMENSIONS, EmbeddingBulkheadConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted `top_k`; the candidate allowlist becomes one bound
/// parameter per id.
pub const MAX_TOP_K: usize = 10_000;

/// Main configuration for marksearch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarksearchConfig {
    /// Directory holding the database and other state.
    pub data_dir: PathBuf,
    /// Explicit database path (defaults to `<data_dir>/marksearch.db`).
    pub db_path: Option<PathBuf>,
    /// Logo embedding dimensions.
    pub logo_dimensions: usize,
    /// Text embedding dimensions.
    pub text_dimensions: usize,
    /// ANN candidates kept per image query.
    pub top_k: usize,
    /// Per-query deadline in milliseconds.
    pub query_timeout_ms: u64,
    /// Periodic rebuild interval in seconds (0 = disabled).
    pub rebuild_interval_secs: u64,
    /// Whether the server rebuilds the index when it starts.
    pub rebuild_on_start: bool,
    /// HTTP server settings.
    pub http: HttpSettings,
    /// Embedding bulkhead settings.
    pub embedding: EmbeddingBulkheadConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `marksearch=debug`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
    /// Optional log file; logs go to stderr otherwise.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Whether the exporter is installed.
    pub enabled: bool,
    /// Exporter listen port.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database path.
    pub db_path: Option<String>,
    /// Logo embedding dimensions.
    pub logo_dimensions: Option<usize>,
    /// Text embedding dimensions.
    pub text_dimensions: Option<usize>,
    /// ANN candidates per image query.
    pub top_k: Option<usize>,
    /// Query deadline.
    pub query_timeout_ms: Option<u64>,
    /// Periodic rebuild interval.
    pub rebuild_interval_secs: Option<u64>,
    /// Rebuild at server start.
    pub rebuild_on_start: Option<bool>,
    /// HTTP section.
    pub http: Option<HttpSettings>,
    /// Embedding bulkhead section.
    pub embedding: Option<EmbeddingBulkheadConfig>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

impl Default for MarksearchConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_path: None,
            logo_dimensions: DEFAULT_LOGO_DIMENSIONS,
            text_dimensions: DEFAULT_TEXT_DIMENSIONS,
            top_k: crate::services::DEFAULT_TOP_K,
            query_timeout_ms: 10_000,
            rebuild_interval_secs: 0,
            rebuild_on_start: true,
            http: HttpSettings::default(),
            embedding: EmbeddingBulkheadConfig::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl MarksearchConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for malformed TOML or unknown keys.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidInput(format!("config file: {e}")))?;
        Ok(Self::from_config_file(file))
    }

    /// Returns the default config file location,
    /// `<config_dir>/marksearch/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("marksearch").join("config.toml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path().filter(|path| path.exists()) else {
            return Self::default();
        };
        Self::load_from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
            Self::default()
        })
    }

    /// Loads configuration from `path` if given, else from the default
    /// location.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::load_default()), Self::load_from_file)
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        config.db_path = file.db_path.map(PathBuf::from);
        if let Some(v) = file.logo_dimensions {
            config.logo_dimensions = v;
        }
        if let Some(v) = file.text_dimensions {
            config.text_dimensions = v;
        }
        if let Some(v) = file.top_k {
            config.top_k = v;
        }
        if let Some(v) = file.query_timeout_ms {
            config.query_timeout_ms = v;
        }
        if let Some(v) = file.rebuild_interval_secs {
            config.rebuild_interval_secs = v;
        }
        if let Some(v) = file.rebuild_on_start {
            config.rebuild_on_start = v;
        }
        if let Some(http) = file.http {
            config.http = http;
        }
        if let Some(embedding) = file.embedding {
            config.embedding = embedding;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        config
    }

    /// Applies overrides from a variable lookup.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `MARKSEARCH_DATA_DIR` | `data_dir` |
    /// | `MARKSEARCH_DB_PATH` | `db_path` |
    /// | `MARKSEARCH_LOGO_DIMENSIONS` | `logo_dimensions` |
    /// | `MARKSEARCH_TEXT_DIMENSIONS` | `text_dimensions` |
    /// | `MARKSEARCH_TOP_K` | `top_k` |
    /// | `MARKSEARCH_QUERY_TIMEOUT_MS` | `query_timeout_ms` |
    /// | `MARKSEARCH_REBUILD_INTERVAL_SECS` | `rebuild_interval_secs` |
    /// | `MARKSEARCH_REBUILD_ON_START` | `rebuild_on_start` |
    /// | `MARKSEARCH_HTTP_HOST` | `http.host` |
    /// | `MARKSEARCH_HTTP_PORT` | `http.port` |
    /// | `MARKSEARCH_MAX_UPLOAD_BYTES` | `http.max_upload_bytes` |
    /// | `MARKSEARCH_LOG_LEVEL` | `logging.level` |
    /// | `MARKSEARCH_LOG_FORMAT` | `logging.format` |
    /// | `MARKSEARCH_LOG_FILE` | `logging.file` |
    /// | `MARKSEARCH_METRICS_ENABLED` | `metrics.enabled` |
    /// | `MARKSEARCH_METRICS_PORT` | `metrics.port` |
    ///
    /// Embedding bulkhead variables are described on
    /// [`EmbeddingBulkheadConfig::with_overrides`]. Unparseable values are
    /// ignored.
    #[must_use]
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = text("MARKSEARCH_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = text("MARKSEARCH_DB_PATH") {
            self.db_path = Some(PathBuf::from(v));
        }
        parse_into(text("MARKSEARCH_LOGO_DIMENSIONS"), &mut self.logo_dimensions);
        parse_into(text("MARKSEARCH_TEXT_DIMENSIONS"), &mut self.text_dimensions);
        parse_into(text("MARKSEARCH_TOP_K"), &mut self.top_k);
        parse_into(text("MARKSEARCH_QUERY_TIMEOUT_MS"), &mut self.query_timeout_ms);
        parse_into(
            text("MARKSEARCH_REBUILD_INTERVAL_SECS"),
            &mut self.rebuild_interval_secs,
        );
        if let Some(v) = text("MARKSEARCH_REBUILD_ON_START") {
            self.rebuild_on_start = parse_bool(&v);
        }
        if let Some(v) = text("MARKSEARCH_HTTP_HOST") {
            self.http.host = v;
        }
        parse_into(text("MARKSEARCH_HTTP_PORT"), &mut self.http.port);
        parse_into(
            text("MARKSEARCH_MAX_UPLOAD_BYTES"),
            &mut self.http.max_upload_bytes,
        );
        if let Some(v) = text("MARKSEARCH_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = text("MARKSEARCH_LOG_FORMAT") {
            self.logging.format = v;
        }
        if let Some(v) = text("MARKSEARCH_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(v));
        }
        if let Some(v) = text("MARKSEARCH_METRICS_ENABLED") {
            self.metrics.enabled = parse_bool(&v);
        }
        parse_into(text("MARKSEARCH_METRICS_PORT"), &mut self.metrics.port);

        self.embedding = self.embedding.with_overrides(&lookup);
        self
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Checks that values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidInput(msg.to_string()));
        if self.logo_dimensions == 0 {
            return invalid("logo_dimensions must be positive");
        }
        if self.text_dimensions == 0 {
            return invalid("text_dimensions must be positive");
        }
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(Error::InvalidInput(format!(
                "top_k must be between 1 and {MAX_TOP_K}"
            )));
        }
        if self.query_timeout_ms == 0 {
            return invalid("query_timeout_ms must be positive");
        }
        if self.embedding.max_concurrent == 0 {
            return invalid("embedding.max_concurrent must be positive");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return invalid("logging.format must be 'pretty' or 'json'");
        }
        Ok(())
    }

    /// Returns the database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("marksearch.db"))
    }

    /// Returns the query deadline.
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Returns the periodic rebuild interval, if enabled.
    #[must_use]
    pub const fn rebuild_interval(&self) -> Option<Duration> {
        if self.rebuild_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.rebuild_interval_secs))
        }
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".marksearch"),
        |dirs| dirs.data_local_dir().join("marksearch"),
    )
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_into<T: std::str::FromStr>(value: Option<String>, target: &mut T) {
    if let Some(raw) = value {
        match raw.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(value = %raw, "Ignoring unparseable override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MarksearchConfig::default();
        assert_eq!(config.logo_dimensions, 512);
        assert_eq!(config.text_dimensions, 384);
        assert_eq!(config.top_k, 50);
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
        assert!(config.rebuild_interval().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_from_toml() {
        let config = MarksearchConfig::from_toml(
            r#"
            data_dir = "/srv/marks"
            top_k = 25
            rebuild_interval_secs = 600

            [http]
            port = 9000

            [embedding]
            max_concurrent = 4
            fail_fast = true

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/srv/marks/marksearch.db"));
        assert_eq!(config.top_k, 25);
        assert_eq!(config.rebuild_interval(), Some(Duration::from_secs(600)));
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.embedding.max_concurrent, 4);
        assert!(config.embedding.fail_fast);
        assert_eq!(config.embedding.acquire_timeout_ms, 5_000);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            MarksearchConfig::from_toml("colour = \"blue\""),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = MarksearchConfig::default().apply_overrides(lookup(&[
            ("MARKSEARCH_DB_PATH", "/tmp/marks.db"),
            ("MARKSEARCH_TOP_K", "7"),
            ("MARKSEARCH_HTTP_PORT", "not-a-port"),
            ("MARKSEARCH_METRICS_ENABLED", "yes"),
            ("MARKSEARCH_REBUILD_ON_START", "false"),
            ("MARKSEARCH_EMBEDDING_FAIL_FAST", "1"),
        ]));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/marks.db"));
        assert_eq!(config.top_k, 7);
        assert_eq!(config.http.port, 8080);
        assert!(config.metrics.enabled);
        assert!(!config.rebuild_on_start);
        assert!(config.embedding.fail_fast);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MarksearchConfig::default();
        config.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = MarksearchConfig::default();
        config.top_k = MAX_TOP_K + 1;
        assert!(config.validate().is_err());

        let mut config = MarksearchConfig::default();
        config.logo_dimensions = 0;
        assert!(config.validate().is_err());

        let mut config = MarksearchConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        assert!(MarksearchConfig::load(Some(Path::new("/nonexistent/config.toml"))).is_err());
    }
}
