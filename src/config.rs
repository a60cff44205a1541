//! Exporter configuration.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. TOML file (optional)
//! 3. `NETAPP_EXPORTER_*` environment variables (`__` separates sections)
//! 4. Command-line flags, applied through [`Overrides`]
//!
//! Validation runs once all sources are merged.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::SearchCondition;
use crate::catalogue::SizeUnit;
use crate::collector::PageLimits;
use crate::error::ConfigError;
use crate::{
    DEFAULT_API_TIMEOUT_SECS, DEFAULT_API_VERSION, DEFAULT_LISTEN_ADDRESS, DEFAULT_MAX_PAGES,
    DEFAULT_MAX_RECORDS, DEFAULT_TELEMETRY_PATH, ENV_PREFIX, MAX_RECORDS_LIMIT,
};

// ----------------------------------------------------------------------------
// Root Configuration
// ----------------------------------------------------------------------------

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Remote API connection
    #[serde(default)]
    pub api: ApiConfig,

    /// HTTP listener
    #[serde(default)]
    pub web: WebConfig,

    /// Metric naming
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Quota report filters; an empty list means one wildcard filter
    #[serde(default, rename = "quota_search_condition")]
    pub quota_search_conditions: Vec<SearchCondition>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ExporterConfig {
    /// Load from `path` plus environment overrides.
    ///
    /// A missing file yields defaults; a present but unparsable one is an
    /// error. The result is not validated yet, since flags may still fill in
    /// required fields.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let mut figment = Figment::new();
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        } else {
            debug!(
                target: "netapp_exporter::config",
                path = %path.display(),
                "Config file not found, using defaults"
            );
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }

    /// Like [`ExporterConfig::load`], but the file must exist.
    pub fn load_required<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::load(path)
    }

    /// Parse and validate a TOML document.
    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(endpoint) = &overrides.endpoint {
            self.api.endpoint = endpoint.clone();
        }
        if let Some(user) = &overrides.user {
            self.api.user = user.clone();
        }
        if let Some(password) = &overrides.password {
            self.api.password = password.clone();
        }
        if let Some(address) = &overrides.listen_address {
            self.web.listen_address = address.clone();
        }
        if let Some(path) = &overrides.telemetry_path {
            self.web.telemetry_path = path.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.endpoint.is_empty() {
            return Err(ConfigError::missing_field("api.endpoint"));
        }
        let url = reqwest::Url::parse(&self.api.endpoint)
            .map_err(|e| ConfigError::invalid_value("api.endpoint", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid_value(
                "api.endpoint",
                format!("Unsupported scheme '{}', expected http or https", url.scheme()),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "api.timeout_secs",
                "Timeout must be at least 1 second",
            ));
        }

        if self.api.max_records == 0 || self.api.max_records > MAX_RECORDS_LIMIT {
            return Err(ConfigError::invalid_value(
                "api.max_records",
                format!("Page size must be between 1 and {}", MAX_RECORDS_LIMIT),
            ));
        }

        if self.api.max_pages == 0 {
            return Err(ConfigError::invalid_value(
                "api.max_pages",
                "At least one page must be allowed",
            ));
        }

        self.web.socket_addr()?;

        if !self.web.telemetry_path.starts_with('/') || self.web.telemetry_path == "/" {
            return Err(ConfigError::invalid_value(
                "web.telemetry_path",
                "Path must start with '/' and must not be the root path",
            ));
        }

        if self.web.scrape_timeout_secs == Some(0) {
            return Err(ConfigError::invalid_value(
                "web.scrape_timeout_secs",
                "Scrape timeout must be at least 1 second when set",
            ));
        }

        Ok(())
    }

    /// Search conditions as the collector sees them.
    pub fn search_conditions(&self) -> Vec<SearchCondition> {
        if self.quota_search_conditions.is_empty() {
            vec![SearchCondition::wildcard()]
        } else {
            self.quota_search_conditions.clone()
        }
    }

    /// Copy safe to print: the API password is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.api.password.is_empty() {
            config.api.password = "********".into();
        }
        config
    }

    /// Create a default config file
    pub fn generate_default_config() -> Result<String, ConfigError> {
        let mut config = Self::default();
        config.api.endpoint = "https://cluster.example.com".into();
        config.api.user = "monitor".into();
        config.quota_search_conditions.push(SearchCondition::wildcard());

        let body = toml::to_string_pretty(&config).map_err(|e| ConfigError::SerializeError {
            message: e.to_string(),
        })?;
        Ok(format!(
            "# netapp-quota-exporter configuration\n\
             # Environment overrides: NETAPP_EXPORTER_API__PASSWORD=...\n\n{}",
            body
        ))
    }
}

/// Values taken from command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub listen_address: Option<String>,
    pub telemetry_path: Option<String>,
    pub log_level: Option<String>,
}

// ----------------------------------------------------------------------------
// API Configuration
// ----------------------------------------------------------------------------

/// Connection to the storage system's management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://cluster.example.com`
    #[serde(default)]
    pub endpoint: String,

    #[serde(default, deserialize_with = "string_or_number")]
    pub user: String,

    #[serde(default, deserialize_with = "string_or_number")]
    pub password: String,

    /// ZAPI version requested in each envelope
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,

    /// Verify the server's TLS certificate
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Records per page for iterating calls
    #[serde(default = "default_max_records")]
    pub max_records: u32,

    /// Pages fetched before a listing is abandoned
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            user: String::new(),
            password: String::new(),
            api_version: default_api_version(),
            timeout_secs: default_api_timeout(),
            verify_tls: true,
            max_records: default_max_records(),
            max_pages: default_max_pages(),
        }
    }
}

impl ApiConfig {
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            max_records: self.max_records,
            max_pages: self.max_pages,
        }
    }
}

// ----------------------------------------------------------------------------
// Web Configuration
// ----------------------------------------------------------------------------

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,

    /// Upper bound on one scrape; unset means no deadline
    #[serde(default)]
    pub scrape_timeout_secs: Option<u64>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            telemetry_path: default_telemetry_path(),
            scrape_timeout_secs: None,
        }
    }
}

impl WebConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_address
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::invalid_value("web.listen_address", e.to_string())
            })
    }

    pub fn scrape_timeout(&self) -> Option<Duration> {
        self.scrape_timeout_secs.map(Duration::from_secs)
    }
}

// ----------------------------------------------------------------------------
// Metrics Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Unit the storage system reports absolute sizes in
    #[serde(default)]
    pub size_unit: SizeUnit,
}

// ----------------------------------------------------------------------------
// Logging Configuration
// ----------------------------------------------------------------------------

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable ANSI colors
    #[serde(default = "default_true")]
    pub colors: bool,

    /// Include source location
    #[serde(default)]
    pub source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            colors: true,
            source_location: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Lenient Credentials
// ----------------------------------------------------------------------------

/// Accept a number where a string is expected.
///
/// Environment values are typed on read, so `..._PASSWORD=123456` arrives as
/// an integer.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or a number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.into()
}

fn default_api_timeout() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}

fn default_max_records() -> u32 {
    DEFAULT_MAX_RECORDS
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.into()
}

fn default_telemetry_path() -> String {
    DEFAULT_TELEMETRY_PATH.into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}
