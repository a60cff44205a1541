//! # NetApp Quota Exporter
//!
//! Polls a NetApp ONTAP cluster for qtree quota reports and volume space
//! accounting, and re-exposes them as a Prometheus text snapshot on every scrape.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          NETAPP QUOTA EXPORTER                           │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  SCRAPE → VOLUME POLLER ─┐                                               │
//! │         → QUOTA POLLER × N (JoinSet) ─→ SAMPLE CHANNEL → SNAPSHOT → TEXT │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every scrape is a fresh pull-collect-emit cycle. Nothing is cached between
//! scrapes, and a failing volume list, status lookup, quota filter or single
//! value only removes the samples derived from it.

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

// ============================================================================
// SECTION 1: MODULES
// ============================================================================

pub mod api;
pub mod catalogue;
pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod exposition;
pub mod logging;
pub mod server;
pub mod sink;
pub mod value;

pub use api::{QuotaApi, QuotaEntry, SearchCondition, SpaceUsage, VolumeSpaceInfo};
pub use catalogue::{LabelSchema, MetricCatalogue, MetricDesc, MetricId, SizeUnit, UsageCategory};
pub use collector::{CollectStats, PageLimits, QuotaCollector};
pub use config::ExporterConfig;
pub use error::{ApiError, ConfigError, ExporterError, ExporterResult, SinkError, ValueError};
pub use exposition::{Exporter, Snapshot};
pub use sink::{MetricSample, SampleReceiver, SampleSender};
pub use value::ApiValue;

// ============================================================================
// SECTION 2: CONSTANTS & VERSION INFORMATION
// ============================================================================

/// Exporter version - follows semantic versioning
pub const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const EXPORTER_NAME: &str = "netapp-quota-exporter";

/// Prefix of every exported metric name
pub const METRIC_NAMESPACE: &str = "netapp";

// ----------------------------------------------------------------------------
// Remote API
// ----------------------------------------------------------------------------

/// ZAPI servlet path, relative to the configured endpoint
pub const ZAPI_PATH: &str = "/servlets/netapp.servlets.admin.XMLrequest_filer";

/// XML namespace of the ZAPI envelope
pub const ZAPI_XMLNS: &str = "http://www.netapp.com/filer/admin";

/// ZAPI version requested in every envelope
pub const DEFAULT_API_VERSION: &str = "1.20";

/// Per-request timeout enforced by the API client (seconds)
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Page-size cap for every iterating call
pub const DEFAULT_MAX_RECORDS: u32 = 1000;

/// Upper bound accepted for `api.max_records`
pub const MAX_RECORDS_LIMIT: u32 = 10_000;

/// Pages fetched for a single listing before it is declared runaway
pub const DEFAULT_MAX_PAGES: usize = 10_000;

// ----------------------------------------------------------------------------
// Web & Configuration
// ----------------------------------------------------------------------------

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/netapp_quota_exporter.toml";

/// Prefix for environment overrides (`NETAPP_EXPORTER_API__PASSWORD`, ...)
pub const ENV_PREFIX: &str = "NETAPP_EXPORTER_";

/// Default Prometheus listen address
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9797";

/// Default telemetry path
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
