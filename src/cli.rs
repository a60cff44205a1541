//! Command-line interface.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{ExporterConfig, Overrides};
use crate::error::{ExporterError, ExporterResult};
use crate::{DEFAULT_CONFIG_PATH, EXPORTER_NAME, EXPORTER_VERSION, ZAPI_PATH};

// ----------------------------------------------------------------------------
// Argument Parser
// ----------------------------------------------------------------------------

/// NetApp quota exporter CLI
#[derive(Parser, Debug)]
#[command(
    name = "netapp-quota-exporter",
    version,
    about = "Prometheus exporter for NetApp qtree quotas and volume space usage",
    long_about = "Queries a NetApp ONTAP cluster on every scrape for qtree quota reports, \
                  volume space accounting and quota status, and serves the result in the \
                  Prometheus text exposition format."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "NETAPP_EXPORTER_CONFIG", global = true)]
    pub config: PathBuf,

    /// Management endpoint, e.g. https://cluster.example.com
    #[arg(long = "api.endpoint", global = true)]
    pub endpoint: Option<String>,

    /// API user
    #[arg(long = "api.user", global = true)]
    pub user: Option<String>,

    /// API password
    #[arg(long = "api.password", env = "NETAPP_EXPORTER_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Address to listen on for scrapes
    #[arg(long = "web.listen-address", global = true)]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", global = true)]
    pub telemetry_path: Option<String>,

    /// Log level override
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to run (default: run)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            endpoint: self.endpoint.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            listen_address: self.listen_address.clone(),
            telemetry_path: self.telemetry_path.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Serve metrics over HTTP
    Run,

    /// Validate configuration file
    Validate {
        /// Show full parsed configuration
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a single scrape and print the result
    Collect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show version and build info
    Version,
}

/// Output format for one-shot collection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Prometheus text exposition
    Text,
    /// JSON document with samples and collect statistics
    Json,
}

// ----------------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------------

/// Load config, apply flag overrides and validate. The file must exist.
pub fn handle_validate(config_path: &Path, overrides: &Overrides, verbose: bool) -> ExporterResult<()> {
    println!("Validating configuration file: {}", config_path.display());

    let result = ExporterConfig::load_required(config_path).and_then(|mut config| {
        config.apply_overrides(overrides);
        config.validate().map(|()| config)
    });

    match result {
        Ok(config) => {
            println!("✅ Configuration is valid!");

            if verbose {
                println!("\n📋 Parsed configuration:");
                println!("{}", "=".repeat(60));
                match toml::to_string_pretty(&config.redacted()) {
                    Ok(s) => println!("{}", s),
                    Err(e) => println!("Failed to serialize: {}", e),
                }
            }

            println!("\n📊 Configuration Summary:");
            println!("  • Endpoint: {}{}", config.api.endpoint.trim_end_matches('/'), ZAPI_PATH);
            println!("  • Listen address: {}", config.web.listen_address);
            println!("  • Telemetry path: {}", config.web.telemetry_path);
            println!("  • Size unit: {}", config.metrics.size_unit);
            println!("  • Quota search conditions:");
            for condition in config.search_conditions() {
                println!("    - {}", condition);
            }

            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed!");
            println!("Error: {}", e);
            Err(ExporterError::Config(e))
        }
    }
}

/// Handle the generate-config subcommand
pub fn handle_generate_config(output: Option<&Path>) -> ExporterResult<()> {
    let config_str = ExporterConfig::generate_default_config()?;

    match output {
        Some(path) => {
            fs::write(path, &config_str)?;
            println!("✅ Default configuration written to: {}", path.display());
        }
        None => {
            println!("{}", config_str);
        }
    }

    Ok(())
}

/// Handle the version subcommand
pub fn handle_version() {
    println!("{} v{}", EXPORTER_NAME, EXPORTER_VERSION);
    println!();
    println!("Build Information:");
    println!("  • Package: {}", env!("CARGO_PKG_NAME"));
    println!("  • Remote API: ONTAP ZAPI ({})", ZAPI_PATH);
}
