//! netapp-quota-exporter binary entry point.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use tracing::info;

use netapp_quota_exporter::api::ZapiClient;
use netapp_quota_exporter::cli::{handle_generate_config, handle_validate, handle_version, Cli, Commands, OutputFormat};
use netapp_quota_exporter::config::ExporterConfig;
use netapp_quota_exporter::logging::init_logging;
use netapp_quota_exporter::{server, Exporter, MetricCatalogue, QuotaCollector, EXPORTER_NAME, EXPORTER_VERSION};

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Version) => {
            handle_version();
            return Ok(());
        }
        Some(Commands::GenerateConfig { output }) => {
            handle_generate_config(output.as_deref())?;
            return Ok(());
        }
        Some(Commands::Validate { verbose }) => {
            handle_validate(&cli.config, &cli.overrides(), *verbose)?;
            return Ok(());
        }
        _ => {}
    }

    let mut config = ExporterConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    config.apply_overrides(&cli.overrides());
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging)?;
    info!(target: "netapp_exporter::init", "{} v{}", EXPORTER_NAME, EXPORTER_VERSION);

    let exporter = build_exporter(&config)?;

    match cli.command {
        Some(Commands::Collect { format }) => {
            let snapshot = exporter.scrape().await;
            let rendered = match format {
                OutputFormat::Text => snapshot.encode_text()?,
                OutputFormat::Json => serde_json::to_string_pretty(&snapshot.to_json())?,
            };
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
        Some(Commands::Run) | None => {
            server::serve(&config.web, Arc::new(exporter)).await?;
        }
        Some(Commands::Version | Commands::GenerateConfig { .. } | Commands::Validate { .. }) => {}
    }

    Ok(())
}

fn build_exporter(config: &ExporterConfig) -> AnyhowResult<Exporter> {
    let client = ZapiClient::new(&config.api).context("Failed to create API client")?;
    let catalogue = Arc::new(MetricCatalogue::new(config.metrics.size_unit));
    let conditions = config.search_conditions();

    info!(
        target: "netapp_exporter::init",
        endpoint = %client.url(),
        conditions = conditions.len(),
        size_unit = %catalogue.unit(),
        "Exporter configured"
    );

    let collector = QuotaCollector::new(
        Arc::new(client),
        catalogue,
        conditions,
        config.api.page_limits(),
    );
    Ok(Exporter::new(Arc::new(collector), config.web.scrape_timeout()))
}
