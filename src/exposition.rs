//! Per-scrape exposition.
//!
//! Each scrape gets its own sample channel and, when encoded, its own
//! `prometheus::Registry`. Nothing carries over between scrapes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing::{info, warn};

use crate::catalogue::{MetricCatalogue, MetricId};
use crate::collector::{CollectStats, QuotaCollector};
use crate::error::{ExporterError, ExporterResult};
use crate::sink::{self, MetricSample, SampleReceiver};

// ----------------------------------------------------------------------------
// Snapshot
// ----------------------------------------------------------------------------

/// Samples gathered by one scrape.
#[derive(Debug, Clone)]
pub struct Snapshot {
    catalogue: Arc<MetricCatalogue>,
    samples: Vec<MetricSample>,
    stats: Option<CollectStats>,
}

impl Snapshot {
    pub fn new(catalogue: Arc<MetricCatalogue>, samples: Vec<MetricSample>) -> Self {
        Self {
            catalogue,
            samples,
            stats: None,
        }
    }

    /// Receive until every sender is gone.
    pub async fn drain(catalogue: Arc<MetricCatalogue>, rx: SampleReceiver) -> Self {
        let mut samples = Vec::new();
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }
        Self::new(catalogue, samples)
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Collect statistics; `None` when the scrape deadline cut collection short.
    pub fn stats(&self) -> Option<&CollectStats> {
        self.stats.as_ref()
    }

    /// Prometheus text exposition format.
    ///
    /// Only metrics with at least one sample appear. A repeated label set
    /// keeps the last value written.
    pub fn encode_text(&self) -> ExporterResult<String> {
        let registry = Registry::new();
        let mut vecs: HashMap<MetricId, GaugeVec> = HashMap::new();

        for sample in &self.samples {
            if !vecs.contains_key(&sample.metric) {
                let desc = self.catalogue.get(sample.metric);
                let vec = GaugeVec::new(
                    Opts::new(desc.name.clone(), desc.help.clone()),
                    desc.schema.names(),
                )?;
                registry.register(Box::new(vec.clone()))?;
                vecs.insert(sample.metric, vec);
            }

            let Some(gauge_vec) = vecs.get(&sample.metric) else {
                continue;
            };
            match gauge_vec.get_metric_with_label_values(&sample.label_strs()) {
                Ok(gauge) => gauge.set(sample.value),
                Err(e) => warn!(
                    target: "netapp_exporter::exposition",
                    metric = %self.catalogue.get(sample.metric).name,
                    error = %e,
                    "Dropping sample"
                ),
            }
        }

        let mut buffer = Vec::with_capacity(8192);
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ExporterError::Internal(e.to_string()))
    }

    /// JSON rendering for one-shot collection.
    pub fn to_json(&self) -> JsonValue {
        let samples: Vec<JsonValue> = self
            .samples
            .iter()
            .map(|sample| {
                let desc = self.catalogue.get(sample.metric);
                let labels: JsonMap<String, JsonValue> = desc
                    .schema
                    .names()
                    .iter()
                    .zip(sample.labels.iter())
                    .map(|(name, value)| (name.to_string(), JsonValue::from(value.as_str())))
                    .collect();
                json!({
                    "name": desc.name,
                    "labels": labels,
                    "value": sample.value,
                })
            })
            .collect();

        json!({
            "stats": self.stats,
            "samples": samples,
        })
    }
}

// ----------------------------------------------------------------------------
// Exporter
// ----------------------------------------------------------------------------

/// Runs one collect cycle per scrape, optionally under a deadline.
#[derive(Debug, Clone)]
pub struct Exporter {
    collector: Arc<QuotaCollector>,
    deadline: Option<Duration>,
}

impl Exporter {
    pub fn new(collector: Arc<QuotaCollector>, deadline: Option<Duration>) -> Self {
        Self { collector, deadline }
    }

    pub fn collector(&self) -> &Arc<QuotaCollector> {
        &self.collector
    }

    /// Collect and gather concurrently.
    ///
    /// When the deadline elapses the collection is dropped, which aborts the
    /// outstanding per-condition tasks; samples already emitted are kept.
    pub async fn scrape(&self) -> Snapshot {
        let start = Instant::now();
        let catalogue = Arc::clone(self.collector.catalogue());
        let (tx, rx) = sink::channel(Arc::clone(&catalogue));

        let collect = async {
            match self.deadline {
                Some(deadline) => {
                    match tokio::time::timeout(deadline, self.collector.collect(tx)).await {
                        Ok(stats) => Some(stats),
                        Err(_) => {
                            warn!(
                                target: "netapp_exporter::exposition",
                                deadline_ms = deadline.as_millis() as u64,
                                "Scrape deadline exceeded, serving partial results"
                            );
                            None
                        }
                    }
                }
                None => Some(self.collector.collect(tx).await),
            }
        };

        let (stats, mut snapshot) = tokio::join!(collect, Snapshot::drain(catalogue, rx));
        snapshot.stats = stats;

        info!(
            target: "netapp_exporter::exposition",
            samples = snapshot.len(),
            complete = snapshot.stats.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Scrape complete"
        );

        snapshot
    }
}
