//! Scrape-time collection: volume poller, per-condition quota pollers and the
//! fan-out that ties them together.
//!
//! # Error handling
//!
//! Nothing in here fails a scrape. A failing volume list drops the volume and
//! status samples, a failing status lookup drops that volume's status sample,
//! a failing quota listing drops that condition's samples, and a value that
//! cannot be normalized drops exactly one sample. Everything else is emitted.

mod quota;
mod volume;

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::api::{QuotaApi, SearchCondition};
use crate::catalogue::{MetricCatalogue, MetricDesc, MetricId};
use crate::error::ValueResult;
use crate::sink::{LabelValues, SampleSender};
use crate::{DEFAULT_MAX_PAGES, DEFAULT_MAX_RECORDS};

pub use quota::fetch_quotas;

// ----------------------------------------------------------------------------
// Paging Limits
// ----------------------------------------------------------------------------

/// Limits applied to every paginated quota listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Records requested per page
    pub max_records: u32,
    /// Pages fetched before the listing is abandoned
    pub max_pages: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

// ----------------------------------------------------------------------------
// Collection Statistics
// ----------------------------------------------------------------------------

/// Summary of one collect cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    /// Volumes returned by the volume listing
    pub volumes: usize,
    /// The volume listing itself failed
    pub volume_list_failed: bool,
    /// Volumes whose quota status could not be fetched
    pub status_failures: usize,
    /// Search conditions processed
    pub conditions: usize,
    /// Search conditions whose quota listing failed
    pub conditions_failed: usize,
    /// Quota entries retrieved across all conditions
    pub quota_entries: usize,
    /// Samples accepted by the sink
    pub samples: usize,
    /// Samples dropped (normalization or sink rejection)
    pub skipped: usize,
}

/// Running count of emitted and skipped samples for one producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EmitTally {
    pub samples: usize,
    pub skipped: usize,
}

impl EmitTally {
    /// Emit a normalized value, or count it as skipped.
    pub(crate) fn emit(
        &mut self,
        sink: &SampleSender,
        metric: MetricId,
        labels: LabelValues,
        value: ValueResult<f64>,
    ) {
        let value = match value {
            Ok(v) => v,
            Err(e) => {
                debug!(
                    target: "netapp_exporter::collector",
                    metric = %sink.catalogue().get(metric).name,
                    labels = ?labels,
                    error = %e,
                    "Skipping sample"
                );
                self.skipped += 1;
                return;
            }
        };

        match sink.emit(metric, labels, value) {
            Ok(()) => self.samples += 1,
            Err(_) => self.skipped += 1,
        }
    }
}

// ----------------------------------------------------------------------------
// Quota Collector
// ----------------------------------------------------------------------------

/// Fan-out collector: volumes first, then one concurrent task per condition.
#[derive(Clone)]
pub struct QuotaCollector {
    api: Arc<dyn QuotaApi>,
    catalogue: Arc<MetricCatalogue>,
    conditions: Arc<[SearchCondition]>,
    limits: PageLimits,
}

impl QuotaCollector {
    /// An empty condition list is replaced by a single wildcard condition.
    pub fn new(
        api: Arc<dyn QuotaApi>,
        catalogue: Arc<MetricCatalogue>,
        conditions: Vec<SearchCondition>,
        limits: PageLimits,
    ) -> Self {
        let conditions = if conditions.is_empty() {
            vec![SearchCondition::wildcard()]
        } else {
            conditions
        };

        Self {
            api,
            catalogue,
            conditions: conditions.into(),
            limits,
        }
    }

    pub fn catalogue(&self) -> &Arc<MetricCatalogue> {
        &self.catalogue
    }

    pub fn conditions(&self) -> &[SearchCondition] {
        &self.conditions
    }

    /// Metric identities this collector may emit. Never performs I/O.
    pub fn describe(&self) -> &[MetricDesc] {
        self.catalogue.describe()
    }

    /// Run one collect cycle, pushing every sample into `sink`.
    ///
    /// Returns only after every per-condition task has finished. Safe to run
    /// concurrently with itself; each call needs its own sink.
    pub async fn collect(&self, sink: SampleSender) -> CollectStats {
        let start = Instant::now();
        let mut stats = CollectStats {
            conditions: self.conditions.len(),
            ..Default::default()
        };

        let volumes = volume::collect_volumes(self.api.as_ref(), &sink).await;
        stats.volumes = volumes.volumes;
        stats.volume_list_failed = volumes.list_failed;
        stats.status_failures = volumes.status_failures;
        stats.samples += volumes.tally.samples;
        stats.skipped += volumes.tally.skipped;

        let mut join_set = JoinSet::new();
        for condition in self.conditions.iter() {
            let api = Arc::clone(&self.api);
            let condition = condition.clone();
            let sink = sink.clone();
            let limits = self.limits;

            join_set.spawn(async move {
                quota::collect_condition(api.as_ref(), &condition, limits, &sink).await
            });
        }
        drop(sink);

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => {
                    stats.quota_entries += outcome.entries;
                    stats.samples += outcome.tally.samples;
                    stats.skipped += outcome.tally.skipped;
                    if outcome.failed {
                        stats.conditions_failed += 1;
                    }
                }
                Err(e) => {
                    error!(target: "netapp_exporter::collector", error = %e, "Quota task aborted");
                    stats.conditions_failed += 1;
                }
            }
        }

        info!(
            target: "netapp_exporter::collector",
            volumes = stats.volumes,
            conditions = stats.conditions,
            conditions_failed = stats.conditions_failed,
            quota_entries = stats.quota_entries,
            samples = stats.samples,
            skipped = stats.skipped,
            duration_ms = start.elapsed().as_millis() as u64,
            "Collect cycle complete"
        );

        stats
    }
}

impl Debug for QuotaCollector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaCollector")
            .field("conditions", &self.conditions)
            .field("limits", &self.limits)
            .field("unit", &self.catalogue.unit())
            .finish()
    }
}
