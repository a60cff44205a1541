//! Sample channel between collection tasks and the exposition consumer.
//!
//! Many producers (the volume step plus one task per search condition) write
//! into a single unbounded `flume` channel. Each send is atomic and keeps the
//! producer's own order; nothing is promised across producers.

use std::sync::Arc;

use compact_str::CompactString;
use flume::{Receiver as FlumeReceiver, Sender as FlumeSender};
use smallvec::SmallVec;
use tracing::warn;

use crate::catalogue::{MetricCatalogue, MetricId};
use crate::error::SinkError;

/// Label values in schema order. No schema has more than three labels.
pub type LabelValues = SmallVec<[CompactString; 3]>;

/// Build [`LabelValues`] from anything string-like.
#[macro_export]
macro_rules! label_values {
    ($($value:expr),* $(,)?) => {
        smallvec::smallvec![$(compact_str::CompactString::from($value)),*]
    };
}

// ----------------------------------------------------------------------------
// Metric Sample
// ----------------------------------------------------------------------------

/// A typed, labeled gauge value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub metric: MetricId,
    pub labels: LabelValues,
    pub value: f64,
}

impl MetricSample {
    pub fn label_strs(&self) -> SmallVec<[&str; 3]> {
        self.labels.iter().map(|l| l.as_str()).collect()
    }
}

/// Create a connected sender/receiver pair bound to `catalogue`.
pub fn channel(catalogue: Arc<MetricCatalogue>) -> (SampleSender, SampleReceiver) {
    let (sender, receiver) = flume::unbounded();
    (
        SampleSender { sender, catalogue },
        SampleReceiver { receiver },
    )
}

// ----------------------------------------------------------------------------
// Sender
// ----------------------------------------------------------------------------

/// Producer half; cheap to clone into every collection task.
#[derive(Debug, Clone)]
pub struct SampleSender {
    sender: FlumeSender<MetricSample>,
    catalogue: Arc<MetricCatalogue>,
}

impl SampleSender {
    /// Push one sample. Label values must follow the metric's schema exactly.
    pub fn emit(&self, metric: MetricId, labels: LabelValues, value: f64) -> Result<(), SinkError> {
        let desc = self.catalogue.get(metric);
        if labels.len() != desc.schema.arity() {
            let err = SinkError::LabelArity {
                metric: desc.name.clone(),
                expected: desc.schema.arity(),
                found: labels.len(),
            };
            warn!(target: "netapp_exporter::sink", error = %err, "Rejected sample");
            return Err(err);
        }

        self.sender
            .send(MetricSample { metric, labels, value })
            .map_err(|_| SinkError::Closed)
    }

    pub fn catalogue(&self) -> &Arc<MetricCatalogue> {
        &self.catalogue
    }
}

// ----------------------------------------------------------------------------
// Receiver
// ----------------------------------------------------------------------------

/// Consumer half.
#[derive(Debug)]
pub struct SampleReceiver {
    receiver: FlumeReceiver<MetricSample>,
}

impl SampleReceiver {
    /// Next sample, or `None` once every sender has been dropped and the
    /// channel is empty.
    pub async fn recv(&self) -> Option<MetricSample> {
        self.receiver.recv_async().await.ok()
    }

    /// Everything currently buffered, without waiting.
    pub fn drain(&self) -> Vec<MetricSample> {
        self.receiver.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
