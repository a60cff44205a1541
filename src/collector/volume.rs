//! Volume poller: space usage, use rates and quota status per volume.

use tracing::{debug, warn};

use super::EmitTally;
use crate::api::{QuotaApi, VolumeSpaceInfo};
use crate::catalogue::{MetricId, UsageCategory};
use crate::label_values;
use crate::sink::SampleSender;

/// What the volume step produced.
#[derive(Debug, Default)]
pub(crate) struct VolumeOutcome {
    pub volumes: usize,
    pub list_failed: bool,
    pub status_failures: usize,
    pub tally: EmitTally,
}

/// List every volume once and emit its usage and status samples.
pub(crate) async fn collect_volumes(api: &dyn QuotaApi, sink: &SampleSender) -> VolumeOutcome {
    let mut outcome = VolumeOutcome::default();

    let volumes = match api.list_volume_spaces().await {
        Ok(volumes) => volumes,
        Err(e) => {
            warn!(
                target: "netapp_exporter::collector",
                error = %e,
                category = e.category(),
                "Volume listing failed, skipping volume metrics"
            );
            outcome.list_failed = true;
            return outcome;
        }
    };

    outcome.volumes = volumes.len();
    debug!(target: "netapp_exporter::collector", volumes = volumes.len(), "Listed volumes");

    for info in &volumes {
        emit_space(info, sink, &mut outcome.tally);
        if !emit_status(api, info, sink, &mut outcome.tally).await {
            outcome.status_failures += 1;
        }
    }

    outcome
}

fn emit_space(info: &VolumeSpaceInfo, sink: &SampleSender, tally: &mut EmitTally) {
    for category in UsageCategory::ALL {
        let usage = info.usage(category);
        tally.emit(
            sink,
            MetricId::VolumeUsed(category),
            label_values![info.volume.as_str(), info.vserver.as_str()],
            usage.used.to_f64(),
        );
    }

    for category in UsageCategory::ALL {
        let usage = info.usage(category);
        tally.emit(
            sink,
            MetricId::VolumeUseRate(category),
            label_values![info.volume.as_str(), info.vserver.as_str()],
            usage.percent.to_ratio(),
        );
    }
}

/// Returns false only when the lookup itself failed.
async fn emit_status(
    api: &dyn QuotaApi,
    info: &VolumeSpaceInfo,
    sink: &SampleSender,
    tally: &mut EmitTally,
) -> bool {
    match api.quota_status(&info.vserver, &info.volume).await {
        Ok(status) if status.is_empty() => true,
        Ok(status) => {
            tally.emit(
                sink,
                MetricId::QuotaStatus,
                label_values![info.volume.as_str(), info.vserver.as_str(), status],
                Ok(1.0),
            );
            true
        }
        Err(e) => {
            warn!(
                target: "netapp_exporter::collector",
                volume = %info.volume,
                vserver = %info.vserver,
                error = %e,
                "Quota status lookup failed"
            );
            false
        }
    }
}
