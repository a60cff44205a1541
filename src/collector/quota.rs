//! Quota poller: one paginated quota report per search condition.

use tracing::{debug, warn};

use super::{EmitTally, PageLimits};
use crate::api::{paginate, QuotaApi, QuotaEntry, SearchCondition};
use crate::catalogue::MetricId;
use crate::error::ApiResult;
use crate::label_values;
use crate::sink::SampleSender;

/// What one condition's task produced.
#[derive(Debug, Default)]
pub(crate) struct ConditionOutcome {
    pub entries: usize,
    pub failed: bool,
    pub tally: EmitTally,
}

/// Every quota entry matching `condition`, across all pages.
pub async fn fetch_quotas(
    api: &dyn QuotaApi,
    condition: &SearchCondition,
    limits: PageLimits,
) -> ApiResult<Vec<QuotaEntry>> {
    paginate(
        move |tag| async move { api.report_quotas(condition, limits.max_records, &tag).await },
        limits.max_pages,
    )
    .await
}

pub(crate) async fn collect_condition(
    api: &dyn QuotaApi,
    condition: &SearchCondition,
    limits: PageLimits,
    sink: &SampleSender,
) -> ConditionOutcome {
    let mut outcome = ConditionOutcome::default();

    let entries = match fetch_quotas(api, condition, limits).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                target: "netapp_exporter::collector",
                condition = %condition,
                error = %e,
                category = e.category(),
                "Quota report failed, skipping condition"
            );
            outcome.failed = true;
            return outcome;
        }
    };

    debug!(
        target: "netapp_exporter::collector",
        condition = %condition,
        entries = entries.len(),
        "Fetched quota report"
    );

    outcome.entries = entries.len();
    for entry in &entries {
        emit_entry(entry, sink, &mut outcome.tally);
    }

    outcome
}

fn emit_entry(entry: &QuotaEntry, sink: &SampleSender, tally: &mut EmitTally) {
    let fields = [
        (MetricId::QuotaDiskLimit, &entry.disk_limit),
        (MetricId::QuotaDiskUsed, &entry.disk_used),
        (MetricId::QuotaFileLimit, &entry.file_limit),
        (MetricId::QuotaFileUsed, &entry.files_used),
    ];

    for (metric, raw) in fields {
        tally.emit(
            sink,
            metric,
            label_values![entry.tree.as_str(), entry.volume.as_str(), entry.vserver.as_str()],
            raw.to_f64(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockQuotaApi, Page};
    use crate::catalogue::MetricCatalogue;
    use crate::error::ApiError;
    use crate::sink;
    use crate::value::ApiValue;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn entry(tree: &str, disk_used: &str) -> QuotaEntry {
        QuotaEntry {
            tree: tree.into(),
            volume: "v1".into(),
            vserver: "vs1".into(),
            disk_limit: ApiValue::from("1000"),
            disk_used: ApiValue::from(disk_used),
            file_limit: ApiValue::from("50"),
            files_used: ApiValue::from("10"),
        }
    }

    fn condition() -> SearchCondition {
        SearchCondition {
            volume: "v1".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_follows_next_tag() {
        let mut api = MockQuotaApi::new();
        let mut seq = Sequence::new();
        api.expect_report_quotas()
            .withf(|c, max, tag| c.volume == "v1" && *max == 2 && tag.is_empty())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Page::new(vec![entry("t1", "1"), entry("t2", "2")], "next")));
        api.expect_report_quotas()
            .withf(|_, _, tag| tag == "next")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Page::last(vec![entry("t3", "3")])));

        let limits = PageLimits { max_records: 2, max_pages: 10 };
        let entries = fetch_quotas(&api, &condition(), limits).await.unwrap();

        let trees: Vec<&str> = entries.iter().map(|e| e.tree.as_str()).collect();
        assert_eq!(trees, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn test_entry_emits_four_samples_in_order() {
        let mut api = MockQuotaApi::new();
        api.expect_report_quotas()
            .returning(|_, _, _| Ok(Page::last(vec![entry("t1", "200")])));

        let (tx, rx) = sink::channel(Arc::new(MetricCatalogue::default()));
        let outcome = collect_condition(&api, &condition(), PageLimits::default(), &tx).await;

        let metrics: Vec<(MetricId, f64)> = rx.drain().into_iter().map(|s| (s.metric, s.value)).collect();
        assert_eq!(
            metrics,
            vec![
                (MetricId::QuotaDiskLimit, 1000.0),
                (MetricId::QuotaDiskUsed, 200.0),
                (MetricId::QuotaFileLimit, 50.0),
                (MetricId::QuotaFileUsed, 10.0),
            ]
        );
        assert_eq!(outcome.entries, 1);
        assert!(!outcome.failed);
    }

    #[tokio::test]
    async fn test_failed_page_drops_whole_condition() {
        let mut api = MockQuotaApi::new();
        let mut seq = Sequence::new();
        api.expect_report_quotas()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Page::new(vec![entry("t1", "1")], "next")));
        api.expect_report_quotas()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(ApiError::Timeout { api: "quota-report-iter", timeout_ms: 10_000 }));

        let (tx, rx) = sink::channel(Arc::new(MetricCatalogue::default()));
        let outcome = collect_condition(&api, &condition(), PageLimits::default(), &tx).await;

        assert!(outcome.failed);
        assert_eq!(outcome.entries, 0);
        assert!(rx.is_empty());
    }
}
