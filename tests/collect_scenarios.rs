//! End-to-end collection scenarios against an in-process fake storage API.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::Barrier;

use netapp_quota_exporter::api::{Page, QuotaReportPage};
use netapp_quota_exporter::error::ApiResult;
use netapp_quota_exporter::{
    ApiError, ApiValue, Exporter, MetricCatalogue, MetricId, PageLimits, QuotaApi, QuotaCollector,
    QuotaEntry, SearchCondition, SizeUnit, SpaceUsage, VolumeSpaceInfo,
};

// ----------------------------------------------------------------------------
// Fake API
// ----------------------------------------------------------------------------

#[derive(Default)]
struct FakeApi {
    volumes: Option<Vec<VolumeSpaceInfo>>,
    statuses: HashMap<String, String>,
    reports: HashMap<SearchCondition, Vec<Vec<QuotaEntry>>>,
    failing: HashSet<SearchCondition>,
    report_calls: Mutex<Vec<(SearchCondition, String)>>,
}

impl FakeApi {
    fn with_volumes(mut self, volumes: Vec<VolumeSpaceInfo>) -> Self {
        self.volumes = Some(volumes);
        self
    }

    fn with_status(mut self, volume: &str, status: &str) -> Self {
        self.statuses.insert(volume.into(), status.into());
        self
    }

    fn with_report(mut self, condition: SearchCondition, pages: Vec<Vec<QuotaEntry>>) -> Self {
        self.reports.insert(condition, pages);
        self
    }

    fn failing(mut self, condition: SearchCondition) -> Self {
        self.failing.insert(condition);
        self
    }

    fn report_calls(&self) -> Vec<(SearchCondition, String)> {
        self.report_calls.lock().clone()
    }
}

#[async_trait]
impl QuotaApi for FakeApi {
    async fn list_volume_spaces(&self) -> ApiResult<Vec<VolumeSpaceInfo>> {
        self.volumes
            .clone()
            .ok_or_else(|| ApiError::transport("volume-space-get-iter", "connection refused"))
    }

    async fn quota_status(&self, _vserver: &str, volume: &str) -> ApiResult<String> {
        Ok(self.statuses.get(volume).cloned().unwrap_or_default())
    }

    async fn report_quotas(
        &self,
        condition: &SearchCondition,
        _max_records: u32,
        tag: &str,
    ) -> ApiResult<QuotaReportPage> {
        self.report_calls.lock().push((condition.clone(), tag.to_string()));

        if self.failing.contains(condition) {
            return Err(ApiError::Status {
                api: "quota-report-iter",
                status: 500,
            });
        }

        let pages = self.reports.get(condition).cloned().unwrap_or_default();
        let index: usize = tag.strip_prefix("page-").and_then(|n| n.parse().ok()).unwrap_or(0);
        let records = pages.get(index).cloned().unwrap_or_default();
        let next_tag = if index + 1 < pages.len() {
            format!("page-{}", index + 1)
        } else {
            String::new()
        };
        Ok(Page::new(records, next_tag))
    }
}

/// Every quota report waits until all conditions have reached the cluster,
/// so the scrape only completes when the reports are in flight together.
struct RendezvousApi {
    barrier: Barrier,
}

#[async_trait]
impl QuotaApi for RendezvousApi {
    async fn list_volume_spaces(&self) -> ApiResult<Vec<VolumeSpaceInfo>> {
        Ok(vec![])
    }

    async fn quota_status(&self, _vserver: &str, _volume: &str) -> ApiResult<String> {
        Ok(String::new())
    }

    async fn report_quotas(
        &self,
        condition: &SearchCondition,
        _max_records: u32,
        _tag: &str,
    ) -> ApiResult<QuotaReportPage> {
        self.barrier.wait().await;
        Ok(Page::new(
            vec![quota("t1", &condition.volume, "vs1", "1")],
            String::new(),
        ))
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn quota(tree: &str, volume: &str, vserver: &str, disk_used: &str) -> QuotaEntry {
    QuotaEntry {
        tree: tree.into(),
        volume: volume.into(),
        vserver: vserver.into(),
        disk_limit: ApiValue::from("1000"),
        disk_used: ApiValue::from(disk_used),
        file_limit: ApiValue::from("50"),
        files_used: ApiValue::from("10"),
    }
}

fn on_volume(volume: &str) -> SearchCondition {
    SearchCondition {
        volume: volume.into(),
        ..Default::default()
    }
}

fn volume_info(volume: &str) -> VolumeSpaceInfo {
    let usage = |used: &str, percent: &str| SpaceUsage {
        used: ApiValue::from(used),
        percent: ApiValue::from(percent),
    };
    VolumeSpaceInfo {
        volume: volume.into(),
        vserver: "vs1".into(),
        total: usage("1000", "50"),
        physical: usage("900", "45"),
        user_data: usage("800", "40"),
        filesystem_metadata: usage("10", "1"),
        performance_metadata: usage("5", "0"),
        snapshot_reserve: usage("100", "5"),
    }
}

fn exporter(api: Arc<dyn QuotaApi>, conditions: Vec<SearchCondition>) -> Exporter {
    let collector = QuotaCollector::new(
        api,
        Arc::new(MetricCatalogue::new(SizeUnit::Kbytes)),
        conditions,
        PageLimits::default(),
    );
    Exporter::new(Arc::new(collector), None)
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_single_entry_end_to_end() {
    let api = Arc::new(
        FakeApi::default()
            .with_volumes(vec![])
            .with_report(SearchCondition::wildcard(), vec![vec![quota("t1", "v1", "vs1", "200")]]),
    );

    let snapshot = exporter(api, vec![]).scrape().await;
    let text = snapshot.encode_text().unwrap();

    let labels = "{qtree=\"t1\",volume=\"v1\",vserver=\"vs1\"}";
    assert!(text.contains(&format!("netapp_quota_disk_limit_kbytes{} 1000\n", labels)));
    assert!(text.contains(&format!("netapp_quota_disk_use_kbytes{} 200\n", labels)));
    assert!(text.contains(&format!("netapp_quota_file_limit{} 50\n", labels)));
    assert!(text.contains(&format!("netapp_quota_file_use{} 10\n", labels)));
    assert_eq!(snapshot.len(), 4);
}

#[tokio::test]
async fn test_failing_condition_is_isolated() {
    let api = Arc::new(
        FakeApi::default()
            .with_volumes(vec![])
            .with_report(on_volume("a"), vec![vec![quota("t1", "a", "vs1", "1")]])
            .failing(on_volume("b"))
            .with_report(on_volume("c"), vec![vec![quota("t1", "c", "vs1", "3")]]),
    );

    let snapshot = exporter(api.clone(), vec![on_volume("a"), on_volume("b"), on_volume("c")])
        .scrape()
        .await;

    let stats = snapshot.stats().unwrap();
    assert_eq!(stats.conditions, 3);
    assert_eq!(stats.conditions_failed, 1);

    let mut volumes: Vec<String> = snapshot
        .samples()
        .iter()
        .map(|s| s.labels[1].to_string())
        .collect();
    volumes.sort();
    volumes.dedup();
    assert_eq!(volumes, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(api.report_calls().len(), 3);
}

#[tokio::test]
async fn test_status_series_only_for_non_empty_status() {
    let api = Arc::new(
        FakeApi::default()
            .with_volumes(vec![volume_info("v1"), volume_info("v2")])
            .with_status("v1", "on")
            .with_status("v2", ""),
    );

    let snapshot = exporter(api, vec![]).scrape().await;
    let statuses: Vec<_> = snapshot
        .samples()
        .iter()
        .filter(|s| s.metric == MetricId::QuotaStatus)
        .collect();

    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].label_strs().as_slice(), &["v1", "vs1", "on"]);
    assert_eq!(statuses[0].value, 1.0);

    // 12 usage samples per volume plus the single status sample
    assert_eq!(snapshot.len(), 2 * 12 + 1);
    let text = snapshot.encode_text().unwrap();
    assert!(text.contains("netapp_volume_total_use_rate{volume=\"v1\",vserver=\"vs1\"} 0.5\n"));
    assert!(text.contains("netapp_volume_snapshot_reserve_used_kbytes{volume=\"v2\",vserver=\"vs1\"} 100\n"));
}

#[tokio::test]
async fn test_volume_listing_failure_keeps_quotas() {
    let api = Arc::new(
        FakeApi::default()
            .with_report(SearchCondition::wildcard(), vec![vec![quota("t1", "v1", "vs1", "5")]]),
    );

    let snapshot = exporter(api, vec![]).scrape().await;

    assert!(snapshot.stats().unwrap().volume_list_failed);
    assert_eq!(snapshot.len(), 4);
    assert!(snapshot
        .samples()
        .iter()
        .all(|s| matches!(s.metric, MetricId::QuotaDiskLimit | MetricId::QuotaDiskUsed | MetricId::QuotaFileLimit | MetricId::QuotaFileUsed)));
}

#[tokio::test]
async fn test_empty_condition_list_queries_once_unfiltered() {
    let api = Arc::new(FakeApi::default().with_volumes(vec![]));

    let snapshot = exporter(api.clone(), vec![]).scrape().await;

    assert!(snapshot.is_empty());
    assert_eq!(
        api.report_calls(),
        vec![(SearchCondition::wildcard(), String::new())]
    );
}

#[tokio::test]
async fn test_paged_report_is_fully_collected() {
    let api = Arc::new(
        FakeApi::default().with_volumes(vec![]).with_report(
            on_volume("v1"),
            vec![
                vec![quota("t1", "v1", "vs1", "1"), quota("t2", "v1", "vs1", "2")],
                vec![quota("t3", "v1", "vs1", "3")],
            ],
        ),
    );

    let snapshot = exporter(api.clone(), vec![on_volume("v1")]).scrape().await;

    assert_eq!(snapshot.stats().unwrap().quota_entries, 3);
    assert_eq!(snapshot.len(), 12);
    let tags: Vec<String> = api.report_calls().into_iter().map(|(_, tag)| tag).collect();
    assert_eq!(tags, vec!["".to_string(), "page-1".to_string()]);
}

#[tokio::test]
async fn test_overlapping_conditions_collapse_to_one_series() {
    let entry = quota("t1", "v1", "vs1", "7");
    let api = Arc::new(
        FakeApi::default()
            .with_volumes(vec![])
            .with_report(on_volume("v1"), vec![vec![entry.clone()]])
            .with_report(SearchCondition::wildcard(), vec![vec![entry]]),
    );

    let snapshot = exporter(api, vec![on_volume("v1"), SearchCondition::wildcard()])
        .scrape()
        .await;
    let text = snapshot.encode_text().unwrap();

    assert_eq!(snapshot.len(), 8);
    let series = text
        .lines()
        .filter(|l| l.starts_with("netapp_quota_disk_use_kbytes{"))
        .count();
    assert_eq!(series, 1);
}

#[tokio::test]
async fn test_conditions_are_queried_concurrently() {
    let conditions = vec![on_volume("a"), on_volume("b"), on_volume("c")];
    let api = Arc::new(RendezvousApi {
        barrier: Barrier::new(conditions.len()),
    });

    let snapshot = tokio::time::timeout(Duration::from_secs(5), exporter(api, conditions).scrape())
        .await
        .expect("quota reports did not run concurrently");

    let stats = snapshot.stats().unwrap();
    assert_eq!(stats.conditions_failed, 0);
    assert_eq!(stats.quota_entries, 3);
    assert_eq!(snapshot.len(), 12);
}
