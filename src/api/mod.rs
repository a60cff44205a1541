//! Remote storage-management API surface.
//!
//! The collector only talks to [`QuotaApi`]; [`zapi::ZapiClient`] is the
//! production implementation over ONTAP's XML API.

pub mod paginate;
pub mod zapi;

use std::fmt::{self, Display, Formatter};

use async_trait::async_trait;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::catalogue::UsageCategory;
use crate::error::ApiResult;
use crate::value::ApiValue;

pub use paginate::{paginate, Page};
pub use zapi::ZapiClient;

// ----------------------------------------------------------------------------
// Search Conditions
// ----------------------------------------------------------------------------

/// Filter applied to a quota report. Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCondition {
    pub qtree: String,
    pub volume: String,
    pub vserver: String,
}

impl SearchCondition {
    pub fn wildcard() -> Self {
        Self::default()
    }

    pub fn is_wildcard(&self) -> bool {
        self.qtree.is_empty() && self.volume.is_empty() && self.vserver.is_empty()
    }
}

impl Display for SearchCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let or_any = |s: &str| if s.is_empty() { "*".to_string() } else { s.to_string() };
        write!(
            f,
            "qtree={} volume={} vserver={}",
            or_any(&self.qtree),
            or_any(&self.volume),
            or_any(&self.vserver)
        )
    }
}

// ----------------------------------------------------------------------------
// Quota Report Entries
// ----------------------------------------------------------------------------

/// One row of a quota report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotaEntry {
    pub tree: CompactString,
    pub volume: CompactString,
    pub vserver: CompactString,
    pub disk_limit: ApiValue,
    pub disk_used: ApiValue,
    pub file_limit: ApiValue,
    pub files_used: ApiValue,
}

/// One page of a quota report.
pub type QuotaReportPage = Page<QuotaEntry>;

// ----------------------------------------------------------------------------
// Volume Space
// ----------------------------------------------------------------------------

/// Absolute usage plus its share of the volume capacity (0-100).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpaceUsage {
    pub used: ApiValue,
    pub percent: ApiValue,
}

/// Space accounting for one volume.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeSpaceInfo {
    pub volume: CompactString,
    pub vserver: CompactString,
    pub total: SpaceUsage,
    pub physical: SpaceUsage,
    pub user_data: SpaceUsage,
    pub filesystem_metadata: SpaceUsage,
    pub performance_metadata: SpaceUsage,
    pub snapshot_reserve: SpaceUsage,
}

impl VolumeSpaceInfo {
    pub fn usage(&self, category: UsageCategory) -> &SpaceUsage {
        match category {
            UsageCategory::Total => &self.total,
            UsageCategory::Physical => &self.physical,
            UsageCategory::User => &self.user_data,
            UsageCategory::FilesystemMetadata => &self.filesystem_metadata,
            UsageCategory::PerformanceMetadata => &self.performance_metadata,
            UsageCategory::SnapshotReserve => &self.snapshot_reserve,
        }
    }
}

// ----------------------------------------------------------------------------
// API Trait
// ----------------------------------------------------------------------------

/// Capabilities the collector needs from the storage system.
///
/// Implementations must be safe to call from many tasks at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaApi: Send + Sync {
    /// Space accounting for every volume visible to the credentials.
    async fn list_volume_spaces(&self) -> ApiResult<Vec<VolumeSpaceInfo>>;

    /// Quota enforcement state of one volume; empty when there is nothing to report.
    async fn quota_status(&self, vserver: &str, volume: &str) -> ApiResult<String>;

    /// One page of the quota report matching `condition`, resuming at `tag`.
    async fn report_quotas(
        &self,
        condition: &SearchCondition,
        max_records: u32,
        tag: &str,
    ) -> ApiResult<QuotaReportPage>;
}
