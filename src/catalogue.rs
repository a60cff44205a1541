//! Fixed catalogue of exported metric identities.
//!
//! The catalogue is built once at startup and shared with the collector and
//! the exposition layer. Names depend on the configured [`SizeUnit`] only.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::METRIC_NAMESPACE;

// ----------------------------------------------------------------------------
// Label Schemas
// ----------------------------------------------------------------------------

/// Ordered label names attached to a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelSchema {
    /// qtree, volume, vserver
    Quota,
    /// volume, vserver
    Volume,
    /// volume, vserver, status
    Status,
}

impl LabelSchema {
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            LabelSchema::Quota => &["qtree", "volume", "vserver"],
            LabelSchema::Volume => &["volume", "vserver"],
            LabelSchema::Status => &["volume", "vserver", "status"],
        }
    }

    pub fn arity(&self) -> usize {
        self.names().len()
    }
}

// ----------------------------------------------------------------------------
// Units & Usage Categories
// ----------------------------------------------------------------------------

/// Unit of the absolute sizes the remote API reports.
///
/// This cannot be discovered from the responses, so it is fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    Bytes,
    #[default]
    Kbytes,
}

impl Display for SizeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SizeUnit::Bytes => write!(f, "bytes"),
            SizeUnit::Kbytes => write!(f, "kbytes"),
        }
    }
}

/// Space usage categories reported per volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageCategory {
    Total,
    Physical,
    User,
    FilesystemMetadata,
    PerformanceMetadata,
    SnapshotReserve,
}

impl UsageCategory {
    pub const ALL: [UsageCategory; 6] = [
        UsageCategory::Total,
        UsageCategory::Physical,
        UsageCategory::User,
        UsageCategory::FilesystemMetadata,
        UsageCategory::PerformanceMetadata,
        UsageCategory::SnapshotReserve,
    ];

    fn index(&self) -> usize {
        match self {
            UsageCategory::Total => 0,
            UsageCategory::Physical => 1,
            UsageCategory::User => 2,
            UsageCategory::FilesystemMetadata => 3,
            UsageCategory::PerformanceMetadata => 4,
            UsageCategory::SnapshotReserve => 5,
        }
    }

    /// Metric name fragment
    pub fn slug(&self) -> &'static str {
        match self {
            UsageCategory::Total => "total",
            UsageCategory::Physical => "physical",
            UsageCategory::User => "user",
            UsageCategory::FilesystemMetadata => "filesystem_metadata",
            UsageCategory::PerformanceMetadata => "performance_metadata",
            UsageCategory::SnapshotReserve => "snapshot_reserve",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            UsageCategory::Total => "Total",
            UsageCategory::Physical => "Physical",
            UsageCategory::User => "User",
            UsageCategory::FilesystemMetadata => "Filesystem metadata",
            UsageCategory::PerformanceMetadata => "Performance metadata",
            UsageCategory::SnapshotReserve => "Snapshot reserve",
        }
    }
}

// ----------------------------------------------------------------------------
// Metric Identities
// ----------------------------------------------------------------------------

/// Identity of an exported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricId {
    QuotaDiskLimit,
    QuotaDiskUsed,
    QuotaFileLimit,
    QuotaFileUsed,
    QuotaStatus,
    VolumeUsed(UsageCategory),
    VolumeUseRate(UsageCategory),
}

impl MetricId {
    /// Number of identities in the catalogue
    pub const COUNT: usize = 5 + 2 * UsageCategory::ALL.len();

    /// Every identity, in catalogue order.
    pub fn all() -> impl Iterator<Item = MetricId> {
        [
            MetricId::QuotaDiskLimit,
            MetricId::QuotaDiskUsed,
            MetricId::QuotaFileLimit,
            MetricId::QuotaFileUsed,
            MetricId::QuotaStatus,
        ]
        .into_iter()
        .chain(UsageCategory::ALL.into_iter().map(MetricId::VolumeUsed))
        .chain(UsageCategory::ALL.into_iter().map(MetricId::VolumeUseRate))
    }

    fn index(&self) -> usize {
        match self {
            MetricId::QuotaDiskLimit => 0,
            MetricId::QuotaDiskUsed => 1,
            MetricId::QuotaFileLimit => 2,
            MetricId::QuotaFileUsed => 3,
            MetricId::QuotaStatus => 4,
            MetricId::VolumeUsed(c) => 5 + c.index(),
            MetricId::VolumeUseRate(c) => 5 + UsageCategory::ALL.len() + c.index(),
        }
    }

    pub fn schema(&self) -> LabelSchema {
        match self {
            MetricId::QuotaDiskLimit
            | MetricId::QuotaDiskUsed
            | MetricId::QuotaFileLimit
            | MetricId::QuotaFileUsed => LabelSchema::Quota,
            MetricId::QuotaStatus => LabelSchema::Status,
            MetricId::VolumeUsed(_) | MetricId::VolumeUseRate(_) => LabelSchema::Volume,
        }
    }

    fn name_stem(&self, unit: SizeUnit) -> String {
        match (self, unit) {
            (MetricId::QuotaDiskLimit, SizeUnit::Kbytes) => "quota_disk_limit_kbytes".into(),
            (MetricId::QuotaDiskLimit, SizeUnit::Bytes) => "quota_disk_limit".into(),
            (MetricId::QuotaDiskUsed, SizeUnit::Kbytes) => "quota_disk_use_kbytes".into(),
            (MetricId::QuotaDiskUsed, SizeUnit::Bytes) => "quota_disk_use".into(),
            (MetricId::QuotaFileLimit, _) => "quota_file_limit".into(),
            (MetricId::QuotaFileUsed, _) => "quota_file_use".into(),
            (MetricId::QuotaStatus, _) => "quota_status".into(),
            (MetricId::VolumeUsed(c), unit) => format!("volume_{}_used_{}", c.slug(), unit),
            (MetricId::VolumeUseRate(c), _) => format!("volume_{}_use_rate", c.slug()),
        }
    }

    fn help(&self, unit: SizeUnit) -> String {
        match self {
            MetricId::QuotaDiskLimit => format!("Qtree disk soft limit in {}", unit),
            MetricId::QuotaDiskUsed => format!("Qtree disk current use in {}", unit),
            MetricId::QuotaFileLimit => "Qtree number of file soft limit".into(),
            MetricId::QuotaFileUsed => "Qtree number of files currently used".into(),
            MetricId::QuotaStatus => "Quota status of volume".into(),
            MetricId::VolumeUsed(c) => format!("{} usage of volume ({})", c.title(), unit),
            MetricId::VolumeUseRate(c) => format!("{} use rate of volume (0-1)", c.title()),
        }
    }
}

// ----------------------------------------------------------------------------
// Catalogue
// ----------------------------------------------------------------------------

/// Descriptor of one exported metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    pub id: MetricId,
    /// Fully qualified name, namespace included
    pub name: String,
    pub help: String,
    pub schema: LabelSchema,
}

/// Every metric the exporter can emit, constructed once per process.
#[derive(Debug, Clone)]
pub struct MetricCatalogue {
    unit: SizeUnit,
    descs: Vec<MetricDesc>,
}

impl MetricCatalogue {
    pub fn new(unit: SizeUnit) -> Self {
        let descs = MetricId::all()
            .map(|id| MetricDesc {
                id,
                name: format!("{}_{}", METRIC_NAMESPACE, id.name_stem(unit)),
                help: id.help(unit),
                schema: id.schema(),
            })
            .collect();
        Self { unit, descs }
    }

    pub fn unit(&self) -> SizeUnit {
        self.unit
    }

    /// Descriptor for an identity.
    pub fn get(&self, id: MetricId) -> &MetricDesc {
        &self.descs[id.index()]
    }

    /// All descriptors, in catalogue order. Pure, never performs I/O.
    pub fn describe(&self) -> &[MetricDesc] {
        &self.descs
    }
}

impl Default for MetricCatalogue {
    fn default() -> Self {
        Self::new(SizeUnit::default())
    }
}
