//! ONTAP ZAPI client.
//!
//! Every call is a `POST` of an XML envelope to the admin servlet. Responses
//! carry a `<results status="passed|failed">` element; failed results are
//! surfaced as [`ApiError::Rejected`] before the typed payload is decoded.

use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use compact_str::CompactString;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{paginate, Page, QuotaApi, QuotaEntry, QuotaReportPage, SearchCondition, SpaceUsage, VolumeSpaceInfo};
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult, ConfigError};
use crate::value::ApiValue;
use crate::{EXPORTER_NAME, EXPORTER_VERSION, ZAPI_PATH, ZAPI_XMLNS};

const QUOTA_REPORT_ITER: &str = "quota-report-iter";
const VOLUME_SPACE_GET_ITER: &str = "volume-space-get-iter";
const QUOTA_STATUS: &str = "quota-status";

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

/// [`QuotaApi`] over ZAPI. Cheap to share; the inner HTTP client pools connections.
#[derive(Clone)]
pub struct ZapiClient {
    http: reqwest::Client,
    url: String,
    user: String,
    password: String,
    api_version: String,
    timeout: Duration,
    max_records: u32,
    max_pages: usize,
}

impl ZapiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(format!("{}/{}", EXPORTER_NAME, EXPORTER_VERSION))
            .build()
            .map_err(|e| ConfigError::ClientBuild {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            url: format!("{}{}", config.endpoint.trim_end_matches('/'), ZAPI_PATH),
            user: config.user.clone(),
            password: config.password.clone(),
            api_version: config.api_version.clone(),
            timeout,
            max_records: config.max_records,
            max_pages: config.max_pages,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wrap `request` in the `<netapp>` envelope, tunnelled to `vfiler` when set.
    fn envelope(&self, vfiler: Option<&str>, request: Request<'_>) -> ApiResult<String> {
        let api = request.api();
        let envelope = RequestEnvelope {
            version: &self.api_version,
            xmlns: ZAPI_XMLNS,
            vfiler: vfiler.filter(|v| !v.is_empty()),
            request,
        };

        let mut buffer = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        quick_xml::se::to_writer(&mut buffer, &envelope)
            .map_err(|e| ApiError::Encode {
                api,
                message: e.to_string(),
            })?;
        Ok(buffer)
    }

    /// Send one request and decode its `<results>` payload.
    async fn invoke<R: DeserializeOwned>(
        &self,
        vfiler: Option<&str>,
        request: Request<'_>,
    ) -> ApiResult<R> {
        let api = request.api();
        let body = self.envelope(vfiler, request)?;
        let request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body);
        let request = if self.user.is_empty() {
            request
        } else {
            request.basic_auth(&self.user, Some(&self.password))
        };

        trace!(target: "netapp_exporter::api", api, vfiler, "Sending request");

        let response = request.send().await.map_err(|e| self.map_reqwest(api, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                api,
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| self.map_reqwest(api, e))?;
        decode_results(api, &text)
    }

    fn map_reqwest(&self, api: &'static str, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout {
                api,
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ApiError::transport(api, err.to_string())
        }
    }

    async fn volume_space_page(&self, tag: &str) -> ApiResult<Page<VolumeSpaceInfo>> {
        let results: VolumeSpaceResults = self
            .invoke(None, volume_space_request(self.max_records, tag))
            .await?;

        let records = results
            .attributes_list
            .map(|list| list.space_info.into_iter().map(VolumeSpaceInfo::from).collect())
            .unwrap_or_default();
        Ok(Page::new(records, results.next_tag.unwrap_or_default()))
    }
}

#[async_trait]
impl QuotaApi for ZapiClient {
    async fn list_volume_spaces(&self) -> ApiResult<Vec<VolumeSpaceInfo>> {
        let volumes = paginate(
            move |tag| async move { self.volume_space_page(&tag).await },
            self.max_pages,
        )
        .await?;

        debug!(target: "netapp_exporter::api", volumes = volumes.len(), "Listed volume space");
        Ok(volumes)
    }

    async fn quota_status(&self, vserver: &str, volume: &str) -> ApiResult<String> {
        let results: QuotaStatusResults = self
            .invoke(Some(vserver), quota_status_request(volume))
            .await?;
        Ok(results.status.trim().to_string())
    }

    async fn report_quotas(
        &self,
        condition: &SearchCondition,
        max_records: u32,
        tag: &str,
    ) -> ApiResult<QuotaReportPage> {
        let results: QuotaReportResults = self
            .invoke(None, quota_report_request(condition, max_records, tag))
            .await?;

        let records = results
            .attributes_list
            .map(|list| list.quota.into_iter().map(QuotaEntry::from).collect())
            .unwrap_or_default();
        Ok(Page::new(records, results.next_tag.unwrap_or_default()))
    }
}

impl Debug for ZapiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZapiClient")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("max_records", &self.max_records)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Request Builders
// ----------------------------------------------------------------------------

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

#[derive(Debug, Serialize)]
#[serde(rename = "netapp")]
struct RequestEnvelope<'a> {
    #[serde(rename = "@version")]
    version: &'a str,
    #[serde(rename = "@xmlns")]
    xmlns: &'a str,
    #[serde(rename = "@vfiler", skip_serializing_if = "Option::is_none")]
    vfiler: Option<&'a str>,
    #[serde(rename = "$value")]
    request: Request<'a>,
}

/// One ZAPI call; the variant name is the request element.
#[derive(Debug, PartialEq, Serialize)]
enum Request<'a> {
    #[serde(rename = "quota-report-iter")]
    QuotaReport(IterRequest<'a, QuotaQuery<'a>>),
    #[serde(rename = "volume-space-get-iter")]
    VolumeSpace(IterRequest<'a, ()>),
    #[serde(rename = "quota-status")]
    QuotaStatus(QuotaStatusRequest<'a>),
}

impl Request<'_> {
    fn api(&self) -> &'static str {
        match self {
            Request::QuotaReport(_) => QUOTA_REPORT_ITER,
            Request::VolumeSpace(_) => VOLUME_SPACE_GET_ITER,
            Request::QuotaStatus(_) => QUOTA_STATUS,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
struct IterRequest<'a, Q> {
    max_records: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<Q>,
}

#[derive(Debug, PartialEq, Serialize)]
struct QuotaQuery<'a> {
    quota: QuotaFilter<'a>,
}

#[derive(Debug, PartialEq, Serialize)]
struct QuotaFilter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vserver: Option<&'a str>,
}

#[derive(Debug, PartialEq, Serialize)]
struct QuotaStatusRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<&'a str>,
}

fn quota_report_request<'a>(condition: &'a SearchCondition, max_records: u32, tag: &'a str) -> Request<'a> {
    let query = (!condition.is_wildcard()).then(|| QuotaQuery {
        quota: QuotaFilter {
            volume: non_empty(&condition.volume),
            tree: non_empty(&condition.qtree),
            vserver: non_empty(&condition.vserver),
        },
    });

    Request::QuotaReport(IterRequest {
        max_records,
        tag: non_empty(tag),
        query,
    })
}

fn volume_space_request(max_records: u32, tag: &str) -> Request<'_> {
    Request::VolumeSpace(IterRequest {
        max_records,
        tag: non_empty(tag),
        query: None,
    })
}

fn quota_status_request(volume: &str) -> Request<'_> {
    Request::QuotaStatus(QuotaStatusRequest {
        volume: non_empty(volume),
    })
}

// ----------------------------------------------------------------------------
// Response Decoding
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<R> {
    results: R,
}

#[derive(Debug, Deserialize)]
struct ResultsStatus {
    #[serde(rename = "@status")]
    status: String,
    #[serde(rename = "@reason", default)]
    reason: Option<String>,
    #[serde(rename = "@errno", default)]
    errno: Option<String>,
}

/// Check the result status, then decode the typed payload.
fn decode_results<R: DeserializeOwned>(api: &'static str, body: &str) -> ApiResult<R> {
    let head: Envelope<ResultsStatus> =
        quick_xml::de::from_str(body).map_err(|e| ApiError::decode(api, e.to_string()))?;

    if !head.results.status.eq_ignore_ascii_case("passed") {
        return Err(ApiError::Rejected {
            api,
            errno: head.results.errno.unwrap_or_default(),
            reason: head.results.reason.unwrap_or_else(|| head.results.status.clone()),
        });
    }

    let typed: Envelope<R> =
        quick_xml::de::from_str(body).map_err(|e| ApiError::decode(api, e.to_string()))?;
    Ok(typed.results)
}

#[derive(Debug, Default, Deserialize)]
struct QuotaReportResults {
    #[serde(rename = "attributes-list", default)]
    attributes_list: Option<QuotaList>,
    #[serde(rename = "next-tag", default)]
    next_tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotaList {
    #[serde(default)]
    quota: Vec<QuotaXml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct QuotaXml {
    #[serde(default)]
    tree: String,
    #[serde(default)]
    volume: String,
    #[serde(default)]
    vserver: String,
    #[serde(default)]
    disk_limit: Option<String>,
    #[serde(default)]
    disk_used: Option<String>,
    #[serde(default)]
    file_limit: Option<String>,
    #[serde(default)]
    files_used: Option<String>,
}

impl From<QuotaXml> for QuotaEntry {
    fn from(xml: QuotaXml) -> Self {
        QuotaEntry {
            tree: CompactString::from(xml.tree),
            volume: CompactString::from(xml.volume),
            vserver: CompactString::from(xml.vserver),
            disk_limit: ApiValue::from(xml.disk_limit),
            disk_used: ApiValue::from(xml.disk_used),
            file_limit: ApiValue::from(xml.file_limit),
            files_used: ApiValue::from(xml.files_used),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct VolumeSpaceResults {
    #[serde(rename = "attributes-list", default)]
    attributes_list: Option<SpaceInfoList>,
    #[serde(rename = "next-tag", default)]
    next_tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SpaceInfoList {
    #[serde(rename = "space-info", default)]
    space_info: Vec<SpaceInfoXml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SpaceInfoXml {
    #[serde(default)]
    volume: String,
    #[serde(default)]
    vserver: String,
    #[serde(default)]
    total_used: Option<String>,
    #[serde(default)]
    total_used_percent: Option<String>,
    #[serde(default)]
    physical_used: Option<String>,
    #[serde(default)]
    physical_used_percent: Option<String>,
    #[serde(default)]
    user_data: Option<String>,
    #[serde(default)]
    user_data_percent: Option<String>,
    #[serde(default)]
    filesystem_metadata: Option<String>,
    #[serde(default)]
    filesystem_metadata_percent: Option<String>,
    #[serde(default)]
    performance_metadata: Option<String>,
    #[serde(default)]
    performance_metadata_percent: Option<String>,
    #[serde(default)]
    snapshot_reserve: Option<String>,
    #[serde(default)]
    snapshot_reserve_percent: Option<String>,
}

fn space_usage(used: Option<String>, percent: Option<String>) -> SpaceUsage {
    SpaceUsage {
        used: ApiValue::from(used),
        percent: ApiValue::from(percent),
    }
}

impl From<SpaceInfoXml> for VolumeSpaceInfo {
    fn from(xml: SpaceInfoXml) -> Self {
        VolumeSpaceInfo {
            volume: CompactString::from(xml.volume),
            vserver: CompactString::from(xml.vserver),
            total: space_usage(xml.total_used, xml.total_used_percent),
            physical: space_usage(xml.physical_used, xml.physical_used_percent),
            user_data: space_usage(xml.user_data, xml.user_data_percent),
            filesystem_metadata: space_usage(xml.filesystem_metadata, xml.filesystem_metadata_percent),
            performance_metadata: space_usage(xml.performance_metadata, xml.performance_metadata_percent),
            snapshot_reserve: space_usage(xml.snapshot_reserve, xml.snapshot_reserve_percent),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct QuotaStatusResults {
    #[serde(default)]
    status: String,
}
