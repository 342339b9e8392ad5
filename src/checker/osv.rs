use crate::error::LookupError;
use crate::model::{merge_vulns, Dependency, Severity, Vulnerability, VulnsByPackage};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_OSV_API_URL: &str = "https://api.osv.dev/v1";

/// Maximum number of packages to query in a single batch request.
const BATCH_SIZE: usize = 100;

/// Detail lookups allowed in flight at once.
const DETAIL_CONCURRENCY: usize = 6;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote side of the OSV checker.
#[async_trait]
pub trait OsvTransport: Send + Sync {
    async fn query_batch(&self, query: &OsvBatchQuery) -> Result<OsvBatchResponse, LookupError>;
    async fn fetch_vuln(&self, id: &str) -> Result<OsvRecord, LookupError>;
}

/// [`OsvTransport`] over HTTP.
pub struct HttpOsvTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOsvTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("deprisk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, LookupError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(response.url().to_string()));
        }
        if !status.is_success() {
            return Err(LookupError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl OsvTransport for HttpOsvTransport {
    async fn query_batch(&self, query: &OsvBatchQuery) -> Result<OsvBatchResponse, LookupError> {
        let url = format!("{}/querybatch", self.base_url);
        let response = self.client.post(&url).json(query).send().await?;
        Ok(Self::expect_ok(response).await?.json().await?)
    }

    async fn fetch_vuln(&self, id: &str) -> Result<OsvRecord, LookupError> {
        let url = format!("{}/vulns/{}", self.base_url, urlencoding::encode(id));
        let response = self.client.get(&url).send().await?;
        Ok(Self::expect_ok(response).await?.json().await?)
    }
}

/// Online checker backed by an OSV-compatible API.
///
/// A scan runs in two phases. Batch queries go out one after another and
/// return bare vulnerability ids. Once every batch is done, full records for
/// the distinct ids are fetched with bounded concurrency.
pub struct OsvChecker<T = HttpOsvTransport> {
    transport: T,
}

impl OsvChecker<HttpOsvTransport> {
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LookupError> {
        Ok(Self::new(HttpOsvTransport::new(base_url)?))
    }
}

impl<T: OsvTransport> OsvChecker<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Vulnerability ids per dependency index. Failed batches leave their
    /// slots empty.
    async fn collect_ids(&self, deps: &[Dependency]) -> Vec<Vec<String>> {
        let mut ids_by_dep = vec![Vec::new(); deps.len()];

        for (batch_no, chunk) in deps.chunks(BATCH_SIZE).enumerate() {
            let offset = batch_no * BATCH_SIZE;
            let query = OsvBatchQuery {
                queries: chunk.iter().map(OsvQuery::for_dependency).collect(),
            };

            let response = match self.transport.query_batch(&query).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(batch = batch_no, error = %e, "OSV batch query failed, skipping");
                    continue;
                }
            };

            for (idx, result) in response.results.into_iter().enumerate().take(chunk.len()) {
                ids_by_dep[offset + idx].extend(
                    result
                        .vulns
                        .unwrap_or_default()
                        .into_iter()
                        .map(|v| v.id)
                        .filter(|id| !id.is_empty()),
                );
            }
        }

        ids_by_dep
    }

    async fn fetch_details(&self, ids: Vec<String>) -> HashMap<String, OsvRecord> {
        let transport = &self.transport;
        let fetched: Vec<(String, Result<OsvRecord, LookupError>)> = stream::iter(ids)
            .map(|id| async move {
                let record = transport.fetch_vuln(&id).await;
                (id, record)
            })
            .buffer_unordered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        fetched
            .into_iter()
            .filter_map(|(id, record)| match record {
                Ok(record) => Some((id, record)),
                Err(e) => {
                    warn!(id = %id, error = %e, "OSV detail lookup failed, dropping");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl<T: OsvTransport> super::VulnerabilityChecker for OsvChecker<T> {
    fn name(&self) -> &'static str {
        "OSV.dev"
    }

    async fn check(&self, deps: &[Dependency]) -> VulnsByPackage {
        let mut out = VulnsByPackage::new();
        if deps.is_empty() {
            return out;
        }

        let ids_by_dep = self.collect_ids(deps).await;

        let mut seen = HashSet::new();
        let unique_ids: Vec<String> = ids_by_dep
            .iter()
            .flatten()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        debug!(ids = unique_ids.len(), "fetching OSV records");

        let details = self.fetch_details(unique_ids).await;

        for (dep, ids) in deps.iter().zip(&ids_by_dep) {
            let found = ids
                .iter()
                .filter_map(|id| details.get(id))
                .map(|record| record.to_vulnerability(&dep.name))
                .collect();
            merge_vulns(&mut out, &dep.name, found);
        }

        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OsvPackage {
    pub name: String,
    pub ecosystem: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OsvQuery {
    pub package: OsvPackage,
    pub version: String,
}

impl OsvQuery {
    fn for_dependency(dep: &Dependency) -> Self {
        Self {
            package: OsvPackage {
                name: dep.name.clone(),
                ecosystem: dep.ecosystem.as_str().to_string(),
            },
            version: dep.version.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OsvBatchQuery {
    pub queries: Vec<OsvQuery>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsvBatchResponse {
    #[serde(default)]
    pub results: Vec<OsvBatchResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsvBatchResult {
    pub vulns: Option<Vec<OsvVulnId>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsvVulnId {
    pub id: String,
}

/// Full vulnerability record from `GET /vulns/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsvRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub references: Vec<Value>,
    #[serde(default)]
    pub database_specific: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub severity: Vec<OsvSeverity>,
}

/// Some OSV records carry `null` where a list is expected.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsvSeverity {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub score: Option<Value>,
}

impl OsvRecord {
    fn to_vulnerability(&self, package: &str) -> Vulnerability {
        let external_id = self
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.aliases.first().cloned())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        Vulnerability {
            package: package.to_string(),
            version_range: None,
            external_id,
            severity: derive_severity(self),
            summary: self
                .summary
                .clone()
                .or_else(|| self.details.clone())
                .unwrap_or_default(),
            references: self
                .references
                .iter()
                .filter_map(|r| match r {
                    Value::String(url) => Some(url.clone()),
                    other => other.get("url").and_then(Value::as_str).map(str::to_string),
                })
                .collect(),
        }
    }
}

/// Picks a severity for an OSV record.
///
/// The advisory database's own label wins. Otherwise the first usable entry
/// of `severity[]` decides, where CVSS vector strings are skipped and bare
/// numbers are bucketed by [`Severity::from_score`]. Records with nothing
/// usable are rated `LOW`.
pub fn derive_severity(record: &OsvRecord) -> Severity {
    let database_label = record
        .database_specific
        .as_ref()
        .and_then(|d| d.get("severity"))
        .and_then(Value::as_str)
        .and_then(Severity::from_label);
    if let Some(severity) = database_label {
        return severity;
    }

    for entry in &record.severity {
        let score = match &entry.score {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        if score.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("CVSS:")) {
            continue;
        }
        if let Some(value) = leading_float(&score) {
            return Severity::from_score(value);
        }
        if let Some(severity) = Severity::from_label(&score) {
            return severity;
        }
    }

    Severity::Low
}

/// Numeric prefix of a string, `"7.5 (High)"` → `7.5`.
fn leading_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        if frac_end > frac_start || digits > 0 {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    text[..end].parse().ok()
}
