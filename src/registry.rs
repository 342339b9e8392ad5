//! npm registry signals for the staleness and age factors.
//!
//! For every distinct package name the registry packument is fetched once and
//! reduced to a [`PackageMeta`]: the `latest` dist-tag plus publish times per
//! version. Summaries are cached on disk, so repeated scans hit the network
//! only after the cache TTL runs out.

use crate::cache::Cache;
use crate::error::LookupError;
use crate::model::Dependency;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Packument lookups allowed in flight at once.
const LOOKUP_CONCURRENCY: usize = 6;

/// Average month length used for release ages.
const DAYS_PER_MONTH: f64 = 30.44;

/// Inputs for the optional score factors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySignals {
    /// package name → latest published version
    pub latest: HashMap<String, String>,
    /// package name → months since the installed version was published
    pub age_months: HashMap<String, f64>,
}

#[async_trait]
pub trait RegistryLookup: Send + Sync {
    async fn signals(&self, deps: &[Dependency]) -> RegistrySignals;
}

/// What we keep from a packument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMeta {
    pub latest: Option<String>,
    /// version → ISO-8601 publish time
    #[serde(default)]
    pub published: HashMap<String, String>,
}

impl PackageMeta {
    /// Reduces a raw packument. The `created` and `modified` entries of `time`
    /// are not versions and are dropped.
    pub fn from_packument(doc: &serde_json::Value) -> Self {
        let latest = doc
            .get("dist-tags")
            .and_then(|tags| tags.get("latest"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        let published = doc
            .get("time")
            .and_then(serde_json::Value::as_object)
            .map(|times| {
                times
                    .iter()
                    .filter(|(version, _)| !matches!(version.as_str(), "created" | "modified"))
                    .filter_map(|(version, t)| Some((version.clone(), t.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Self { latest, published }
    }

    /// Months between publishing `version` and `now`. `None` when the
    /// registry has no usable timestamp.
    pub fn age_months(&self, version: &str, now: DateTime<Utc>) -> Option<f64> {
        let published = self.published.get(version)?;
        let published = DateTime::parse_from_rfc3339(published).ok()?;
        let elapsed = now.signed_duration_since(published.with_timezone(&Utc));
        Some(elapsed.num_seconds().max(0) as f64 / (86_400.0 * DAYS_PER_MONTH))
    }
}

pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
    cache: Option<Cache>,
}

impl NpmRegistry {
    pub fn new(base_url: impl Into<String>, cache: Option<Cache>) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("deprisk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache,
        })
    }

    fn packument_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(name))
    }

    pub async fn package_meta(&self, name: &str) -> Result<PackageMeta, LookupError> {
        let cache_key = format!("npm_meta_{}", name);
        if let Some(meta) = self.cache.as_ref().and_then(|c| c.get::<PackageMeta>(&cache_key)) {
            return Ok(meta);
        }

        let url = self.packument_url(name);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(LookupError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let doc: serde_json::Value = response.json().await?;
        let meta = PackageMeta::from_packument(&doc);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&cache_key, &meta) {
                debug!(package = name, error = %e, "could not cache registry metadata");
            }
        }
        Ok(meta)
    }
}

#[async_trait]
impl RegistryLookup for NpmRegistry {
    async fn signals(&self, deps: &[Dependency]) -> RegistrySignals {
        let mut seen = HashSet::new();
        let names: Vec<String> = deps
            .iter()
            .filter(|d| seen.insert(d.name.as_str()))
            .map(|d| d.name.clone())
            .collect();

        let results: Vec<(String, Result<PackageMeta, LookupError>)> = stream::iter(names)
            .map(|name| async move {
                let result = self.package_meta(&name).await;
                (name, result)
            })
            .buffer_unordered(LOOKUP_CONCURRENCY)
            .collect()
            .await;

        let mut metas = HashMap::new();
        for (name, result) in results {
            match result {
                Ok(meta) => {
                    metas.insert(name, meta);
                }
                Err(e) => warn!(package = %name, error = %e, "registry lookup failed"),
            }
        }

        debug!(resolved = metas.len(), "registry lookups complete");
        signals_from_meta(deps, &metas, Utc::now())
    }
}

/// Builds score inputs from fetched metadata. When a name is installed at
/// several versions, the first listed dependency decides its age.
pub fn signals_from_meta(
    deps: &[Dependency],
    metas: &HashMap<String, PackageMeta>,
    now: DateTime<Utc>,
) -> RegistrySignals {
    let mut signals = RegistrySignals::default();
    for dep in deps {
        let Some(meta) = metas.get(dep.name.as_str()) else {
            continue;
        };
        if let Some(latest) = &meta.latest {
            signals
                .latest
                .entry(dep.name.clone())
                .or_insert_with(|| latest.clone());
        }
        if let Some(months) = meta.age_months(&dep.version, now) {
            signals.age_months.entry(dep.name.clone()).or_insert(months);
        }
    }
    signals
}
