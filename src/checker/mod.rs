//! Vulnerability matching.
//!
//! Two interchangeable strategies produce the same [`VulnsByPackage`] map:
//!
//! - [`SeedChecker`] matches against a local `vulnerabilities.json` seed
//! - [`OsvChecker`] queries an OSV-compatible batch API
//!
//! Matching never fails as a whole. Lookups that go wrong are logged and
//! skipped, and the result covers whatever could be resolved.

mod osv;
mod seed;

pub use osv::{derive_severity, HttpOsvTransport, OsvChecker, OsvTransport, DEFAULT_OSV_API_URL};
pub use osv::{
    OsvBatchQuery, OsvBatchResponse, OsvBatchResult, OsvPackage, OsvQuery, OsvRecord, OsvSeverity,
    OsvVulnId,
};
pub use seed::{is_vulnerable, load_seed, SeedChecker, SEED_FILE_NAME};

use crate::model::{Dependency, VulnsByPackage};
use async_trait::async_trait;

#[async_trait]
pub trait VulnerabilityChecker: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(&self, deps: &[Dependency]) -> VulnsByPackage;
}
