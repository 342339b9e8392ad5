use super::{Dependency, LicenseFinding, LicenseStatus, ScoreBreakdown, Severity, VulnsByPackage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one scan, handed back to whoever persists or renders it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scanned_at: DateTime<Utc>,
    /// File name of the lockfile that was analyzed.
    pub lockfile: String,
    pub dependencies: Vec<Dependency>,
    pub vulnerabilities: VulnsByPackage,
    pub licenses: Vec<LicenseFinding>,
    pub score: ScoreBreakdown,
}

impl ScanReport {
    pub fn vulnerability_count(&self) -> usize {
        self.vulnerabilities.values().map(Vec::len).sum()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.vulnerabilities
            .values()
            .flatten()
            .map(|v| v.severity)
            .max()
    }

    pub fn license_count(&self, status: LicenseStatus) -> usize {
        self.licenses.iter().filter(|l| l.status == status).count()
    }
}
