use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Four-level impact rating. Variants are declared lowest first so the
/// derived ordering reads `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    /// Reads a severity label case-insensitively. `MODERATE` is the GitHub
    /// advisory spelling of `MEDIUM`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "CRITICAL" => Some(Severity::Critical),
            "HIGH" => Some(Severity::High),
            "MEDIUM" | "MODERATE" => Some(Severity::Medium),
            "LOW" => Some(Severity::Low),
            _ => None,
        }
    }

    /// Classifies a numeric CVSS base score.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 9.0 => Severity::Critical,
            s if s >= 7.0 => Severity::High,
            s if s >= 4.0 => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::from_label(s).ok_or_else(|| {
            format!(
                "Unknown severity: {}. Use CRITICAL, HIGH, MEDIUM (MODERATE) or LOW",
                s
            )
        })
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    pub package: String,
    /// Exclusive upper bound such as `<1.3.0`. Absent means every version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<String>,
    pub external_id: String,
    pub severity: Severity,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub references: Vec<String>,
}

/// Matched vulnerabilities keyed by dependency name.
pub type VulnsByPackage = BTreeMap<String, Vec<Vulnerability>>;

/// Appends `found` to the entry for `package`, skipping ids already present.
pub fn merge_vulns(map: &mut VulnsByPackage, package: &str, found: Vec<Vulnerability>) {
    if found.is_empty() {
        return;
    }
    let entry = map.entry(package.to_string()).or_default();
    for vuln in found {
        if !entry.iter().any(|v| v.external_id == vuln.external_id) {
            entry.push(vuln);
        }
    }
}
