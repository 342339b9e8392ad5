use crate::error::SeedError;
use crate::model::{merge_vulns, Dependency, Severity, Vulnerability, VulnsByPackage, VersionParts};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// File looked up inside a seed directory.
pub const SEED_FILE_NAME: &str = "vulnerabilities.json";

/// Offline checker backed by a fixed vulnerability list.
pub struct SeedChecker {
    entries: Vec<Vulnerability>,
}

impl SeedChecker {
    pub fn new(entries: Vec<Vulnerability>) -> Self {
        Self { entries }
    }

    /// Loads `vulnerabilities.json` from `dir`. A missing file gives an empty
    /// seed.
    pub fn from_dir(dir: &Path) -> Result<Self, SeedError> {
        Ok(Self::new(load_seed(dir)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matches_for(&self, dep: &Dependency) -> Vec<Vulnerability> {
        self.entries
            .iter()
            .filter(|v| v.package == dep.name)
            .filter(|v| is_vulnerable(&dep.version, v.version_range.as_deref()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl super::VulnerabilityChecker for SeedChecker {
    fn name(&self) -> &'static str {
        "seed"
    }

    async fn check(&self, deps: &[Dependency]) -> VulnsByPackage {
        let mut out = VulnsByPackage::new();
        for dep in deps {
            merge_vulns(&mut out, &dep.name, self.matches_for(dep));
        }
        debug!(
            packages = out.len(),
            seed_entries = self.entries.len(),
            "seed matching complete"
        );
        out
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedEntry {
    package: Option<String>,
    version_range: Option<String>,
    external_id: Option<String>,
    severity: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    references: Vec<serde_json::Value>,
}

impl SeedEntry {
    fn into_vulnerability(self, index: usize) -> Result<Vulnerability, SeedError> {
        let invalid = |reason: &str| SeedError::InvalidEntry {
            index,
            reason: reason.to_string(),
        };

        let package = self
            .package
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("missing package"))?;
        let external_id = self
            .external_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| invalid("missing externalId"))?;
        let label = self.severity.ok_or_else(|| invalid("missing severity"))?;
        let severity = Severity::from_label(&label)
            .ok_or_else(|| invalid(&format!("unknown severity {:?}", label)))?;

        Ok(Vulnerability {
            package,
            version_range: self.version_range.filter(|r| !r.is_empty()),
            external_id,
            severity,
            summary: self.summary.unwrap_or_default(),
            references: self
                .references
                .into_iter()
                .map(|r| match r {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        })
    }
}

/// Reads the seed list from `<dir>/vulnerabilities.json`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, is not a JSON
/// array, or contains an entry without `package`, `externalId` or a known
/// `severity`.
pub fn load_seed(dir: &Path) -> Result<Vec<Vulnerability>, SeedError> {
    let path = dir.join(SEED_FILE_NAME);
    if !path.exists() {
        debug!(path = %path.display(), "no seed file, using empty seed");
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path).map_err(|source| SeedError::Io {
        path: path.clone(),
        source,
    })?;
    let entries: Vec<SeedEntry> =
        serde_json::from_str(&content).map_err(|source| SeedError::Malformed {
            path: path.clone(),
            source,
        })?;

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_vulnerability(index))
        .collect()
}

/// Checks a version against an exclusive upper bound of the form
/// `<MAJOR[.MINOR[.PATCH]]`.
///
/// No range means every version is affected. Ranges of any other shape, and
/// versions whose major component is not numeric, are never matched. Lower
/// bounds, combinators and pre-release tags are not supported.
pub fn is_vulnerable(version: &str, range: Option<&str>) -> bool {
    let Some(range) = range else {
        return true;
    };
    let Some(bound) = parse_upper_bound(range) else {
        return false;
    };

    let current = VersionParts::parse(version);
    let Some(major) = current.major else {
        return false;
    };

    (major, current.minor, current.patch) < bound
}

/// `<1.2.3` → `(1, 2, 3)`, with missing minor/patch read as 0.
fn parse_upper_bound(range: &str) -> Option<(u64, u64, u64)> {
    let rest = range.strip_prefix('<')?;
    // "<=" and other operators are outside the supported subset.
    if !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let mut numbers = [0u64; 3];
    let mut remaining = rest;
    for (i, slot) in numbers.iter_mut().enumerate() {
        if i > 0 {
            match remaining.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => remaining = next,
                _ => break,
            }
        }
        let end = remaining
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(remaining.len());
        *slot = remaining[..end].parse().ok()?;
        remaining = &remaining[end..];
    }

    Some((numbers[0], numbers[1], numbers[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::VulnerabilityChecker;

    fn seed_vuln(package: &str, range: Option<&str>, id: &str) -> Vulnerability {
        Vulnerability {
            package: package.to_string(),
            version_range: range.map(str::to_string),
            external_id: id.to_string(),
            severity: Severity::High,
            summary: String::new(),
            references: Vec::new(),
        }
    }

    #[test]
    fn test_is_vulnerable_examples() {
        assert!(is_vulnerable("1.2.3", Some("<1.3.0")));
        assert!(!is_vulnerable("1.3.0", Some("<1.3.0")));
        assert!(is_vulnerable("2.0.0", None));
    }

    #[test]
    fn test_is_vulnerable_component_priority() {
        assert!(is_vulnerable("0.9.9", Some("<1.0.0")));
        assert!(!is_vulnerable("2.0.0", Some("<1.9.9")));
        assert!(is_vulnerable("1.2.9", Some("<1.3.0")));
        assert!(!is_vulnerable("1.4.0", Some("<1.3.5")));
        assert!(is_vulnerable("1.3.4", Some("<1.3.5")));
        assert!(!is_vulnerable("1.3.5", Some("<1.3.5")));
    }

    #[test]
    fn test_is_vulnerable_short_bounds() {
        assert!(is_vulnerable("1.99.99", Some("<2")));
        assert!(!is_vulnerable("2.0.0", Some("<2")));
        assert!(is_vulnerable("4.16.9", Some("<4.17")));
        assert!(!is_vulnerable("4.17.0", Some("<4.17")));
    }

    #[test]
    fn test_is_vulnerable_rejects_unsupported_input() {
        assert!(!is_vulnerable("x.1.0", Some("<2.0.0")));
        assert!(!is_vulnerable("1.0.0", Some(">=1.0.0")));
        assert!(!is_vulnerable("1.0.0", Some("<=2.0.0")));
        assert!(!is_vulnerable("1.0.0", Some("1.0.0 - 2.0.0")));
    }

    #[test]
    fn test_is_vulnerable_partial_versions() {
        assert!(is_vulnerable("1", Some("<1.0.1")));
        assert!(is_vulnerable("1.2", Some("<1.2.1")));
        assert!(!is_vulnerable("1.2.0-beta.1", Some("<1.2.0")));
    }

    #[test]
    fn test_parse_upper_bound() {
        assert_eq!(parse_upper_bound("<1.3.0"), Some((1, 3, 0)));
        assert_eq!(parse_upper_bound("<4"), Some((4, 0, 0)));
        assert_eq!(parse_upper_bound("<4.17.21 || >=5"), Some((4, 17, 21)));
        assert_eq!(parse_upper_bound("<"), None);
        assert_eq!(parse_upper_bound("1.0.0"), None);
    }

    #[tokio::test]
    async fn test_seed_checker_matches_by_name_and_range() {
        let checker = SeedChecker::new(vec![
            seed_vuln("lodash", Some("<4.17.21"), "GHSA-lodash"),
            seed_vuln("lodash", None, "GHSA-lodash-any"),
            seed_vuln("minimist", Some("<1.2.6"), "GHSA-minimist"),
            seed_vuln("lodash.merge", None, "GHSA-other"),
        ]);
        let deps = vec![
            Dependency::new("lodash", "4.17.20"),
            Dependency::new("minimist", "1.2.8"),
            Dependency::new("express", "4.18.2"),
        ];

        let found = checker.check(&deps).await;
        assert_eq!(found.len(), 1);
        let ids: Vec<_> = found["lodash"].iter().map(|v| v.external_id.as_str()).collect();
        assert_eq!(ids, vec!["GHSA-lodash", "GHSA-lodash-any"]);
    }

    #[tokio::test]
    async fn test_seed_checker_merges_versions_of_same_package() {
        let checker = SeedChecker::new(vec![
            seed_vuln("ms", Some("<2.0.0"), "OLD"),
            seed_vuln("ms", None, "ANY"),
        ]);
        let deps = vec![Dependency::new("ms", "0.7.1"), Dependency::new("ms", "2.1.3")];

        let found = checker.check(&deps).await;
        let ids: Vec<_> = found["ms"].iter().map(|v| v.external_id.as_str()).collect();
        assert_eq!(ids, vec!["OLD", "ANY"]);
    }

    #[test]
    fn test_load_seed_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_seed(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_load_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(SEED_FILE_NAME),
            r#"[
                {
                    "package": "lodash",
                    "versionRange": "<4.17.21",
                    "externalId": "GHSA-35jh-r3h4-6jhm",
                    "severity": "high",
                    "summary": "Command injection in lodash",
                    "references": ["https://github.com/advisories/GHSA-35jh-r3h4-6jhm"]
                },
                { "package": "qs", "externalId": "CVE-2022-24999", "severity": "MODERATE" }
            ]"#,
        )
        .unwrap();

        let checker = SeedChecker::from_dir(dir.path()).unwrap();
        assert_eq!(checker.len(), 2);

        let seed = load_seed(dir.path()).unwrap();
        assert_eq!(seed[0].severity, Severity::High);
        assert_eq!(seed[0].version_range.as_deref(), Some("<4.17.21"));
        assert_eq!(seed[0].references.len(), 1);
        assert_eq!(seed[1].severity, Severity::Medium);
        assert_eq!(seed[1].version_range, None);
        assert_eq!(seed[1].summary, "");
    }

    #[test]
    fn test_load_seed_rejects_invalid_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(SEED_FILE_NAME),
            r#"[{ "package": "qs", "severity": "HIGH" }]"#,
        )
        .unwrap();
        let err = load_seed(dir.path()).unwrap_err();
        assert!(matches!(err, SeedError::InvalidEntry { index: 0, .. }));

        fs::write(dir.path().join(SEED_FILE_NAME), "{ not json").unwrap();
        let err = load_seed(dir.path()).unwrap_err();
        assert!(matches!(err, SeedError::Malformed { .. }));
    }
}
