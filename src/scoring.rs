//! Composite risk scoring.
//!
//! Four factors add up to a raw score:
//!
//! | Factor | Contribution |
//! |--------|--------------|
//! | severity | CRITICAL 10, HIGH 6, MEDIUM 3, LOW 1 per vulnerability |
//! | staleness | +3 behind a major release, +1 behind a minor release |
//! | age | +2 when the installed release is older than 18 months |
//! | license | +5 blocked, +2 warn |
//!
//! The total is the raw score averaged over the dependency count, scaled by
//! 10, rounded and clamped to `0..=100`. Staleness and age only count when
//! the caller supplies registry data.

use crate::model::{
    Contributor, Dependency, LicenseFinding, LicenseStatus, ScoreBreakdown, ScoreFactors,
    Severity, VersionParts, VulnsByPackage,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityWeights {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 10,
            high: 6,
            medium: 3,
            low: 1,
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub severity: SeverityWeights,
    pub major_drift: u32,
    pub minor_drift: u32,
    pub age_threshold_months: f64,
    pub age_penalty: u32,
    pub license_blocked: u32,
    pub license_warn: u32,
    pub scale: f64,
    pub max_contributors: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            severity: SeverityWeights::default(),
            major_drift: 3,
            minor_drift: 1,
            age_threshold_months: 18.0,
            age_penalty: 2,
            license_blocked: 5,
            license_warn: 2,
            scale: 10.0,
            max_contributors: 5,
        }
    }
}

/// Everything the scorer looks at. The registry maps are optional.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    pub dependencies: &'a [Dependency],
    pub vulns_by_package: &'a VulnsByPackage,
    pub license_findings: &'a [LicenseFinding],
    /// package name → latest published version
    pub latest: Option<&'a HashMap<String, String>>,
    /// package name → months since the installed version was published
    pub age_months: Option<&'a HashMap<String, f64>>,
}

impl<'a> ScoreInputs<'a> {
    pub fn new(
        dependencies: &'a [Dependency],
        vulns_by_package: &'a VulnsByPackage,
        license_findings: &'a [LicenseFinding],
    ) -> Self {
        Self {
            dependencies,
            vulns_by_package,
            license_findings,
            latest: None,
            age_months: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drift {
    None,
    Minor,
    Major,
}

fn drift(current: &str, latest: &str) -> Drift {
    let current = VersionParts::parse(current);
    let latest = VersionParts::parse(latest);
    let (Some(current_major), Some(latest_major)) = (current.major, latest.major) else {
        return Drift::None;
    };

    if latest_major > current_major {
        Drift::Major
    } else if latest_major == current_major && latest.minor > current.minor {
        Drift::Minor
    } else {
        Drift::None
    }
}

/// Running per-package totals, remembering first-seen order.
#[derive(Default)]
struct Contributions {
    totals: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl Contributions {
    fn add(&mut self, package: &str, points: u32) {
        if points == 0 {
            return;
        }
        match self.index.get(package) {
            Some(&i) => self.totals[i].1 += points,
            None => {
                self.index.insert(package.to_string(), self.totals.len());
                self.totals.push((package.to_string(), points));
            }
        }
    }

    fn top(mut self, limit: usize) -> Vec<Contributor> {
        // Stable sort keeps first-seen order among equal scores.
        self.totals.sort_by(|a, b| b.1.cmp(&a.1));
        self.totals
            .into_iter()
            .take(limit)
            .map(|(package, score)| Contributor { package, score })
            .collect()
    }
}

pub fn compute_score(inputs: &ScoreInputs<'_>, config: &ScoringConfig) -> ScoreBreakdown {
    let mut factors = ScoreFactors::default();
    let mut contributions = Contributions::default();

    // Severity, visiting packages in dependency order so ties stay stable.
    let mut visited = std::collections::HashSet::new();
    let ordered_names = inputs
        .dependencies
        .iter()
        .map(|d| d.name.as_str())
        .chain(inputs.vulns_by_package.keys().map(String::as_str));
    for name in ordered_names {
        if !visited.insert(name) {
            continue;
        }
        let Some(vulns) = inputs.vulns_by_package.get(name) else {
            continue;
        };
        for vuln in vulns {
            let weight = config.severity.weight(vuln.severity);
            factors.severity += weight;
            contributions.add(name, weight);
        }
    }

    if let Some(latest) = inputs.latest {
        for dep in inputs.dependencies {
            let Some(latest_version) = latest.get(&dep.name) else {
                continue;
            };
            let points = match drift(&dep.version, latest_version) {
                Drift::Major => config.major_drift,
                Drift::Minor => config.minor_drift,
                Drift::None => 0,
            };
            factors.staleness += points;
            contributions.add(&dep.name, points);
        }
    }

    if let Some(ages) = inputs.age_months {
        for dep in inputs.dependencies {
            if ages
                .get(&dep.name)
                .is_some_and(|&months| months > config.age_threshold_months)
            {
                factors.age += config.age_penalty;
                contributions.add(&dep.name, config.age_penalty);
            }
        }
    }

    for finding in inputs.license_findings {
        let points = match finding.status {
            LicenseStatus::Blocked => config.license_blocked,
            LicenseStatus::Warn => config.license_warn,
            LicenseStatus::Allowed => 0,
        };
        factors.license += points;
        contributions.add(&finding.package, points);
    }

    let dep_count = inputs.dependencies.len().max(1) as f64;
    let scaled = (f64::from(factors.raw()) / dep_count * config.scale).round();
    let total = scaled.clamp(0.0, 100.0) as u8;

    ScoreBreakdown {
        total,
        factors,
        top_contributors: contributions.top(config.max_contributors),
    }
}
