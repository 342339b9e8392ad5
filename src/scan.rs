//! End-to-end scan of one lockfile.
//!
//! A [`Pipeline`] owns its collaborators and runs the stages in order:
//!
//! 1. parse and normalize the lockfile
//! 2. drop ignored packages
//! 3. evaluate licenses
//! 4. match vulnerabilities and, optionally, fetch registry signals
//! 5. score
//!
//! Stage 4 runs its two lookups concurrently. Only a lockfile that cannot be
//! read or parsed fails the scan; lookup problems reduce coverage instead.

use crate::checker::VulnerabilityChecker;
use crate::config::IgnoreConfig;
use crate::error::{ParseError, ScanError};
use crate::license::{evaluate_license, read_installed_license, LicensePolicy};
use crate::lockfile::{locate_lockfile, parse_lockfile, read_lockfile, LockfileKind};
use crate::model::{
    normalize_deps, Dependency, Ecosystem, LicenseFinding, ScanReport, VulnsByPackage,
};
use crate::registry::{RegistryLookup, RegistrySignals};
use crate::scoring::{compute_score, ScoreInputs, ScoringConfig};
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Progress notifications emitted while a scan runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Parsed { dependencies: usize },
    Licenses,
    Lookups,
    Scoring,
}

impl std::fmt::Display for ScanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStage::Parsed { dependencies } => write!(f, "Parsed {} dependencies", dependencies),
            ScanStage::Licenses => write!(f, "Evaluating licenses"),
            ScanStage::Lookups => write!(f, "Checking vulnerabilities"),
            ScanStage::Scoring => write!(f, "Scoring"),
        }
    }
}

type ProgressFn = Box<dyn Fn(ScanStage) + Send + Sync>;

pub struct Pipeline {
    checker: Box<dyn VulnerabilityChecker>,
    registry: Option<Box<dyn RegistryLookup>>,
    policy: LicensePolicy,
    scoring: ScoringConfig,
    ignore: IgnoreConfig,
    /// package → SPDX used when no installed manifest is available
    license_seed: HashMap<String, String>,
    progress: Option<ProgressFn>,
}

impl Pipeline {
    pub fn new(checker: Box<dyn VulnerabilityChecker>) -> Self {
        Self {
            checker,
            registry: None,
            policy: LicensePolicy::default(),
            scoring: ScoringConfig::default(),
            ignore: IgnoreConfig::default(),
            license_seed: HashMap::new(),
            progress: None,
        }
    }

    pub fn with_registry(mut self, registry: Box<dyn RegistryLookup>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_policy(mut self, policy: LicensePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_license_seed(mut self, seed: HashMap<String, String>) -> Self {
        self.license_seed = seed;
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(ScanStage) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn report_progress(&self, stage: ScanStage) {
        debug!(%stage, "scan progress");
        if let Some(progress) = &self.progress {
            progress(stage);
        }
    }

    /// Scans a lockfile, or a project directory containing one.
    ///
    /// For a directory, `package-lock.json` is preferred over
    /// `pnpm-lock.yaml`. The lockfile's directory is used to look up installed
    /// package licenses under `node_modules`.
    pub async fn scan_path(&self, path: &Path) -> Result<ScanReport, ScanError> {
        let lockfile = if path.is_dir() {
            locate_lockfile(path).ok_or_else(|| ScanError::LockfileNotFound(path.to_path_buf()))?
        } else {
            path.to_path_buf()
        };
        info!(lockfile = %lockfile.display(), "scanning");

        let (kind, deps) = read_lockfile(&lockfile)?;
        let project_root = lockfile.parent().filter(|p| !p.as_os_str().is_empty());
        Ok(self.analyze(kind, deps, project_root).await)
    }

    /// Scans lockfile content identified by its file name.
    ///
    /// With a `project_root`, licenses are read from its `node_modules`;
    /// otherwise only the license seed is consulted.
    pub async fn scan_text(
        &self,
        filename: &str,
        content: &str,
        project_root: Option<&Path>,
    ) -> Result<ScanReport, ScanError> {
        let kind = LockfileKind::detect(filename).ok_or_else(|| ParseError::Unsupported {
            filename: filename.to_string(),
        })?;
        let deps = parse_lockfile(kind, content)?;
        Ok(self.analyze(kind, deps, project_root).await)
    }

    async fn analyze(
        &self,
        kind: LockfileKind,
        parsed: Vec<Dependency>,
        project_root: Option<&Path>,
    ) -> ScanReport {
        let dependencies: Vec<Dependency> = normalize_deps(parsed, Ecosystem::Npm)
            .into_iter()
            .filter(|dep| !self.ignore.should_ignore_package(&dep.name))
            .collect();
        self.report_progress(ScanStage::Parsed {
            dependencies: dependencies.len(),
        });

        self.report_progress(ScanStage::Licenses);
        let licenses = self.evaluate_licenses(&dependencies, project_root);

        self.report_progress(ScanStage::Lookups);
        let registry_deps: Vec<Dependency> = dependencies
            .iter()
            .filter(|dep| !self.ignore.should_ignore_outdated(&dep.name))
            .cloned()
            .collect();
        let (vulnerabilities, signals) = tokio::join!(
            self.checker.check(&dependencies),
            self.registry_signals(&registry_deps),
        );
        let vulnerabilities = self.drop_ignored_vulns(vulnerabilities);
        debug!(
            checker = self.checker.name(),
            packages = vulnerabilities.len(),
            "vulnerability matching done"
        );

        self.report_progress(ScanStage::Scoring);
        let inputs = ScoreInputs {
            latest: signals.as_ref().map(|s| &s.latest),
            age_months: signals.as_ref().map(|s| &s.age_months),
            ..ScoreInputs::new(&dependencies, &vulnerabilities, &licenses)
        };
        let score = compute_score(&inputs, &self.scoring);

        ScanReport {
            scanned_at: Utc::now(),
            lockfile: kind.file_name().to_string(),
            dependencies,
            vulnerabilities,
            licenses,
            score,
        }
    }

    fn evaluate_licenses(
        &self,
        deps: &[Dependency],
        project_root: Option<&Path>,
    ) -> Vec<LicenseFinding> {
        deps.iter()
            .map(|dep| {
                let spdx = project_root
                    .and_then(|root| read_installed_license(root, &dep.name))
                    .or_else(|| self.license_seed.get(&dep.name).cloned());
                evaluate_license(&dep.name, spdx.as_deref(), &self.policy)
            })
            .collect()
    }

    async fn registry_signals(&self, deps: &[Dependency]) -> Option<RegistrySignals> {
        let registry = self.registry.as_ref()?;
        Some(registry.signals(deps).await)
    }

    fn drop_ignored_vulns(&self, mut found: VulnsByPackage) -> VulnsByPackage {
        if self.ignore.vulnerabilities.is_empty() {
            return found;
        }
        for vulns in found.values_mut() {
            vulns.retain(|v| !self.ignore.should_ignore_vulnerability(&v.external_id));
        }
        found.retain(|_, vulns| !vulns.is_empty());
        found
    }
}
