//! Configuration file handling.
//!
//! Settings live in a TOML file. Every key is optional and missing keys take
//! their defaults, so an empty file is a valid configuration.
//!
//! # Configuration Location
//!
//! - Linux: `~/.config/deprisk/config.toml`
//! - macOS: `~/Library/Application Support/deprisk/config.toml`
//! - Windows: `%APPDATA%\deprisk\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! cache_ttl_hours = 24
//! vuln_source = "osv"
//! seed_dir = "demo/seeds"
//! default_format = "table"
//! check_staleness = true
//! fail_above = 60
//!
//! [license]
//! policy_file = "license-policy.json"
//!
//! [license.overrides]
//! "SSPL-1.0" = "blocked"
//!
//! [ignore]
//! packages = ["@types/*"]
//! vulnerabilities = ["GHSA-xxxx-xxxx-xxxx"]
//! ```

use crate::checker::DEFAULT_OSV_API_URL;
use crate::license::LicensePolicy;
use crate::model::LicenseStatus;
use crate::registry::DEFAULT_REGISTRY_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where vulnerability data comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnSource {
    /// Local `vulnerabilities.json` seed
    Seed,
    /// OSV batch API
    #[default]
    Osv,
}

impl FromStr for VulnSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "seed" | "offline" => Ok(VulnSource::Seed),
            "osv" | "online" => Ok(VulnSource::Osv),
            _ => Err(format!("Unknown vulnerability source: {}. Use 'seed' or 'osv'", s)),
        }
    }
}

impl std::fmt::Display for VulnSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VulnSource::Seed => write!(f, "seed"),
            VulnSource::Osv => write!(f, "osv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lifetime of cached registry metadata, in hours.
    pub cache_ttl_hours: u64,

    pub vuln_source: VulnSource,

    /// Directory holding `vulnerabilities.json` and `licenses.json`.
    pub seed_dir: PathBuf,

    pub osv_api_url: String,

    pub registry_url: String,

    /// "table" or "json"
    pub default_format: String,

    /// Query the npm registry for the staleness and age factors.
    pub check_staleness: bool,

    /// Exit with status 2 when the total score is above this value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_above: Option<u8>,

    pub license: LicenseConfig,

    pub ignore: IgnoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_hours: crate::cache::DEFAULT_TTL_HOURS,
            vuln_source: VulnSource::default(),
            seed_dir: PathBuf::from("demo/seeds"),
            osv_api_url: DEFAULT_OSV_API_URL.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            default_format: "table".to_string(),
            check_staleness: true,
            fail_above: None,
            license: LicenseConfig::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// JSON policy replacing the built-in table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<PathBuf>,

    /// Per-identifier statuses applied on top of the policy.
    pub overrides: BTreeMap<String, LicenseStatus>,
}

impl LicenseConfig {
    /// Builds the effective policy: the policy file (or the built-in table)
    /// with overrides merged on top.
    pub fn build_policy(&self) -> Result<LicensePolicy> {
        let base = match &self.policy_file {
            Some(path) => LicensePolicy::from_json_file(path)
                .with_context(|| format!("Failed to load license policy {}", path.display()))?,
            None => LicensePolicy::default(),
        };
        Ok(base.with_overrides(&self.overrides))
    }
}

/// Suppressions for accepted risks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names dropped before analysis. `*` matches any run of
    /// characters, as in `@types/*`.
    pub packages: Vec<String>,

    /// Vulnerability ids that are never reported.
    pub vulnerabilities: Vec<String>,

    /// Packages left out of the staleness and age factors.
    pub outdated: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|p| glob_match(p, name))
    }

    pub fn should_ignore_vulnerability(&self, id: &str) -> bool {
        self.vulnerabilities.iter().any(|v| v.eq_ignore_ascii_case(id))
    }

    pub fn should_ignore_outdated(&self, name: &str) -> bool {
        self.outdated.iter().any(|p| glob_match(p, name))
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.vulnerabilities.is_empty() && self.outdated.is_empty()
    }
}

/// `*`-only glob. Without a `*` the match is exact.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut segments = pattern.split('*');
    let head = segments.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(head) else {
        return false;
    };

    let segments: Vec<&str> = segments.collect();
    let Some((tail, middle)) = segments.split_last() else {
        return rest.is_empty();
    };

    for segment in middle.iter().filter(|s| !s.is_empty()) {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(tail)
}

impl Config {
    /// Loads the user configuration, or defaults when there is no file.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deprisk")
            .join("config.toml")
    }

    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("lodash", "lodash"));
        assert!(!glob_match("lodash", "lodash-es"));
        assert!(glob_match("lodash*", "lodash.debounce"));
        assert!(glob_match("*-cli", "eslint-cli"));
        assert!(!glob_match("*-cli", "eslint"));
        assert!(glob_match("*lodash*", "my-lodash-plugin"));
        assert!(glob_match("@types/*", "@types/node"));
        assert!(!glob_match("@types/*", "@babel/core"));
        assert!(glob_match("@*/core", "@babel/core"));
        assert!(glob_match("a*b*c", "a-x-b-y-c"));
        assert!(!glob_match("a*b*c", "a-x-c-y-b"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_glob_overlapping_prefix_and_suffix() {
        assert!(!glob_match("ab*ba", "aba"));
        assert!(glob_match("ab*ba", "abba"));
    }

    #[test]
    fn test_ignore_config() {
        let ignore = IgnoreConfig {
            packages: vec!["@types/*".into(), "left-pad".into()],
            vulnerabilities: vec!["GHSA-abcd".into()],
            outdated: vec!["typescript".into()],
        };

        assert!(ignore.should_ignore_package("@types/react"));
        assert!(ignore.should_ignore_package("left-pad"));
        assert!(!ignore.should_ignore_package("react"));
        assert!(ignore.should_ignore_vulnerability("ghsa-ABCD"));
        assert!(!ignore.should_ignore_vulnerability("GHSA-efgh"));
        assert!(ignore.should_ignore_outdated("typescript"));
        assert!(!ignore.is_empty());
        assert!(IgnoreConfig::default().is_empty());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache_ttl_hours, 24);
        assert_eq!(config.vuln_source, VulnSource::Osv);
        assert_eq!(config.osv_api_url, "https://api.osv.dev/v1");
        assert_eq!(config.default_format, "table");
        assert!(config.check_staleness);
        assert_eq!(config.fail_above, None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
vuln_source = "seed"
fail_above = 40

[license.overrides]
"SSPL-1.0" = "blocked"

[ignore]
packages = ["@types/*"]
"#,
        )
        .unwrap();

        assert_eq!(config.vuln_source, VulnSource::Seed);
        assert_eq!(config.fail_above, Some(40));
        assert_eq!(config.cache_ttl_hours, 24);
        assert_eq!(config.license.overrides["SSPL-1.0"], LicenseStatus::Blocked);
        assert_eq!(config.ignore.packages, vec!["@types/*"]);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deprisk/config.toml");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let mut config = Config::default();
        config.fail_above = Some(75);
        config.license.overrides.insert("WTFPL".into(), LicenseStatus::Allowed);
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "vuln_source = \"carrier-pigeon\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_build_policy() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = dir.path().join("policy.json");
        fs::write(&policy_path, r#"{ "MIT": "allowed", "GPL-3.0": "blocked" }"#).unwrap();

        let mut license = LicenseConfig {
            policy_file: Some(policy_path),
            ..LicenseConfig::default()
        };
        license.overrides.insert("GPL-3.0".into(), LicenseStatus::Warn);

        let policy = license.build_policy().unwrap();
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.status_for("GPL-3.0"), Some(LicenseStatus::Warn));

        let defaults = LicenseConfig::default().build_policy().unwrap();
        assert_eq!(defaults, LicensePolicy::default());
    }

    #[test]
    fn test_vuln_source_from_str() {
        assert_eq!("SEED".parse::<VulnSource>(), Ok(VulnSource::Seed));
        assert_eq!("online".parse::<VulnSource>(), Ok(VulnSource::Osv));
        assert!("npm-audit".parse::<VulnSource>().is_err());
    }
}
