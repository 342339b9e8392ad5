use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    #[default]
    Npm,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ecosystem: Ecosystem::Npm,
        }
    }

    /// `ecosystem:name@version`, the key a dependency set is deduplicated by.
    pub fn identity_key(&self) -> String {
        format!("{}:{}@{}", self.ecosystem, self.name, self.version)
    }
}

/// A dependency-shaped record that has not been validated yet.
///
/// Seeds, API payloads and hand-written fixtures all arrive in this shape;
/// [`normalize_deps`] turns them into [`Dependency`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDependency {
    pub name: Option<String>,
    pub version: Option<String>,
    pub ecosystem: Option<Ecosystem>,
}

impl From<Dependency> for RawDependency {
    fn from(dep: Dependency) -> Self {
        Self {
            name: Some(dep.name),
            version: Some(dep.version),
            ecosystem: Some(dep.ecosystem),
        }
    }
}

/// Drops records without a name or version and fills in the ecosystem.
///
/// Empty strings count as missing. Applying this to its own output returns
/// the same list.
pub fn normalize_deps<I, D>(records: I, default_ecosystem: Ecosystem) -> Vec<Dependency>
where
    I: IntoIterator<Item = D>,
    D: Into<RawDependency>,
{
    records
        .into_iter()
        .map(Into::into)
        .filter_map(|raw| {
            let name = raw.name.filter(|n| !n.is_empty())?;
            let version = raw.version.filter(|v| !v.is_empty())?;
            Some(Dependency {
                name,
                version,
                ecosystem: raw.ecosystem.unwrap_or(default_ecosystem),
            })
        })
        .collect()
}

/// Removes repeated identity keys, keeping the first occurrence in place.
pub fn dedupe(deps: Vec<Dependency>) -> Vec<Dependency> {
    let mut seen = HashSet::new();
    deps.into_iter()
        .filter(|dep| seen.insert(dep.identity_key()))
        .collect()
}

/// Leading numeric part of a dotted version component ("3-beta" reads as 3).
pub(crate) fn numeric_prefix(component: &str) -> Option<u64> {
    let trimmed = component.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

/// `(major, minor, patch)` read from a version string.
///
/// The major component is `None` when it is not numeric; missing or
/// non-numeric minor and patch components read as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VersionParts {
    pub major: Option<u64>,
    pub minor: u64,
    pub patch: u64,
}

impl VersionParts {
    pub fn parse(version: &str) -> Self {
        let mut parts = version.split('.');
        let major = parts.next().and_then(numeric_prefix);
        let minor = parts.next().and_then(numeric_prefix).unwrap_or(0);
        let patch = parts.next().and_then(numeric_prefix).unwrap_or(0);
        Self {
            major,
            minor,
            patch,
        }
    }
}
