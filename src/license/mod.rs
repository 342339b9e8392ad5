//! License policy evaluation.
//!
//! A [`LicensePolicy`] maps SPDX identifiers to a [`LicenseStatus`]. Lookups
//! are exact, so `GPL-3.0-only` and `GPL-3.0` are different entries. Anything
//! the table does not mention, including a missing license, is `warn`.
//!
//! | Status | Default identifiers |
//! |--------|---------------------|
//! | allowed | MIT, Apache-2.0, ISC, BSD-2-Clause, BSD-3-Clause |
//! | warn | LGPL-3.0, MPL-2.0 |
//! | blocked | GPL-2.0, GPL-3.0 |
//!
//! # Example
//!
//! ```
//! use deprisk::license::{evaluate_license, LicensePolicy};
//! use deprisk::model::LicenseStatus;
//!
//! let policy = LicensePolicy::default();
//! assert_eq!(evaluate_license("left-pad", Some("MIT"), &policy).status, LicenseStatus::Allowed);
//! assert_eq!(evaluate_license("left-pad", None, &policy).spdx, "UNKNOWN");
//! ```

mod manifest;

pub use manifest::{extract_spdx, load_license_seed, read_installed_license, LICENSE_SEED_FILE_NAME};

use crate::error::PolicyError;
use crate::model::{LicenseFinding, LicenseStatus, UNKNOWN_SPDX};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

const DEFAULT_POLICY: [(&str, LicenseStatus); 9] = [
    ("MIT", LicenseStatus::Allowed),
    ("Apache-2.0", LicenseStatus::Allowed),
    ("ISC", LicenseStatus::Allowed),
    ("BSD-2-Clause", LicenseStatus::Allowed),
    ("BSD-3-Clause", LicenseStatus::Allowed),
    ("LGPL-3.0", LicenseStatus::Warn),
    ("MPL-2.0", LicenseStatus::Warn),
    ("GPL-2.0", LicenseStatus::Blocked),
    ("GPL-3.0", LicenseStatus::Blocked),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensePolicy {
    table: HashMap<String, LicenseStatus>,
}

impl Default for LicensePolicy {
    fn default() -> Self {
        Self::from_entries(DEFAULT_POLICY.iter().map(|(id, status)| (*id, *status)))
    }
}

impl LicensePolicy {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, LicenseStatus)>,
        S: Into<String>,
    {
        Self {
            table: entries.into_iter().map(|(id, s)| (id.into(), s)).collect(),
        }
    }

    /// Loads a policy from a JSON object of `"SPDX-ID": "allowed|warn|blocked"`.
    /// The file replaces the default table entirely.
    pub fn from_json_file(path: &Path) -> Result<Self, PolicyError> {
        let content = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: HashMap<String, LicenseStatus> =
            serde_json::from_str(&content).map_err(|source| PolicyError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { table })
    }

    /// Returns a copy with `overrides` applied on top.
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a LicenseStatus)>,
    {
        for (id, status) in overrides {
            self.table.insert(id.clone(), *status);
        }
        self
    }

    /// Status of a known identifier. `None` for identifiers the table does
    /// not mention.
    pub fn status_for(&self, spdx: &str) -> Option<LicenseStatus> {
        self.table.get(spdx).copied()
    }

    /// Entries sorted by identifier.
    pub fn entries(&self) -> BTreeMap<&str, LicenseStatus> {
        self.table.iter().map(|(id, s)| (id.as_str(), *s)).collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Classifies one package's license against `policy`.
///
/// Empty or whitespace-only identifiers are treated as missing.
pub fn evaluate_license(
    package: &str,
    spdx: Option<&str>,
    policy: &LicensePolicy,
) -> LicenseFinding {
    match spdx.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => LicenseFinding {
            package: package.to_string(),
            spdx: id.to_string(),
            status: policy.status_for(id).unwrap_or(LicenseStatus::Warn),
        },
        None => LicenseFinding {
            package: package.to_string(),
            spdx: UNKNOWN_SPDX.to_string(),
            status: LicenseStatus::Warn,
        },
    }
}
