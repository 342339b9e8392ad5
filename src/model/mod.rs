//! Core data types for dependencies, vulnerabilities, licenses and scores.
//!
//! This module contains the values that flow through a scan:
//!
//! - [`Dependency`] - A resolved package taken from a lockfile
//! - [`Vulnerability`] - A known vulnerability matched to a package
//! - [`LicenseFinding`] - The policy verdict for a package's license
//! - [`ScoreBreakdown`] - The composite risk score with attribution
//! - [`ScanReport`] - Everything above, bundled for output
//!
//! All of them are built fresh for each scan and owned by the caller.
//!
//! # Example
//!
//! ```
//! use deprisk::model::{normalize_deps, Dependency, Ecosystem};
//!
//! let deps = vec![Dependency::new("lodash", "4.17.21")];
//! let normalized = normalize_deps(deps.clone(), Ecosystem::Npm);
//!
//! assert_eq!(normalized, deps);
//! assert_eq!(normalized[0].identity_key(), "npm:lodash@4.17.21");
//! ```

mod dependency;
mod license;
mod report;
mod score;
mod vulnerability;

pub use dependency::*;
pub use license::*;
pub use report::*;
pub use score::*;
pub use vulnerability::*;
