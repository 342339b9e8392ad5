//! # deprisk
//!
//! Dependency risk analysis for npm projects.
//!
//! A scan reads a `package-lock.json` or `pnpm-lock.yaml`, matches the
//! resolved packages against known vulnerabilities, checks their licenses
//! against a policy and folds everything into a single 0-100 risk score.
//!
//! ## Vulnerability Sources
//!
//! | Source | Backing data |
//! |--------|--------------|
//! | `osv` | [OSV.dev](https://osv.dev) batch API |
//! | `seed` | Local `vulnerabilities.json` |
//!
//! ## Quick Start
//!
//! ```no_run
//! use deprisk::checker::SeedChecker;
//! use deprisk::scan::Pipeline;
//! use std::path::Path;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let checker = SeedChecker::from_dir(Path::new("demo/seeds"))?;
//! let pipeline = Pipeline::new(Box::new(checker));
//!
//! let report = pipeline.scan_path(Path::new(".")).await?;
//! println!("risk score: {}", report.score.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`lockfile`] - Lockfile detection and parsing
//! - [`checker`] - Vulnerability matching (seed and OSV)
//! - [`license`] - License policy evaluation
//! - [`scoring`] - Composite risk score
//! - [`registry`] - npm registry staleness and age signals
//! - [`scan`] - The end-to-end pipeline
//! - [`model`] - Data types shared by all of the above
//! - [`output`] - Table and JSON rendering
//! - [`config`] - Configuration file handling
//! - [`cache`] - File cache for registry lookups

pub mod cache;
pub mod checker;
pub mod config;
pub mod error;
pub mod license;
pub mod lockfile;
pub mod model;
pub mod output;
pub mod registry;
pub mod scan;
pub mod scoring;

pub use cache::Cache;
pub use config::Config;
pub use error::{LookupError, ParseError, PolicyError, ScanError, SeedError};
pub use model::{Dependency, LicenseFinding, ScanReport, ScoreBreakdown, Severity, Vulnerability};
pub use scan::Pipeline;
