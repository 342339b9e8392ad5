//! Lockfile parsing.
//!
//! Two formats are understood:
//!
//! | Format | File | Schema |
//! |--------|------|--------|
//! | npm | `package-lock.json` | v1 nested tree, v2/v3 `packages` map |
//! | pnpm | `pnpm-lock.yaml` | `packages` map, importer fallback |
//!
//! Both parsers return a list deduplicated by
//! [`Dependency::identity_key`](crate::model::Dependency::identity_key) and
//! raise a [`ParseError`] on malformed input. What to do about a lockfile that
//! cannot be parsed is left to the caller.
//!
//! # Example
//!
//! ```
//! use deprisk::lockfile::{parse_lockfile, LockfileKind};
//!
//! let text = r#"{"packages": {"": {}, "node_modules/ms": {"version": "2.1.3"}}}"#;
//! let kind = LockfileKind::detect("package-lock.json").unwrap();
//! let deps = parse_lockfile(kind, text)?;
//!
//! assert_eq!(deps[0].name, "ms");
//! # Ok::<(), deprisk::error::ParseError>(())
//! ```

mod npm;
mod pnpm;

pub use npm::parse_package_lock;
pub use pnpm::parse_pnpm_lock;

use crate::error::ParseError;
use crate::model::Dependency;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockfileKind {
    PackageLock,
    PnpmLock,
}

impl LockfileKind {
    /// Lookup order when searching a project directory.
    pub const ALL: [LockfileKind; 2] = [LockfileKind::PackageLock, LockfileKind::PnpmLock];

    pub fn file_name(&self) -> &'static str {
        match self {
            LockfileKind::PackageLock => "package-lock.json",
            LockfileKind::PnpmLock => "pnpm-lock.yaml",
        }
    }

    /// Classifies a file by name. Paths and prefixed names such as
    /// `frontend-package-lock.json` are accepted.
    pub fn detect(filename: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| filename.ends_with(kind.file_name()))
    }
}

impl std::fmt::Display for LockfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

pub fn parse_lockfile(kind: LockfileKind, text: &str) -> Result<Vec<Dependency>, ParseError> {
    match kind {
        LockfileKind::PackageLock => parse_package_lock(text),
        LockfileKind::PnpmLock => parse_pnpm_lock(text),
    }
}

/// Finds the lockfile of a project directory, preferring `package-lock.json`.
pub fn locate_lockfile(project_dir: &Path) -> Option<PathBuf> {
    LockfileKind::ALL
        .into_iter()
        .map(|kind| project_dir.join(kind.file_name()))
        .find(|path| path.is_file())
}

/// Reads and parses a lockfile from disk.
///
/// # Errors
///
/// Returns [`ParseError::Unsupported`] for an unrecognized file name,
/// [`ParseError::Io`] if the file cannot be read, and the format's parse
/// error if its content is malformed.
pub fn read_lockfile(path: &Path) -> Result<(LockfileKind, Vec<Dependency>), ParseError> {
    let filename = path.to_string_lossy();
    let kind = LockfileKind::detect(&filename).ok_or_else(|| ParseError::Unsupported {
        filename: filename.to_string(),
    })?;
    let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((kind, parse_lockfile(kind, &text)?))
}
