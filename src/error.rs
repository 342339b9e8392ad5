//! Error types for the analysis engine.
//!
//! Structural problems with the input (a lockfile that cannot be parsed, a
//! malformed seed file) are raised to the caller. Network problems are
//! reported as [`LookupError`] and absorbed by the checkers, which keep going
//! with whatever data they could collect.

use std::path::PathBuf;
use thiserror::Error;

/// A lockfile could not be turned into a dependency list.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed package-lock.json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed pnpm-lock.yaml: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("unsupported lockfile: {filename} (expected package-lock.json or pnpm-lock.yaml)")]
    Unsupported { filename: String },

    #[error("failed to read lockfile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The offline vulnerability seed could not be loaded.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed seed file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid seed entry #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

/// A single remote lookup failed.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("no record for {0}")]
    NotFound(String),
}

/// A license policy file could not be loaded.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed policy file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by a full scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no package-lock.json or pnpm-lock.yaml found in {0}")]
    LockfileNotFound(PathBuf),
}
