use crate::error::SeedError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Offline license seed, an array of `{package, spdx}`.
pub const LICENSE_SEED_FILE_NAME: &str = "licenses.json";

/// Reads the declared license of an installed package from
/// `<project_root>/node_modules/<name>/package.json`.
///
/// Missing or unreadable manifests yield `None`.
pub fn read_installed_license(project_root: &Path, name: &str) -> Option<String> {
    let mut path = project_root.join("node_modules");
    for part in name.split('/') {
        path.push(part);
    }
    path.push("package.json");

    let text = fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<Value>(&text) {
        Ok(manifest) => extract_spdx(&manifest),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable package manifest");
            None
        }
    }
}

/// Pulls an SPDX identifier out of a `package.json` document.
///
/// Looks at `license` as a string, then `license.type`, then the first
/// element of the legacy `licenses` array. Compound expressions are reduced
/// to their first identifier, so `(MIT OR Apache-2.0)` gives `MIT`.
pub fn extract_spdx(manifest: &Value) -> Option<String> {
    let declared = match manifest.get("license") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
        Some(Value::Object(obj)) => obj.get("type").and_then(Value::as_str),
        _ => None,
    }
    .or_else(|| {
        let first = manifest.get("licenses")?.as_array()?.first()?;
        first
            .as_str()
            .or_else(|| first.get("type").and_then(Value::as_str))
    })?;

    let collapsed = declared.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(first_identifier(&collapsed).unwrap_or(&collapsed).to_string())
}

fn first_identifier(text: &str) -> Option<&str> {
    let is_id_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-');
    let start = text.find(is_id_char)?;
    let rest = &text[start..];
    let end = rest.find(|c: char| !is_id_char(c)).unwrap_or(rest.len());
    Some(&rest[..end])
}

#[derive(Deserialize)]
struct LicenseSeedEntry {
    package: String,
    #[serde(default)]
    spdx: Option<String>,
}

/// Loads `<dir>/licenses.json` into a package → SPDX map. A missing file
/// gives an empty map.
pub fn load_license_seed(dir: &Path) -> Result<HashMap<String, String>, SeedError> {
    let path = dir.join(LICENSE_SEED_FILE_NAME);
    if !path.exists() {
        debug!(path = %path.display(), "no license seed");
        return Ok(HashMap::new());
    }

    let content = fs::read_to_string(&path).map_err(|source| SeedError::Io {
        path: path.clone(),
        source,
    })?;
    let entries: Vec<LicenseSeedEntry> =
        serde_json::from_str(&content).map_err(|source| SeedError::Malformed {
            path: path.clone(),
            source,
        })?;

    let mut out = HashMap::new();
    for entry in entries {
        if let Some(spdx) = entry.spdx {
            out.entry(entry.package).or_insert(spdx);
        }
    }
    Ok(out)
}
