use crate::error::ParseError;
use crate::model::{dedupe, Dependency};
use serde_yaml_ng::Value;

/// Importer sections read when the lockfile has no `packages` map.
const IMPORTER_SECTIONS: [&str; 2] = ["dependencies", "optionalDependencies"];

/// Parses a `pnpm-lock.yaml` into a deduplicated dependency list.
///
/// Every entry of the top-level `packages` map is read, which covers direct
/// and transitive packages. Lockfiles without that map fall back to the
/// first importer's direct dependencies.
///
/// # Errors
///
/// Returns [`ParseError::Yaml`] if the text is not valid YAML.
pub fn parse_pnpm_lock(text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: Value = serde_yaml_ng::from_str(text)?;
    let mut out = Vec::new();

    if let Some(packages) = doc.get("packages").and_then(Value::as_mapping) {
        out.extend(
            packages
                .keys()
                .filter_map(Value::as_str)
                .filter_map(dependency_from_key),
        );
    } else if let Some(importer) = doc
        .get("importers")
        .and_then(Value::as_mapping)
        .and_then(|importers| importers.values().next())
    {
        for section in IMPORTER_SECTIONS {
            let Some(entries) = importer.get(section).and_then(Value::as_mapping) else {
                continue;
            };
            for (name, info) in entries {
                let Some(name) = name.as_str() else {
                    continue;
                };
                let declared = info
                    .as_str()
                    .or_else(|| info.get("version").and_then(Value::as_str));
                if let Some(version) = declared.map(strip_peer_suffix) {
                    if !name.is_empty() && !version.is_empty() {
                        out.push(Dependency::new(name, version));
                    }
                }
            }
        }
    }

    Ok(dedupe(out))
}

/// Reads `name@version` out of a `packages` key.
///
/// Handles `/lodash@4.17.21`, `/@scope/name@1.2.3` and peer-qualified keys
/// like `/react-dom@18.2.0(react@18.2.0)`. Local `link:` and `file:` entries
/// are not registry packages and yield `None`.
fn dependency_from_key(key: &str) -> Option<Dependency> {
    let key = key.strip_prefix('/').unwrap_or(key);
    if key.starts_with("link:") || key.starts_with("file:") {
        return None;
    }

    // The peer suffix may itself contain '@', so drop it before splitting.
    let key = strip_peer_suffix(key);
    let at = key.rfind('@').filter(|&at| at > 0)?;
    let name = &key[..at];
    let version = &key[at + 1..];
    let version = version.split('/').next().unwrap_or(version);

    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some(Dependency::new(name, version))
}

fn strip_peer_suffix(version: &str) -> &str {
    version.split('(').next().unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_and_versions(deps: &[Dependency]) -> Vec<(&str, &str)> {
        deps.iter()
            .map(|d| (d.name.as_str(), d.version.as_str()))
            .collect()
    }

    #[test]
    fn test_scoped_key() {
        let dep = dependency_from_key("/@scope/name@1.2.3").unwrap();
        assert_eq!(dep.name, "@scope/name");
        assert_eq!(dep.version, "1.2.3");
    }

    #[test]
    fn test_peer_suffix_key() {
        let dep = dependency_from_key("/lodash@4.17.21(someDep@1.0.0)").unwrap();
        assert_eq!(dep.name, "lodash");
        assert_eq!(dep.version, "4.17.21");

        let dep = dependency_from_key("/@mui/base@5.0.0(@types/node@20)").unwrap();
        assert_eq!(dep.name, "@mui/base");
        assert_eq!(dep.version, "5.0.0");
    }

    #[test]
    fn test_path_fragment_after_version() {
        let dep = dependency_from_key("/foo@1.0.0/extra").unwrap();
        assert_eq!(dep.version, "1.0.0");
    }

    #[test]
    fn test_unusable_keys() {
        assert!(dependency_from_key("link:../packages/a").is_none());
        assert!(dependency_from_key("/file:vendor/x.tgz").is_none());
        assert!(dependency_from_key("/@scope").is_none());
        assert!(dependency_from_key("/lodash/4.17.21").is_none());
        assert!(dependency_from_key("/lodash@").is_none());
    }

    #[test]
    fn test_packages_map() {
        let text = r#"
lockfileVersion: '6.0'
importers:
  .:
    dependencies:
      ignored:
        specifier: ^1.0.0
        version: 1.0.0
packages:
  /lodash@4.17.21:
    resolution: {integrity: sha512-abc}
  /@babel/core@7.23.0:
    resolution: {integrity: sha512-def}
  /react-dom@18.2.0(react@18.2.0):
    resolution: {integrity: sha512-ghi}
  /react-dom@18.2.0(react@18.3.0):
    resolution: {integrity: sha512-ghi}
  link:packages/local: {}
"#;

        let deps = parse_pnpm_lock(text).unwrap();
        assert_eq!(
            names_and_versions(&deps),
            vec![
                ("lodash", "4.17.21"),
                ("@babel/core", "7.23.0"),
                ("react-dom", "18.2.0"),
            ]
        );
    }

    #[test]
    fn test_v9_keys_without_leading_slash() {
        let text = r#"
lockfileVersion: '9.0'
packages:
  'lodash@4.17.21':
    resolution: {integrity: sha512-abc}
  '@types/node@20.11.0':
    resolution: {integrity: sha512-def}
"#;

        let deps = parse_pnpm_lock(text).unwrap();
        assert_eq!(
            names_and_versions(&deps),
            vec![("lodash", "4.17.21"), ("@types/node", "20.11.0")]
        );
    }

    #[test]
    fn test_importer_fallback_reads_first_importer_only() {
        let text = r#"
lockfileVersion: '6.0'
importers:
  .:
    dependencies:
      express:
        specifier: ^4.18.0
        version: 4.18.2
      react-dom:
        specifier: ^18.0.0
        version: 18.2.0(react@18.2.0)
    optionalDependencies:
      fsevents: 2.3.3
    devDependencies:
      vitest:
        specifier: ^1.0.0
        version: 1.0.0
  packages/other:
    dependencies:
      left-pad:
        specifier: ^1.3.0
        version: 1.3.0
"#;

        let deps = parse_pnpm_lock(text).unwrap();
        assert_eq!(
            names_and_versions(&deps),
            vec![
                ("express", "4.18.2"),
                ("react-dom", "18.2.0"),
                ("fsevents", "2.3.3"),
            ]
        );
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_pnpm_lock("lockfileVersion: '6.0'\n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let err = parse_pnpm_lock("packages: [unclosed").unwrap_err();
        assert!(matches!(err, ParseError::Yaml(_)));
    }
}
