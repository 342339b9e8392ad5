use crate::error::ParseError;
use crate::model::{dedupe, Dependency};
use serde_json::{Map, Value};

/// Parses an npm `package-lock.json` into a deduplicated dependency list.
///
/// Lockfile versions 2 and 3 are read from the flat `packages` map. Version 1
/// files only carry the nested `dependencies` tree, which is walked
/// recursively. A document with neither section yields an empty list.
///
/// # Errors
///
/// Returns [`ParseError::Json`] if the text is not valid JSON.
pub fn parse_package_lock(text: &str) -> Result<Vec<Dependency>, ParseError> {
    let doc: Value = serde_json::from_str(text)?;

    if let Some(packages) = doc.get("packages").and_then(Value::as_object) {
        return Ok(dedupe(from_packages_map(packages)));
    }

    if let Some(tree) = doc.get("dependencies").and_then(Value::as_object) {
        let mut out = Vec::new();
        visit_tree(tree, &mut out);
        return Ok(dedupe(out));
    }

    Ok(Vec::new())
}

fn from_packages_map(packages: &Map<String, Value>) -> Vec<Dependency> {
    packages
        .iter()
        .filter(|(key, _)| !key.is_empty())
        .filter_map(|(key, info)| {
            let info = info.as_object()?;
            let version = info.get("version").and_then(Value::as_str)?;
            let name = match package_name_from_path(key) {
                Some(name) => name,
                // Workspace members are keyed by their folder, not by node_modules.
                None if !key.contains("node_modules/") => {
                    info.get("name").and_then(Value::as_str)?.to_string()
                }
                None => return None,
            };
            if name.is_empty() || version.is_empty() {
                return None;
            }
            Some(Dependency::new(name, version))
        })
        .collect()
}

/// Package name installed at a `node_modules` path.
///
/// `node_modules/a/node_modules/@scope/b` resolves to `@scope/b`.
fn package_name_from_path(key: &str) -> Option<String> {
    if !key.contains("node_modules/") {
        return None;
    }
    let tail = key.rsplit("node_modules/").next()?;
    let mut segments = tail.split('/');
    let first = segments.next().filter(|s| !s.is_empty())?;

    if first.starts_with('@') {
        let second = segments.next().filter(|s| !s.is_empty())?;
        Some(format!("{}/{}", first, second))
    } else {
        Some(first.to_string())
    }
}

fn visit_tree(tree: &Map<String, Value>, out: &mut Vec<Dependency>) {
    for (name, node) in tree {
        if let Some(version) = node.get("version").and_then(Value::as_str) {
            if !version.is_empty() {
                out.push(Dependency::new(name.as_str(), version));
            }
        }
        if let Some(nested) = node.get("dependencies").and_then(Value::as_object) {
            visit_tree(nested, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pairs(deps: &[Dependency]) -> BTreeSet<(String, String)> {
        deps.iter()
            .map(|d| (d.name.clone(), d.version.clone()))
            .collect()
    }

    fn set(items: &[(&str, &str)]) -> BTreeSet<(String, String)> {
        items
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lockfile_v3_packages_map() {
        let text = r#"{
            "name": "demo",
            "lockfileVersion": 3,
            "packages": {
                "": { "name": "demo", "version": "1.0.0" },
                "node_modules/lodash": { "version": "4.17.21" },
                "node_modules/express": { "version": "4.18.2" },
                "node_modules/express/node_modules/debug": { "version": "2.6.9" },
                "node_modules/debug": { "version": "4.3.4" },
                "node_modules/@babel/core": { "version": "7.23.0" },
                "node_modules/linked": { "resolved": "packages/linked", "link": true }
            }
        }"#;

        let deps = parse_package_lock(text).unwrap();
        assert_eq!(
            pairs(&deps),
            set(&[
                ("lodash", "4.17.21"),
                ("express", "4.18.2"),
                ("debug", "2.6.9"),
                ("debug", "4.3.4"),
                ("@babel/core", "7.23.0"),
            ])
        );
        assert_eq!(deps.len(), 5);
    }

    #[test]
    fn test_packages_keep_lockfile_order() {
        let text = r#"{
            "packages": {
                "": {},
                "node_modules/zod": { "version": "3.22.0" },
                "node_modules/react": { "version": "18.2.0" },
                "node_modules/axios": { "version": "1.6.0" },
                "node_modules/react/node_modules/loose-envify": { "version": "1.4.0" }
            }
        }"#;

        let names: Vec<_> = parse_package_lock(text)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["zod", "react", "axios", "loose-envify"]);
    }

    #[test]
    fn test_lockfile_v2_dedupes_repeated_pairs() {
        let text = r#"{
            "lockfileVersion": 2,
            "packages": {
                "": { "version": "0.0.1" },
                "node_modules/ms": { "version": "2.1.3" },
                "node_modules/a/node_modules/ms": { "version": "2.1.3" },
                "node_modules/b/node_modules/ms": { "version": "2.0.0" }
            },
            "dependencies": {
                "ignored": { "version": "9.9.9" }
            }
        }"#;

        let deps = parse_package_lock(text).unwrap();
        assert_eq!(pairs(&deps), set(&[("ms", "2.1.3"), ("ms", "2.0.0")]));
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn test_lockfile_v3_workspace_member_uses_name_field() {
        let text = r#"{
            "packages": {
                "": { "name": "root" },
                "packages/app": { "name": "app", "version": "0.2.0" },
                "packages/no-name": { "version": "0.3.0" }
            }
        }"#;

        let deps = parse_package_lock(text).unwrap();
        assert_eq!(pairs(&deps), set(&[("app", "0.2.0")]));
    }

    #[test]
    fn test_lockfile_v1_nested_tree() {
        let text = r#"{
            "lockfileVersion": 1,
            "dependencies": {
                "express": {
                    "version": "4.17.1",
                    "dependencies": {
                        "debug": {
                            "version": "2.6.9",
                            "dependencies": {
                                "ms": { "version": "2.0.0" }
                            }
                        }
                    }
                },
                "ms": { "version": "2.1.2" },
                "bundled": { "dependencies": { "inner": { "version": "1.0.0" } } }
            }
        }"#;

        let deps = parse_package_lock(text).unwrap();
        assert_eq!(
            pairs(&deps),
            set(&[
                ("express", "4.17.1"),
                ("debug", "2.6.9"),
                ("ms", "2.0.0"),
                ("ms", "2.1.2"),
                ("inner", "1.0.0"),
            ])
        );
        let order: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(order, vec!["express", "debug", "ms", "ms", "inner"]);
    }

    #[test]
    fn test_document_without_sections_is_empty() {
        assert!(parse_package_lock(r#"{"name": "x"}"#).unwrap().is_empty());
        assert!(parse_package_lock("[]").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = parse_package_lock("{ \"packages\": ").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_package_name_from_path() {
        assert_eq!(
            package_name_from_path("node_modules/a/node_modules/@s/b"),
            Some("@s/b".to_string())
        );
        assert_eq!(package_name_from_path("node_modules/@s"), None);
        assert_eq!(package_name_from_path("packages/app"), None);
    }
}
