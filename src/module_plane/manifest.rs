use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A parsed `manifest.json`, plus the directory it was found in.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub entry_point: String,
    pub dependencies: Vec<String>,
    pub path: PathBuf,
    pub multi_instance: bool,
}

/// Fields present in `manifest.json` that the core doesn't currently act
/// on (`license`, `repo`) are still parsed so an unexpected-field-free
/// manifest round-trips; they're just not read anywhere yet.
#[allow(dead_code)]
#[derive(Deserialize)]
struct RawManifest {
    name: String,
    version: Option<String>,
    author: Option<String>,
    description: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(rename = "entryPoint")]
    entry_point: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(rename = "multiInstanceSpawning")]
    multi_instance_spawning: Option<bool>,
    #[serde(default)]
    repo: Option<String>,
}

pub struct Scan {
    pub manifests: HashMap<String, Manifest>,
}

/// Scans two levels under `root`: plain `<root>/<module>` directories and
/// namespaced `<root>/@ns/<module>` directories. A directory
/// qualifies iff it contains a `manifest.json` with a non-empty `name`.
/// Last-wins on a name collision is a fatal boot error.
pub fn scan(root: &Path) -> Result<Scan, String> {
    let mut manifests = HashMap::new();

    if !root.exists() {
        return Ok(Scan { manifests });
    }

    let entries = std::fs::read_dir(root).map_err(|e| e.to_string())?;
    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().to_string();
        if dir_name.starts_with('@') {
            let ns_entries = std::fs::read_dir(&path).map_err(|e| e.to_string())?;
            for ns_entry in ns_entries {
                let ns_entry = ns_entry.map_err(|e| e.to_string())?;
                let ns_path = ns_entry.path();
                if !ns_path.is_dir() {
                    continue;
                }
                if let Some(m) = load_manifest(&ns_path)? {
                    insert_unique(&mut manifests, m)?;
                }
            }
        } else if let Some(m) = load_manifest(&path)? {
            insert_unique(&mut manifests, m)?;
        }
    }

    Ok(Scan { manifests })
}

fn insert_unique(manifests: &mut HashMap<String, Manifest>, m: Manifest) -> Result<(), String> {
    if manifests.contains_key(&m.name) {
        return Err(format!("duplicate manifest name: {}", m.name));
    }
    manifests.insert(m.name.clone(), m);
    Ok(())
}

fn load_manifest(dir: &Path) -> Result<Option<Manifest>, String> {
    let manifest_path = dir.join("manifest.json");
    if !manifest_path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&manifest_path).map_err(|e| e.to_string())?;
    let parsed: RawManifest = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    if parsed.name.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(Manifest {
        name: parsed.name,
        version: parsed.version,
        author: parsed.author,
        description: parsed.description,
        entry_point: parsed.entry_point.unwrap_or_else(|| "dist/index.js".to_string()),
        dependencies: parsed.dependencies,
        path: dir.to_path_buf(),
        multi_instance: parsed.multi_instance_spawning.unwrap_or(true),
    }))
}

pub struct LoadPlan {
    pub sorted: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Mark {
    Temporary,
    Permanent,
}

/// Depth-first topological sort. A temporary mark re-encountered on
/// the recursion stack is a cycle — fatal. An unresolved dependency marks
/// the dependent, and everything transitively depending on it, as
/// `skipped` rather than failing the whole boot — and `skipped`
/// is transitive).
pub fn topological_sort(scan: &Scan) -> AppResult<LoadPlan> {
    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut skipped: HashSet<String> = HashSet::new();
    let mut sorted: Vec<String> = Vec::new();

    let mut names: Vec<&String> = scan.manifests.keys().collect();
    names.sort();

    for name in names {
        visit(name, scan, &mut marks, &mut skipped, &mut sorted)?;
    }

    let mut skipped: Vec<String> = skipped.into_iter().collect();
    skipped.sort();
    Ok(LoadPlan { sorted, skipped })
}

fn visit(
    name: &str,
    scan: &Scan,
    marks: &mut HashMap<String, Mark>,
    skipped: &mut HashSet<String>,
    sorted: &mut Vec<String>,
) -> AppResult<bool> {
    if skipped.contains(name) {
        return Ok(false);
    }
    match marks.get(name) {
        Some(Mark::Permanent) => return Ok(true),
        Some(Mark::Temporary) => {
            return Err(AppError::BootFatal(format!(
                "circular dependency detected at module '{}'",
                name
            )));
        }
        None => {}
    }

    let manifest = match scan.manifests.get(name) {
        Some(m) => m,
        None => {
            return Err(AppError::BootFatal(format!(
                "manifest '{}' referenced by traversal was not found in scan",
                name
            )));
        }
    };

    marks.insert(name.to_string(), Mark::Temporary);

    let mut any_dep_skipped = false;
    for dep in &manifest.dependencies {
        if !scan.manifests.contains_key(dep) {
            tracing::warn!(module = %name, dependency = %dep, "unresolved dependency");
            any_dep_skipped = true;
            continue;
        }
        if !visit(dep, scan, marks, skipped, sorted)? {
            any_dep_skipped = true;
        }
    }

    if any_dep_skipped {
        skipped.insert(name.to_string());
        marks.insert(name.to_string(), Mark::Permanent);
        return Ok(false);
    }

    marks.insert(name.to_string(), Mark::Permanent);
    sorted.push(name.to_string());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_manifest(dir: &Path, name: &str, deps: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        let deps_json = deps
            .iter()
            .map(|d| format!("\"{}\"", d))
            .collect::<Vec<_>>()
            .join(",");
        fs::write(
            dir.join("manifest.json"),
            format!(r#"{{"name":"{}","dependencies":[{}]}}"#, name, deps_json),
        )
        .unwrap();
    }

    #[test]
    fn sorts_dependencies_before_dependents() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(&tmp.path().join("a"), "a", &[]);
        write_manifest(&tmp.path().join("b"), "b", &["a"]);
        let scan = scan(tmp.path()).unwrap();
        let plan = topological_sort(&scan).unwrap();
        assert_eq!(plan.sorted, vec!["a".to_string(), "b".to_string()]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn cycle_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(&tmp.path().join("a"), "a", &["b"]);
        write_manifest(&tmp.path().join("b"), "b", &["a"]);
        let scan = scan(tmp.path()).unwrap();
        assert!(topological_sort(&scan).is_err());
    }

    #[test]
    fn unresolved_dependency_is_skipped_transitively() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(&tmp.path().join("b"), "b", &["missing"]);
        write_manifest(&tmp.path().join("c"), "c", &["b"]);
        let scan = scan(tmp.path()).unwrap();
        let plan = topological_sort(&scan).unwrap();
        assert!(plan.sorted.is_empty());
        assert_eq!(plan.skipped, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn namespaced_modules_are_scanned() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(&tmp.path().join("@ns").join("foo"), "@ns/foo", &[]);
        let scan = scan(tmp.path()).unwrap();
        assert!(scan.manifests.contains_key("@ns/foo"));
    }
}
