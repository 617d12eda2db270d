//! Phase 1: load workflow files from disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::error::LoadError;
use crate::domain::models::config::WorkflowFilter;
use crate::domain::models::workflow::{Workflow, WORKFLOW_FILE_EXTENSION};

/// Counters gathered while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Workflow files found under the source path.
    pub files_seen: usize,
    /// Workflows in the final batch.
    pub loaded: usize,
    /// Workflows dropped by the tag/name/id filters.
    pub filtered_out: usize,
    /// Batch size per source folder.
    pub by_folder: BTreeMap<String, usize>,
}

/// A validated, filtered workflow batch.
#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub workflows: Vec<Workflow>,
    pub stats: LoadStats,
}

/// Loads workflow documents from a file or directory tree.
///
/// Any parse or shape failure rejects the whole batch: a partially
/// readable export is not migrated.
#[derive(Debug, Clone, Default)]
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load, validate, and filter the batch under `source_path`.
    ///
    /// Files are processed in lexicographic path order so two runs over
    /// the same tree produce the same batch.
    pub fn load(
        &self,
        source_path: &Path,
        filter: &WorkflowFilter,
    ) -> Result<LoadedBatch, LoadError> {
        if !source_path.exists() {
            return Err(LoadError::FileNotFound(source_path.to_path_buf()));
        }

        let name_pattern = compile_name_filter(filter)?;
        let files = collect_workflow_files(source_path);
        let mut stats = LoadStats {
            files_seen: files.len(),
            ..LoadStats::default()
        };

        let mut workflows = Vec::with_capacity(files.len());
        for path in files {
            let workflow = load_one(&path, source_path)?;
            debug!(
                workflow = %workflow.name,
                path = %path.display(),
                nodes = workflow.node_count(),
                "loaded workflow file"
            );
            workflows.push(workflow);
        }

        // Filters apply after the whole tree validated.
        let workflows: Vec<Workflow> = workflows
            .into_iter()
            .filter(|wf| {
                let keep = matches_filter(wf, filter, name_pattern.as_ref());
                if !keep {
                    stats.filtered_out += 1;
                }
                keep
            })
            .collect();

        check_duplicate_names(&workflows)?;

        stats.loaded = workflows.len();
        for workflow in &workflows {
            *stats
                .by_folder
                .entry(workflow.source_folder.clone())
                .or_insert(0) += 1;
        }

        info!(
            files_seen = stats.files_seen,
            loaded = stats.loaded,
            filtered_out = stats.filtered_out,
            "workflow batch loaded"
        );

        Ok(LoadedBatch { workflows, stats })
    }
}

fn compile_name_filter(filter: &WorkflowFilter) -> Result<Option<Pattern>, LoadError> {
    match &filter.name_glob {
        Some(pattern) => Pattern::new(pattern).map(Some).map_err(|e| {
            LoadError::InvalidFilter {
                pattern: pattern.clone(),
                detail: e.to_string(),
            }
        }),
        None => Ok(None),
    }
}

/// Enumerate workflow files in lexicographic path order.
fn collect_workflow_files(source_path: &Path) -> Vec<PathBuf> {
    if source_path.is_file() {
        return vec![source_path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(source_path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(WORKFLOW_FILE_EXTENSION))
        })
        .collect();
    files.sort();
    files
}

fn load_one(path: &Path, source_path: &Path) -> Result<Workflow, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let value: Value = serde_json::from_str(&content).map_err(|e| LoadError::ParseError {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let folder = source_folder(path, source_path);
    Workflow::from_value(&value, path, &folder)
}

/// Immediate parent directory relative to the source root; empty for
/// files at the root itself or a single-file source.
fn source_folder(path: &Path, source_path: &Path) -> String {
    if source_path.is_file() {
        return String::new();
    }
    path.strip_prefix(source_path)
        .ok()
        .and_then(Path::parent)
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

fn matches_filter(workflow: &Workflow, filter: &WorkflowFilter, name: Option<&Pattern>) -> bool {
    if let Some(tag) = &filter.tag {
        if !workflow.tags.contains(tag) {
            return false;
        }
    }
    if let Some(pattern) = name {
        if !pattern.matches(&workflow.name) {
            return false;
        }
    }
    if !filter.ids.is_empty() {
        match &workflow.id {
            Some(id) => {
                if !filter.ids.contains(id) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

fn check_duplicate_names(workflows: &[Workflow]) -> Result<(), LoadError> {
    let mut seen: BTreeMap<&str, Vec<&Path>> = BTreeMap::new();
    for workflow in workflows {
        seen.entry(&workflow.name)
            .or_default()
            .push(&workflow.source_path);
    }
    for (name, paths) in seen {
        if paths.len() > 1 {
            return Err(LoadError::DuplicateName {
                name: name.to_string(),
                paths: paths.into_iter().map(Path::to_path_buf).collect(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_workflow(dir: &Path, rel: &str, doc: &Value) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, serde_json::to_string_pretty(doc).unwrap()).unwrap();
    }

    fn simple(name: &str) -> Value {
        json!({"id": format!("id-{name}"), "name": name, "nodes": []})
    }

    #[test]
    fn test_load_directory_in_path_order() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "b/second.json", &simple("B"));
        write_workflow(dir.path(), "a/first.json", &simple("A"));
        write_workflow(dir.path(), "root.json", &simple("R"));

        let batch = WorkflowLoader::new()
            .load(dir.path(), &WorkflowFilter::default())
            .unwrap();

        let names: Vec<&str> = batch.workflows.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "R"]);
        assert_eq!(batch.stats.files_seen, 3);
        assert_eq!(batch.stats.loaded, 3);
    }

    #[test]
    fn test_source_folder_relative_to_root() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "sales/deep/wf.json", &simple("A"));
        write_workflow(dir.path(), "top.json", &simple("B"));

        let batch = WorkflowLoader::new()
            .load(dir.path(), &WorkflowFilter::default())
            .unwrap();

        let by_name: BTreeMap<&str, &str> = batch
            .workflows
            .iter()
            .map(|w| (w.name.as_str(), w.source_folder.as_str()))
            .collect();
        assert_eq!(by_name["A"], "deep");
        assert_eq!(by_name["B"], "");
    }

    #[test]
    fn test_load_single_file() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "one.json", &simple("Solo"));

        let batch = WorkflowLoader::new()
            .load(&dir.path().join("one.json"), &WorkflowFilter::default())
            .unwrap();
        assert_eq!(batch.workflows.len(), 1);
        assert_eq!(batch.workflows[0].source_folder, "");
    }

    #[test]
    fn test_missing_path() {
        let err = WorkflowLoader::new()
            .load(Path::new("/nonexistent/flows"), &WorkflowFilter::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound(_)));
    }

    #[test]
    fn test_malformed_file_rejects_batch() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "good.json", &simple("Good"));
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let err = WorkflowLoader::new()
            .load(dir.path(), &WorkflowFilter::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::ParseError { .. }));
    }

    #[test]
    fn test_schema_failure_rejects_batch() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "noname.json", &json!({"nodes": []}));

        let err = WorkflowLoader::new()
            .load(dir.path(), &WorkflowFilter::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::SchemaError { field, .. } if field == "name"));
    }

    #[test]
    fn test_duplicate_names_abort() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "a/wf.json", &simple("Same"));
        write_workflow(dir.path(), "b/wf.json", &simple("Same"));

        let err = WorkflowLoader::new()
            .load(dir.path(), &WorkflowFilter::default())
            .unwrap_err();
        match err {
            LoadError::DuplicateName { name, paths } => {
                assert_eq!(name, "Same");
                assert_eq!(paths.len(), 2);
            }
            other => panic!("expected DuplicateName, got {other:?}"),
        }
    }

    #[test]
    fn test_tag_filter() {
        let dir = TempDir::new().unwrap();
        write_workflow(
            dir.path(),
            "a.json",
            &json!({"name": "A", "nodes": [], "tags": ["prod"]}),
        );
        write_workflow(dir.path(), "b.json", &simple("B"));

        let filter = WorkflowFilter {
            tag: Some("prod".to_string()),
            ..Default::default()
        };
        let batch = WorkflowLoader::new().load(dir.path(), &filter).unwrap();
        assert_eq!(batch.workflows.len(), 1);
        assert_eq!(batch.workflows[0].name, "A");
        assert_eq!(batch.stats.filtered_out, 1);
    }

    #[test]
    fn test_name_glob_filter() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "a.json", &simple("Order Sync"));
        write_workflow(dir.path(), "b.json", &simple("Invoice Sync"));
        write_workflow(dir.path(), "c.json", &simple("Cleanup"));

        let filter = WorkflowFilter {
            name_glob: Some("* Sync".to_string()),
            ..Default::default()
        };
        let batch = WorkflowLoader::new().load(dir.path(), &filter).unwrap();
        assert_eq!(batch.workflows.len(), 2);
    }

    #[test]
    fn test_invalid_glob() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "a.json", &simple("A"));

        let filter = WorkflowFilter {
            name_glob: Some("[".to_string()),
            ..Default::default()
        };
        let err = WorkflowLoader::new().load(dir.path(), &filter).unwrap_err();
        assert!(matches!(err, LoadError::InvalidFilter { .. }));
    }

    #[test]
    fn test_id_filter() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "a.json", &simple("A"));
        write_workflow(dir.path(), "b.json", &simple("B"));

        let filter = WorkflowFilter {
            ids: vec!["id-A".to_string()],
            ..Default::default()
        };
        let batch = WorkflowLoader::new().load(dir.path(), &filter).unwrap();
        assert_eq!(batch.workflows.len(), 1);
        assert_eq!(batch.workflows[0].name, "A");
    }

    #[test]
    fn test_non_json_files_ignored() {
        let dir = TempDir::new().unwrap();
        write_workflow(dir.path(), "a.json", &simple("A"));
        fs::write(dir.path().join("README.md"), "# docs").unwrap();

        let batch = WorkflowLoader::new()
            .load(dir.path(), &WorkflowFilter::default())
            .unwrap();
        assert_eq!(batch.stats.files_seen, 1);
    }
}
