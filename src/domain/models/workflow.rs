//! Workflow document model and reference-bearing node predicates.
//!
//! A workflow file is an opaque JSON document; the engine only interprets
//! the handful of fields it needs (`name`, `nodes`, `connections`,
//! `settings`, `tags`, `active`) and treats everything else as payload.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::domain::error::LoadError;

/// File extension of exported workflow documents.
pub const WORKFLOW_FILE_EXTENSION: &str = "json";

/// Node types that invoke another workflow.
///
/// Adding a future reference-bearing type is a one-line change here.
const REFERENCE_NODE_TYPES: [&str; 2] = [
    "n8n-nodes-base.executeWorkflow",
    "n8n-nodes-base.executeWorkflowTrigger",
];

/// Returns true when the node invokes another workflow.
pub fn is_workflow_reference_node(node: &Value) -> bool {
    node.get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| REFERENCE_NODE_TYPES.contains(&t))
}

/// A cross-workflow reference embedded in a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReference {
    /// The referenced workflow's id on the source instance.
    pub old_id: String,
    /// The referenced workflow's name, as cached at export time.
    /// Preferred over the id for cross-instance resolution.
    pub cached_result_name: Option<String>,
}

/// Workflow ids appear as strings in current exports and as bare numbers
/// in older ones.
fn id_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// References carried by reference-bearing nodes in a node tree.
///
/// Used both on loaded workflows and on node trees fetched back from a
/// target during verification.
pub fn references_in_nodes(nodes: &[Value]) -> Vec<WorkflowReference> {
    let mut out = Vec::new();
    for node in nodes {
        if is_workflow_reference_node(node) {
            collect_references(node, &mut out);
        }
    }
    out
}

/// Collect every `workflowId` reference object under `value`.
fn collect_references(value: &Value, out: &mut Vec<WorkflowReference>) {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("workflowId").and_then(parse_reference) {
                out.push(reference);
            }
            for child in map.values() {
                collect_references(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_references(child, out);
            }
        }
        _ => {}
    }
}

fn parse_reference(workflow_id: &Value) -> Option<WorkflowReference> {
    let map = workflow_id.as_object()?;
    let old_id = id_value_to_string(map.get("value")?)?;
    let cached_result_name = map
        .get("cachedResultName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some(WorkflowReference {
        old_id,
        cached_result_name,
    })
}

/// The unit of migration.
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Opaque id assigned by the source instance, when present in the export.
    pub id: Option<String>,
    /// Stable cross-instance key; unique within a migration batch.
    pub name: String,
    /// Node sequence, opaque except for reference-bearing nodes.
    pub nodes: Vec<Value>,
    /// Node wiring; opaque.
    pub connections: Value,
    /// Workflow settings; opaque.
    pub settings: Value,
    /// Tag names.
    pub tags: BTreeSet<String>,
    /// Whether the workflow was active on the source. Not migrated by
    /// default; see the `activate` option.
    pub active: bool,
    /// The file this workflow was loaded from.
    pub source_path: PathBuf,
    /// Immediate parent directory relative to the source root; used for
    /// default tagging.
    pub source_folder: String,
}

impl Workflow {
    /// Parse a workflow from its JSON document, validating the minimal
    /// shape the engine relies on.
    pub fn from_value(value: &Value, path: &Path, source_folder: &str) -> Result<Self, LoadError> {
        let map = value.as_object().ok_or_else(|| LoadError::SchemaError {
            path: path.to_path_buf(),
            field: "<document>".to_string(),
        })?;

        let name = map
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LoadError::SchemaError {
                path: path.to_path_buf(),
                field: "name".to_string(),
            })?
            .to_string();

        let nodes = map
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| LoadError::SchemaError {
                path: path.to_path_buf(),
                field: "nodes".to_string(),
            })?
            .clone();

        let id = map.get("id").and_then(id_value_to_string);
        let connections = map
            .get("connections")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let settings = map
            .get("settings")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let active = map.get("active").and_then(Value::as_bool).unwrap_or(false);
        let tags = parse_tags(map.get("tags"));

        Ok(Self {
            id,
            name,
            nodes,
            connections,
            settings,
            tags,
            active,
            source_path: path.to_path_buf(),
            source_folder: source_folder.to_string(),
        })
    }

    /// References carried by this workflow's reference-bearing nodes.
    pub fn references(&self) -> Vec<WorkflowReference> {
        references_in_nodes(&self.nodes)
    }

    /// Whether any node invokes another workflow.
    pub fn has_references(&self) -> bool {
        self.nodes.iter().any(is_workflow_reference_node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Exports carry tags either as plain strings or as `{id, name}` objects.
fn parse_tags(tags: Option<&Value>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    if let Some(Value::Array(items)) = tags {
        for item in items {
            match item {
                Value::String(s) if !s.is_empty() => {
                    out.insert(s.clone());
                }
                Value::Object(map) => {
                    if let Some(name) = map.get("name").and_then(Value::as_str) {
                        if !name.is_empty() {
                            out.insert(name.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }
    out
}
