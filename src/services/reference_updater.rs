//! Phase 5: rewrite embedded references to target-instance ids.

use serde_json::Value;
use tracing::debug;

use crate::domain::error::RewriteError;
use crate::domain::models::workflow::Workflow;
use crate::services::id_mapper::{IdMapper, ResolutionSource};

/// Recursion ceiling for node trees. Exceeding it means malformed input.
pub const MAX_DOCUMENT_DEPTH: usize = 50;

/// A reference the mapper could not resolve. Left untouched in the
/// document; surfaces again as a verification failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenReference {
    pub workflow: String,
    pub hint: Option<String>,
    pub old_id: String,
}

/// Counters for one rewrite (or a whole batch).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub total_rewrites: usize,
    /// Rewrites resolved through the name index.
    pub by_name: usize,
    /// Degraded rewrites resolved through the old id.
    pub by_old_id: usize,
    pub broken: Vec<BrokenReference>,
    pub max_depth_seen: usize,
}

impl RewriteStats {
    pub fn merge(&mut self, other: RewriteStats) {
        self.total_rewrites += other.total_rewrites;
        self.by_name += other.by_name;
        self.by_old_id += other.by_old_id;
        self.broken.extend(other.broken);
        self.max_depth_seen = self.max_depth_seen.max(other.max_depth_seen);
    }
}

/// Rewrites every embedded `workflowId` reference in a workflow's node
/// tree to the id the target assigned, name-first.
///
/// Shape-based, deliberately broader than the analyzer's type check: any
/// object carrying a `workflowId: { value }` pair is rewritten wherever
/// it sits in the tree.
#[derive(Debug, Clone)]
pub struct ReferenceUpdater {
    max_depth: usize,
}

impl Default for ReferenceUpdater {
    fn default() -> Self {
        Self {
            max_depth: MAX_DOCUMENT_DEPTH,
        }
    }
}

impl ReferenceUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Produce a rewritten deep copy of `workflow`; the input is never
    /// mutated. A workflow without references comes back identical.
    pub fn rewrite(
        &self,
        workflow: &Workflow,
        mapper: &IdMapper,
    ) -> Result<(Workflow, RewriteStats), RewriteError> {
        let mut rewritten = workflow.clone();
        let mut stats = RewriteStats::default();

        for node in &mut rewritten.nodes {
            self.visit(node, 1, &workflow.name, mapper, &mut stats)?;
        }

        debug!(
            workflow = %workflow.name,
            rewrites = stats.total_rewrites,
            degraded = stats.by_old_id,
            broken = stats.broken.len(),
            "references rewritten"
        );

        Ok((rewritten, stats))
    }

    /// Rewrite a whole batch, aggregating statistics.
    pub fn rewrite_batch(
        &self,
        workflows: &[Workflow],
        mapper: &IdMapper,
    ) -> Result<(Vec<Workflow>, RewriteStats), RewriteError> {
        let mut rewritten = Vec::with_capacity(workflows.len());
        let mut stats = RewriteStats::default();
        for workflow in workflows {
            let (workflow, workflow_stats) = self.rewrite(workflow, mapper)?;
            stats.merge(workflow_stats);
            rewritten.push(workflow);
        }
        Ok((rewritten, stats))
    }

    /// Recursive descent over a JSON value.
    ///
    /// `serde_json` values are trees, so a depth ceiling is the only
    /// guard the recursion needs; shared or cyclic subobjects cannot be
    /// expressed in the parsed document.
    fn visit(
        &self,
        value: &mut Value,
        depth: usize,
        workflow_name: &str,
        mapper: &IdMapper,
        stats: &mut RewriteStats,
    ) -> Result<(), RewriteError> {
        if depth > self.max_depth {
            return Err(RewriteError::DepthExceeded {
                workflow: workflow_name.to_string(),
                max_depth: self.max_depth,
            });
        }
        stats.max_depth_seen = stats.max_depth_seen.max(depth);

        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get_mut("workflowId") {
                    rewrite_reference(reference, workflow_name, mapper, stats);
                }
                for child in map.values_mut() {
                    self.visit(child, depth + 1, workflow_name, mapper, stats)?;
                }
            }
            Value::Array(items) => {
                for child in items.iter_mut() {
                    self.visit(child, depth + 1, workflow_name, mapper, stats)?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Rewrite one `workflowId` object in place, when it has the expected
/// `{ value, cachedResultName?, mode? }` shape.
fn rewrite_reference(
    reference: &mut Value,
    workflow_name: &str,
    mapper: &IdMapper,
    stats: &mut RewriteStats,
) {
    let Some(map) = reference.as_object_mut() else {
        return;
    };
    let Some(old_id) = map.get("value").and_then(id_to_string) else {
        return;
    };
    let hint = map
        .get("cachedResultName")
        .and_then(Value::as_str)
        .map(str::to_string);

    let (new_id, source) = mapper.resolve(hint.as_deref(), &old_id);
    match (new_id, source) {
        (Some(new_id), ResolutionSource::Name) => {
            map.insert("value".to_string(), Value::String(new_id.to_string()));
            stats.total_rewrites += 1;
            stats.by_name += 1;
        }
        (Some(new_id), ResolutionSource::OldId) => {
            map.insert("value".to_string(), Value::String(new_id.to_string()));
            stats.total_rewrites += 1;
            stats.by_old_id += 1;
        }
        _ => {
            stats.broken.push(BrokenReference {
                workflow: workflow_name.to_string(),
                hint,
                old_id,
            });
        }
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
