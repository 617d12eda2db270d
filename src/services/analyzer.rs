//! Phase 2: build the reference graph and the upload order.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::error::AnalysisError;
use crate::domain::models::graph::WorkflowGraph;
use crate::domain::models::report::MissingTarget;
use crate::domain::models::workflow::Workflow;

/// Everything the analysis pass produces.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub graph: WorkflowGraph,
    /// Upload order: dependencies first, cycle participants appended.
    pub order: Vec<String>,
    pub cycles: Vec<Vec<String>>,
    /// References whose target is not in the batch. Non-fatal unless
    /// strict mode is on.
    pub missing_targets: Vec<MissingTarget>,
}

impl Analysis {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Builds the dependency graph from a workflow batch.
///
/// A reference resolves to its target by `cachedResultName` first (the
/// name survives id churn across instances), falling back to the old id.
#[derive(Debug, Clone, Default)]
pub struct DependencyAnalyzer {
    strict: bool,
}

impl DependencyAnalyzer {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn analyze(&self, workflows: &[Workflow]) -> Result<Analysis, AnalysisError> {
        let name_index: HashMap<&str, &Workflow> =
            workflows.iter().map(|w| (w.name.as_str(), w)).collect();
        let id_index: HashMap<&str, &Workflow> = workflows
            .iter()
            .filter_map(|w| w.id.as_deref().map(|id| (id, w)))
            .collect();

        let mut graph = WorkflowGraph::new();
        for workflow in workflows {
            graph.add_node(&workflow.name);
        }

        let mut missing_targets = Vec::new();
        for workflow in workflows {
            for reference in workflow.references() {
                let target = reference
                    .cached_result_name
                    .as_deref()
                    .and_then(|name| name_index.get(name))
                    .or_else(|| id_index.get(reference.old_id.as_str()));

                match target {
                    Some(target) => {
                        debug!(
                            source = %workflow.name,
                            target = %target.name,
                            "reference edge"
                        );
                        graph.add_edge(&workflow.name, &target.name);
                    }
                    None => {
                        if self.strict {
                            return Err(AnalysisError::MissingTarget {
                                workflow: workflow.name.clone(),
                                hint: reference.cached_result_name.clone(),
                                old_id: Some(reference.old_id.clone()),
                            });
                        }
                        warn!(
                            workflow = %workflow.name,
                            hint = ?reference.cached_result_name,
                            old_id = %reference.old_id,
                            "reference target is not in the batch"
                        );
                        missing_targets.push(MissingTarget {
                            workflow: workflow.name.clone(),
                            hint: reference.cached_result_name.clone(),
                            old_id: Some(reference.old_id.clone()),
                        });
                    }
                }
            }
        }

        let topo = graph.topological_order();
        if topo.order.len() != graph.node_count() {
            // The ordering pass must account for every node.
            return Err(AnalysisError::Internal(format!(
                "ordering covered {} of {} workflows",
                topo.order.len(),
                graph.node_count()
            )));
        }

        for cycle in &topo.cycles {
            warn!(cycle = ?cycle, "reference cycle detected; upload order within it is best-effort");
        }

        Ok(Analysis {
            graph,
            order: topo.order,
            cycles: topo.cycles,
            missing_targets,
        })
    }
}
