//! Phase 6: post-migration integrity verification.
//!
//! Re-fetches state from the target and asserts four invariants:
//! every name exists (C1), every name has a mapping (C2), every
//! migrated reference points at a live target id (C3), and node counts
//! match the source documents (C4).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::domain::error::MigrationError;
use crate::domain::models::report::{VerificationCheck, VerificationIssue, VerificationResult};
use crate::domain::models::workflow::{references_in_nodes, Workflow};
use crate::domain::ports::WorkflowApi;
use crate::services::id_mapper::IdMapper;

/// Runs the four integrity checks against the live target.
pub struct Verifier {
    api: Arc<dyn WorkflowApi>,
    cancel: Arc<AtomicBool>,
}

impl Verifier {
    pub fn new(api: Arc<dyn WorkflowApi>, cancel: Arc<AtomicBool>) -> Self {
        Self { api, cancel }
    }

    fn check_cancelled(&self) -> Result<(), MigrationError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(MigrationError::Cancelled);
        }
        Ok(())
    }

    pub async fn verify(
        &self,
        originals: &[Workflow],
        mapper: &IdMapper,
    ) -> Result<VerificationResult, MigrationError> {
        info!(workflows = originals.len(), "verification started");

        let remote = self.api.list_workflows().await.map_err(MigrationError::Api)?;
        let remote_names: HashSet<&str> = remote.iter().map(|w| w.name.as_str()).collect();
        let remote_ids: HashSet<&str> = remote.iter().map(|w| w.id.as_str()).collect();

        let mut checks = Vec::with_capacity(4);

        // C1: every migrated name exists on the target.
        let mut issues = Vec::new();
        for workflow in originals {
            if !remote_names.contains(workflow.name.as_str()) {
                issues.push(VerificationIssue::error(
                    Some(workflow.name.clone()),
                    "workflow not found on target",
                ));
            }
        }
        checks.push(VerificationCheck::new("count", issues));
        self.check_cancelled()?;

        // C2: the mapper knows a new id for every original.
        let mut issues = Vec::new();
        for workflow in originals {
            if mapper.by_name(&workflow.name).is_none() {
                issues.push(VerificationIssue::error(
                    Some(workflow.name.clone()),
                    "no id mapping recorded; the create pass dropped this workflow",
                ));
            }
        }
        checks.push(VerificationCheck::new("creation_completeness", issues));
        self.check_cancelled()?;

        // Fetch each mapped workflow once; C3 and C4 both need the node
        // trees as the target stores them.
        let mut fetched: HashMap<&str, Option<Vec<Value>>> = HashMap::new();
        for workflow in originals {
            if let Some(new_id) = mapper.by_name(&workflow.name) {
                match self.api.get_workflow(new_id).await {
                    Ok(remote_workflow) => {
                        fetched.insert(workflow.name.as_str(), remote_workflow.nodes);
                    }
                    Err(err) if err.is_auth() => return Err(MigrationError::Api(err)),
                    Err(_) => {
                        fetched.insert(workflow.name.as_str(), None);
                    }
                }
            }
        }

        // C3: every reference on the target resolves to a live id.
        let mut issues = Vec::new();
        for workflow in originals.iter().filter(|w| w.has_references()) {
            match fetched.get(workflow.name.as_str()) {
                Some(Some(nodes)) => {
                    for reference in references_in_nodes(nodes) {
                        if !remote_ids.contains(reference.old_id.as_str()) {
                            issues.push(VerificationIssue::error(
                                Some(workflow.name.clone()),
                                format!(
                                    "reference to '{}' points at id '{}' which does not exist on the target",
                                    reference.cached_result_name.as_deref().unwrap_or("?"),
                                    reference.old_id
                                ),
                            ));
                        }
                    }
                }
                Some(None) => issues.push(VerificationIssue::error(
                    Some(workflow.name.clone()),
                    "could not fetch workflow from target to inspect references",
                )),
                None => {
                    // No mapping; already reported by C2.
                }
            }
        }
        checks.push(VerificationCheck::new("reference_integrity", issues));
        self.check_cancelled()?;

        // C4: node counts survived the round trip.
        let mut issues = Vec::new();
        for workflow in originals {
            match fetched.get(workflow.name.as_str()) {
                Some(Some(nodes)) => {
                    if nodes.len() != workflow.node_count() {
                        issues.push(VerificationIssue::error(
                            Some(workflow.name.clone()),
                            format!(
                                "node count mismatch: source has {}, target has {}",
                                workflow.node_count(),
                                nodes.len()
                            ),
                        ));
                    }
                }
                Some(None) => issues.push(VerificationIssue::warning(
                    Some(workflow.name.clone()),
                    "target did not return a node tree",
                )),
                None => {}
            }
        }
        checks.push(VerificationCheck::new("node_integrity", issues));

        let passed = checks.iter().all(|c| c.passed);
        let failed_names: Vec<&str> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect();
        let summary = if passed {
            format!("all {} checks passed", checks.len())
        } else {
            format!("failed checks: {}", failed_names.join(", "))
        };

        info!(passed, summary = %summary, "verification finished");
        Ok(VerificationResult {
            passed,
            checks,
            summary,
        })
    }
}
