//! Phase 4: two-pass upload against the target instance.
//!
//! The create pass walks the batch in topological order so every
//! dependency exists on the target before its dependents; the update
//! pass pushes the rewritten node trees once the id mapping is complete.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::domain::error::MigrationError;
use crate::domain::models::config::MigrationConfig;
use crate::domain::models::report::{PatchOutcome, UploadOutcome, WorkflowUploadResult};
use crate::domain::models::workflow::Workflow;
use crate::domain::ports::WorkflowApi;
use crate::infrastructure::api::types::WorkflowPayload;
use crate::services::id_mapper::IdMapper;

/// Behavior switches for the upload passes.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub dry_run: bool,
    pub skip_existing: bool,
    pub stop_on_error: bool,
    pub folder_tags: bool,
    /// Pacing between requests; a property of the loop, not per-call
    /// retry.
    pub inter_request_delay: Duration,
}

impl UploadOptions {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            dry_run: config.dry_run,
            skip_existing: config.skip_existing,
            stop_on_error: config.stop_on_error,
            folder_tags: config.folder_tags,
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
        }
    }
}

/// Drives the create and update passes.
pub struct UploadService {
    api: Arc<dyn WorkflowApi>,
    options: UploadOptions,
    cancel: Arc<AtomicBool>,
}

impl UploadService {
    pub fn new(api: Arc<dyn WorkflowApi>, options: UploadOptions, cancel: Arc<AtomicBool>) -> Self {
        Self {
            api,
            options,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    async fn pace(&self, index: usize) {
        if index > 0 && !self.options.inter_request_delay.is_zero() {
            sleep(self.options.inter_request_delay).await;
        }
    }

    /// Create pass: upload each workflow, in order, populating the
    /// mapper from the target's responses.
    ///
    /// Outcomes accumulate in `results` so a fatal error or cancellation
    /// still leaves the partial record for the report.
    pub async fn create_pass(
        &self,
        workflows: &[&Workflow],
        mapper: &mut IdMapper,
        results: &mut Vec<WorkflowUploadResult>,
    ) -> Result<(), MigrationError> {
        info!(
            total = workflows.len(),
            dry_run = self.options.dry_run,
            "create pass started"
        );

        for (index, workflow) in workflows.iter().enumerate() {
            if self.cancelled() {
                return Err(MigrationError::Cancelled);
            }
            self.pace(index).await;

            let outcome = self.create_one(workflow, mapper).await?;
            let failure = match &outcome {
                UploadOutcome::Failed { reason } => Some(reason.clone()),
                _ => None,
            };
            results.push(WorkflowUploadResult {
                name: workflow.name.clone(),
                old_id: workflow.id.clone(),
                outcome,
                patch: None,
                activated: None,
            });

            if self.options.stop_on_error {
                if let Some(reason) = failure {
                    return Err(MigrationError::Aborted {
                        workflow: workflow.name.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(())
    }

    async fn create_one(
        &self,
        workflow: &Workflow,
        mapper: &mut IdMapper,
    ) -> Result<UploadOutcome, MigrationError> {
        if self.options.skip_existing {
            match self.api.find_workflow_by_name(&workflow.name).await {
                Ok(Some(existing)) => {
                    mapper.record(&workflow.name, workflow.id.as_deref(), &existing.id)?;
                    info!(
                        workflow = %workflow.name,
                        existing_id = %existing.id,
                        "workflow already on target, skipping"
                    );
                    return Ok(UploadOutcome::SkippedExisting {
                        existing_id: existing.id,
                    });
                }
                Ok(None) => {}
                Err(err) if err.is_auth() => return Err(MigrationError::Api(err)),
                Err(err) => {
                    warn!(workflow = %workflow.name, error = %err, "existence probe failed");
                    return Ok(UploadOutcome::Failed {
                        reason: format!("existence probe failed: {err}"),
                    });
                }
            }
        }

        if self.options.dry_run {
            info!(workflow = %workflow.name, "dry run, create skipped");
            return Ok(UploadOutcome::DryRun);
        }

        // The node tree goes up as loaded: references still point at old
        // ids here and are repaired by the update pass.
        let payload = WorkflowPayload::from_workflow(workflow, self.options.folder_tags);
        match self.api.create_workflow(&payload).await {
            Ok(created) => {
                mapper.record(&workflow.name, workflow.id.as_deref(), &created.id)?;
                info!(
                    workflow = %workflow.name,
                    new_id = %created.id,
                    "workflow created"
                );
                Ok(UploadOutcome::Created { new_id: created.id })
            }
            Err(err) if err.is_auth() => Err(MigrationError::Api(err)),
            Err(err) => {
                warn!(workflow = %workflow.name, error = %err, "create failed");
                Ok(UploadOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Update pass: push each rewritten node tree to the workflow
    /// created for it. Runs in the same order and with the same pacing
    /// as the create pass; skipped entirely in dry runs.
    pub async fn update_pass(
        &self,
        rewritten: &[Workflow],
        mapper: &IdMapper,
        results: &mut [WorkflowUploadResult],
    ) -> Result<(), MigrationError> {
        info!(total = rewritten.len(), "update pass started");

        for (index, workflow) in rewritten.iter().enumerate() {
            if self.cancelled() {
                return Err(MigrationError::Cancelled);
            }
            self.pace(index).await;

            let Some(new_id) = mapper.by_name(&workflow.name) else {
                // Only workflows that went through the create pass are
                // handed to this pass.
                warn!(workflow = %workflow.name, "no mapping for update pass entry");
                continue;
            };

            let payload = WorkflowPayload::from_workflow(workflow, self.options.folder_tags);
            let patch = match self.api.update_workflow(new_id, &payload).await {
                Ok(_) => {
                    info!(workflow = %workflow.name, new_id = %new_id, "references patched");
                    PatchOutcome::Patched
                }
                Err(err) if err.is_auth() => return Err(MigrationError::Api(err)),
                Err(err) => {
                    warn!(workflow = %workflow.name, error = %err, "patch failed");
                    PatchOutcome::PatchFailed {
                        reason: err.to_string(),
                    }
                }
            };

            let failed = matches!(patch, PatchOutcome::PatchFailed { .. });
            if let Some(entry) = results.iter_mut().find(|r| r.name == workflow.name) {
                entry.patch = Some(patch);
            }
            if failed && self.options.stop_on_error {
                return Err(MigrationError::Aborted {
                    workflow: workflow.name.clone(),
                    reason: "update pass failed".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Re-activate workflows that were active on the source. Failures
    /// are warnings: a workflow that migrated but would not activate is
    /// still migrated.
    pub async fn activation_pass(
        &self,
        workflows: &[&Workflow],
        mapper: &IdMapper,
        results: &mut [WorkflowUploadResult],
    ) -> Result<(), MigrationError> {
        let active: Vec<&&Workflow> = workflows.iter().filter(|w| w.active).collect();
        info!(total = active.len(), "activation pass started");

        for (index, workflow) in active.iter().enumerate() {
            if self.cancelled() {
                return Err(MigrationError::Cancelled);
            }
            self.pace(index).await;

            let Some(new_id) = mapper.by_name(&workflow.name) else {
                continue;
            };

            let activated = match self.api.activate_workflow(new_id).await {
                Ok(()) => {
                    info!(workflow = %workflow.name, "workflow activated");
                    true
                }
                Err(err) if err.is_auth() => return Err(MigrationError::Api(err)),
                Err(err) => {
                    warn!(workflow = %workflow.name, error = %err, "activation failed");
                    false
                }
            };

            if let Some(entry) = results.iter_mut().find(|r| r.name == workflow.name) {
                entry.activated = Some(activated);
            }
        }

        Ok(())
    }
}
