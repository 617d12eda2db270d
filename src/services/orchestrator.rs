//! Linear phase driver: load, analyze, upload, rewrite, patch, verify,
//! report.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::error::MigrationError;
use crate::domain::models::config::MigrationConfig;
use crate::domain::models::report::{
    GraphReport, MigrationReport, UploadReport, UploadStatistics, VerificationResult,
    WorkflowUploadResult,
};
use crate::domain::models::workflow::Workflow;
use crate::domain::ports::WorkflowApi;
use crate::services::analyzer::{Analysis, DependencyAnalyzer};
use crate::services::id_mapper::IdMapper;
use crate::services::loader::{LoadedBatch, WorkflowLoader};
use crate::services::reference_updater::ReferenceUpdater;
use crate::services::uploader::{UploadOptions, UploadService};
use crate::services::verifier::Verifier;

/// Phases 1 and 2, run ahead of any write so callers can inspect the
/// graph (and confirm cycle uploads) before the engine touches the
/// target.
#[derive(Debug, Clone)]
pub struct PreparedMigration {
    pub batch: LoadedBatch,
    pub analysis: Analysis,
}

impl PreparedMigration {
    /// The batch in upload order.
    pub fn ordered_workflows(&self) -> Vec<&Workflow> {
        self.analysis
            .order
            .iter()
            .filter_map(|name| self.batch.workflows.iter().find(|w| &w.name == name))
            .collect()
    }
}

/// Owns the workflow set, graph, mapper, and report for one run.
pub struct MigrationOrchestrator {
    config: MigrationConfig,
    api: Arc<dyn WorkflowApi>,
    cancel: Arc<AtomicBool>,
    report_dir: PathBuf,
}

impl MigrationOrchestrator {
    pub fn new(config: MigrationConfig, api: Arc<dyn WorkflowApi>) -> Self {
        Self {
            config,
            api,
            cancel: Arc::new(AtomicBool::new(false)),
            report_dir: PathBuf::from("."),
        }
    }

    /// Install a cooperative cancellation flag; checked between
    /// workflows and between verification checks.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Directory the report file is written into. Defaults to the
    /// working directory.
    pub fn with_report_dir(mut self, dir: PathBuf) -> Self {
        self.report_dir = dir;
        self
    }

    /// Run phases 1 and 2 only.
    pub fn prepare(&self) -> Result<PreparedMigration, MigrationError> {
        info!(source = %self.config.source_path.display(), "phase 1: loading workflows");
        let batch = WorkflowLoader::new().load(&self.config.source_path, &self.config.filter)?;

        info!(workflows = batch.workflows.len(), "phase 2: dependency analysis");
        let analysis = DependencyAnalyzer::new(self.config.strict).analyze(&batch.workflows)?;

        Ok(PreparedMigration { batch, analysis })
    }

    /// The single entry point: run the whole pipeline and return the
    /// report. Equivalent to `prepare` followed by `run`.
    pub async fn migrate(&self) -> Result<MigrationReport, MigrationError> {
        let prepared = self.prepare()?;
        self.run(prepared).await
    }

    /// Run phases 4 through 6 over an already-prepared batch, then
    /// build and persist the report.
    ///
    /// The report is written even when a phase fails mid-run: the
    /// partial mapper and outcomes are the audit trail for whatever did
    /// reach the target.
    pub async fn run(&self, prepared: PreparedMigration) -> Result<MigrationReport, MigrationError> {
        let started = Instant::now();
        let timestamp = Utc::now();

        let uploader = UploadService::new(
            Arc::clone(&self.api),
            UploadOptions::from_config(&self.config),
            Arc::clone(&self.cancel),
        );

        let mut mapper = IdMapper::new();
        let mut results: Vec<WorkflowUploadResult> = Vec::new();

        let phase_result = self
            .run_phases(&prepared, &uploader, &mut mapper, &mut results)
            .await;

        let report = MigrationReport {
            run_id: Uuid::new_v4(),
            timestamp,
            config: self.config.redacted(),
            duration_ms: started.elapsed().as_millis() as u64,
            upload: UploadReport {
                statistics: UploadStatistics::from_outcomes(&results),
                outcomes: results,
            },
            mappings: mapper.records().to_vec(),
            graph: GraphReport {
                nodes: prepared.analysis.graph.names().to_vec(),
                edges: prepared.analysis.graph.edges(),
                stats: prepared.analysis.graph.stats(),
                cycles: prepared.analysis.cycles.clone(),
                missing_targets: prepared.analysis.missing_targets.clone(),
            },
            verification: match &phase_result {
                Ok(verification) => verification.clone(),
                Err(_) => None,
            },
        };

        if self.config.save_report {
            match report.write_to(&self.report_dir) {
                Ok(path) => info!(path = %path.display(), "migration report written"),
                Err(write_err) => {
                    // A phase error takes precedence; losing the report
                    // on top of it is only worth a warning.
                    if phase_result.is_err() {
                        warn!(error = %write_err, "failed to write migration report");
                    } else {
                        return Err(write_err);
                    }
                }
            }
        }

        phase_result.map(|_| report)
    }

    async fn run_phases(
        &self,
        prepared: &PreparedMigration,
        uploader: &UploadService,
        mapper: &mut IdMapper,
        results: &mut Vec<WorkflowUploadResult>,
    ) -> Result<Option<VerificationResult>, MigrationError> {
        let ordered = prepared.ordered_workflows();

        info!(workflows = ordered.len(), "phase 4a: create pass");
        uploader.create_pass(&ordered, mapper, results).await?;

        if self.config.dry_run {
            info!("dry run: update pass and verification skipped");
            return Ok(None);
        }

        let created: Vec<Workflow> = ordered
            .iter()
            .filter(|workflow| {
                results
                    .iter()
                    .any(|r| r.name == workflow.name && r.outcome.is_created())
            })
            .map(|workflow| (*workflow).clone())
            .collect();

        info!(workflows = created.len(), "phase 5: rewriting references");
        let (rewritten, stats) = ReferenceUpdater::new().rewrite_batch(&created, mapper)?;
        info!(
            rewrites = stats.total_rewrites,
            by_name = stats.by_name,
            degraded = stats.by_old_id,
            broken = stats.broken.len(),
            "references rewritten"
        );
        for broken in &stats.broken {
            warn!(
                workflow = %broken.workflow,
                hint = ?broken.hint,
                old_id = %broken.old_id,
                "reference could not be resolved and was left pointing at the old id"
            );
        }

        info!(workflows = rewritten.len(), "phase 4b: update pass");
        uploader.update_pass(&rewritten, mapper, results).await?;

        if self.config.activate {
            info!("activation pass");
            uploader.activation_pass(&ordered, mapper, results).await?;
        }

        if !self.config.verify {
            info!("verification disabled, skipping");
            return Ok(None);
        }

        info!("phase 6: verification");
        let verifier = Verifier::new(Arc::clone(&self.api), Arc::clone(&self.cancel));
        let verification = verifier.verify(&prepared.batch.workflows, mapper).await?;
        Ok(Some(verification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{TargetConfig, WorkflowFilter};
    use crate::infrastructure::api::types::{RemoteWorkflow, WorkflowPayload};
    use crate::infrastructure::api::ApiError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// A fake target that behaves like a small n8n instance.
    #[derive(Default)]
    struct FakeInstance {
        workflows: Mutex<Vec<RemoteWorkflow>>,
        posts: Mutex<usize>,
        puts: Mutex<usize>,
    }

    #[async_trait]
    impl WorkflowApi for FakeInstance {
        async fn list_workflows(&self) -> Result<Vec<RemoteWorkflow>, ApiError> {
            Ok(self.workflows.lock().unwrap().clone())
        }

        async fn find_workflow_by_name(
            &self,
            name: &str,
        ) -> Result<Option<RemoteWorkflow>, ApiError> {
            Ok(self
                .workflows
                .lock()
                .unwrap()
                .iter()
                .find(|w| w.name == name)
                .cloned())
        }

        async fn get_workflow(&self, id: &str) -> Result<RemoteWorkflow, ApiError> {
            self.workflows
                .lock()
                .unwrap()
                .iter()
                .find(|w| w.id == id)
                .cloned()
                .ok_or(ApiError::Remote {
                    status: 404,
                    body: "not found".to_string(),
                })
        }

        async fn create_workflow(
            &self,
            payload: &WorkflowPayload,
        ) -> Result<RemoteWorkflow, ApiError> {
            let mut workflows = self.workflows.lock().unwrap();
            *self.posts.lock().unwrap() += 1;
            let created = RemoteWorkflow {
                id: format!("new-{}", workflows.len() + 1),
                name: payload.name.clone(),
                active: false,
                nodes: Some(payload.nodes.clone()),
            };
            workflows.push(created.clone());
            Ok(created)
        }

        async fn update_workflow(
            &self,
            id: &str,
            payload: &WorkflowPayload,
        ) -> Result<RemoteWorkflow, ApiError> {
            *self.puts.lock().unwrap() += 1;
            let mut workflows = self.workflows.lock().unwrap();
            let workflow = workflows
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or(ApiError::Remote {
                    status: 404,
                    body: "not found".to_string(),
                })?;
            workflow.nodes = Some(payload.nodes.clone());
            Ok(workflow.clone())
        }

        async fn activate_workflow(&self, _id: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn write_workflow(dir: &TempDir, file: &str, doc: &Value) {
        fs::write(
            dir.path().join(file),
            serde_json::to_string_pretty(doc).unwrap(),
        )
        .unwrap();
    }

    fn config(dir: &TempDir) -> MigrationConfig {
        MigrationConfig {
            source_path: dir.path().to_path_buf(),
            target: TargetConfig {
                base_url: "http://fake".to_string(),
                api_key: Some("k".to_string()),
                ..Default::default()
            },
            inter_request_delay_ms: 0,
            filter: WorkflowFilter::default(),
            ..Default::default()
        }
    }

    fn chain_fixtures(dir: &TempDir) {
        write_workflow(
            dir,
            "a.json",
            &json!({
                "id": "a-old",
                "name": "A",
                "nodes": [{
                    "type": "n8n-nodes-base.executeWorkflow",
                    "parameters": {"workflowId": {
                        "value": "b-old",
                        "cachedResultName": "B"
                    }}
                }]
            }),
        );
        write_workflow(dir, "b.json", &json!({"id": "b-old", "name": "B", "nodes": []}));
    }

    #[tokio::test]
    async fn test_two_workflow_chain_end_to_end() {
        let source = TempDir::new().unwrap();
        let report_dir = TempDir::new().unwrap();
        chain_fixtures(&source);

        let api = Arc::new(FakeInstance::default());
        let orchestrator = MigrationOrchestrator::new(config(&source), api.clone())
            .with_report_dir(report_dir.path().to_path_buf());

        let report = orchestrator.migrate().await.unwrap();

        // B uploads before A; both mapped; A's reference rewritten.
        assert_eq!(report.upload.statistics.succeeded, 2);
        assert_eq!(report.mappings[0].name, "B");
        assert_eq!(report.mappings[1].name, "A");

        let verification = report.verification.unwrap();
        assert!(verification.passed, "{}", verification.summary);

        let target = api.workflows.lock().unwrap();
        let a = target.iter().find(|w| w.name == "A").unwrap();
        let b = target.iter().find(|w| w.name == "B").unwrap();
        let reference = &a.nodes.as_ref().unwrap()[0]["parameters"]["workflowId"]["value"];
        assert_eq!(reference, &json!(b.id.clone()));
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_writes() {
        let source = TempDir::new().unwrap();
        let report_dir = TempDir::new().unwrap();
        chain_fixtures(&source);

        let api = Arc::new(FakeInstance::default());
        let mut cfg = config(&source);
        cfg.dry_run = true;
        let orchestrator = MigrationOrchestrator::new(cfg, api.clone())
            .with_report_dir(report_dir.path().to_path_buf());

        let report = orchestrator.migrate().await.unwrap();

        assert_eq!(*api.posts.lock().unwrap(), 0);
        assert_eq!(*api.puts.lock().unwrap(), 0);
        assert_eq!(report.upload.statistics.attempted, 2);
        assert_eq!(report.upload.statistics.succeeded, 0);
        assert!(report.verification.is_none());
        assert!(report.mappings.is_empty());
    }

    #[tokio::test]
    async fn test_report_file_persisted() {
        let source = TempDir::new().unwrap();
        let report_dir = TempDir::new().unwrap();
        chain_fixtures(&source);

        let api = Arc::new(FakeInstance::default());
        let orchestrator = MigrationOrchestrator::new(config(&source), api)
            .with_report_dir(report_dir.path().to_path_buf());

        let report = orchestrator.migrate().await.unwrap();
        let path = report_dir.path().join(report.file_name());
        assert!(path.exists());

        let parsed: MigrationReport =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.upload.statistics.succeeded, 2);
        // Secrets never reach the report file.
        assert_eq!(parsed.config.target.api_key.as_deref(), Some("***"));
    }

    #[tokio::test]
    async fn test_no_report_when_disabled() {
        let source = TempDir::new().unwrap();
        let report_dir = TempDir::new().unwrap();
        chain_fixtures(&source);

        let api = Arc::new(FakeInstance::default());
        let mut cfg = config(&source);
        cfg.save_report = false;
        let orchestrator = MigrationOrchestrator::new(cfg, api)
            .with_report_dir(report_dir.path().to_path_buf());

        orchestrator.migrate().await.unwrap();
        let entries: Vec<_> = fs::read_dir(report_dir.path()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_skip_existing_is_idempotent() {
        let source = TempDir::new().unwrap();
        chain_fixtures(&source);

        let api = Arc::new(FakeInstance::default());
        let mut cfg = config(&source);
        cfg.skip_existing = true;
        cfg.save_report = false;

        let first = MigrationOrchestrator::new(cfg.clone(), api.clone())
            .migrate()
            .await
            .unwrap();
        let second = MigrationOrchestrator::new(cfg, api.clone())
            .migrate()
            .await
            .unwrap();

        // The second run recreates nothing and resolves to the same ids.
        assert_eq!(second.upload.statistics.succeeded, 0);
        assert_eq!(second.upload.statistics.skipped, 2);
        for mapping in &first.mappings {
            let repeat = second
                .mappings
                .iter()
                .find(|m| m.name == mapping.name)
                .unwrap();
            assert_eq!(repeat.new_id, mapping.new_id);
        }
        assert_eq!(*api.posts.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_prepare_exposes_cycles_before_upload() {
        let source = TempDir::new().unwrap();
        let report_dir = TempDir::new().unwrap();
        write_workflow(
            &source,
            "a.json",
            &json!({
                "id": "a-old", "name": "A",
                "nodes": [{
                    "type": "n8n-nodes-base.executeWorkflow",
                    "parameters": {"workflowId": {"value": "b-old", "cachedResultName": "B"}}
                }]
            }),
        );
        write_workflow(
            &source,
            "b.json",
            &json!({
                "id": "b-old", "name": "B",
                "nodes": [{
                    "type": "n8n-nodes-base.executeWorkflow",
                    "parameters": {"workflowId": {"value": "a-old", "cachedResultName": "A"}}
                }]
            }),
        );

        let api = Arc::new(FakeInstance::default());
        let orchestrator = MigrationOrchestrator::new(config(&source), api)
            .with_report_dir(report_dir.path().to_path_buf());

        let prepared = orchestrator.prepare().unwrap();
        assert_eq!(
            prepared.analysis.cycles,
            vec![vec!["A".to_string(), "B".to_string()]]
        );

        // Upload proceeds anyway. The patch pass runs after both
        // creates, so even cyclic references end up repaired.
        let report = orchestrator.run(prepared).await.unwrap();
        assert_eq!(report.upload.statistics.succeeded, 2);
        assert!(report.verification.unwrap().passed);
    }
}
