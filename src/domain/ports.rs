//! Ports: interfaces the service layer depends on.
//!
//! The only port is the workflow API of the target instance; the
//! production implementation lives in [`crate::infrastructure::api`],
//! tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::infrastructure::api::types::{RemoteWorkflow, WorkflowPayload};
use crate::infrastructure::api::ApiError;

/// REST surface of the target n8n instance, as used by the engine.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// List every workflow on the target, following pagination cursors
    /// until exhausted.
    async fn list_workflows(&self) -> Result<Vec<RemoteWorkflow>, ApiError>;

    /// Find a workflow by exact name, or `None`.
    async fn find_workflow_by_name(&self, name: &str) -> Result<Option<RemoteWorkflow>, ApiError>;

    /// Fetch a single workflow, including its node tree.
    async fn get_workflow(&self, id: &str) -> Result<RemoteWorkflow, ApiError>;

    /// Create a workflow; the target assigns the id in the response.
    async fn create_workflow(&self, payload: &WorkflowPayload) -> Result<RemoteWorkflow, ApiError>;

    /// Replace a workflow's content (PUT or PATCH per configuration).
    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, ApiError>;

    /// Activate a workflow on the target.
    async fn activate_workflow(&self, id: &str) -> Result<(), ApiError>;
}
