//! Wire types for the target n8n REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::models::workflow::Workflow;

/// Response envelope for `GET /workflows`.
///
/// The pagination cursor is a property of the envelope, not of the
/// embedded list; reading it anywhere else terminates after one page.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowListResponse {
    #[serde(default)]
    pub data: Vec<RemoteWorkflow>,
    #[serde(default, rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// A workflow as the target returns it.
///
/// List responses omit the node tree; only `GET /workflows/{id}` carries
/// it, hence the `Option`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteWorkflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Value>>,
}

impl RemoteWorkflow {
    pub fn node_count(&self) -> Option<usize> {
        self.nodes.as_ref().map(Vec::len)
    }
}

/// The cleaned payload sent on create and update.
///
/// Only the fields the target accepts: the source id is never sent, the
/// target assigns its own. On create the node tree still carries old
/// reference ids; the update pass replaces it with the rewritten tree.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowPayload {
    pub name: String,
    pub nodes: Vec<Value>,
    pub connections: Value,
    pub settings: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl WorkflowPayload {
    /// Build the create/update payload from a loaded workflow.
    ///
    /// `folder_tag` appends the workflow's source folder to the tag set.
    pub fn from_workflow(workflow: &Workflow, folder_tag: bool) -> Self {
        let mut tags: Vec<String> = workflow.tags.iter().cloned().collect();
        if folder_tag
            && !workflow.source_folder.is_empty()
            && !tags.contains(&workflow.source_folder)
        {
            tags.push(workflow.source_folder.clone());
        }
        Self {
            name: workflow.name.clone(),
            nodes: workflow.nodes.clone(),
            connections: workflow.connections.clone(),
            settings: workflow.settings.clone(),
            tags: if tags.is_empty() { None } else { Some(tags) },
        }
    }
}
