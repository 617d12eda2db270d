//! Authenticated reqwest client for the target n8n REST API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, StatusCode, Url};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::models::config::{Credentials, TargetConfig, UpdateMethod};
use crate::domain::ports::WorkflowApi;

use super::error::{ApiError, RequestKind};
use super::rate_limiter::RateLimiter;
use super::retry::RetryPolicy;
use super::types::{RemoteWorkflow, WorkflowListResponse, WorkflowPayload};

/// Page size requested from list endpoints.
const LIST_PAGE_SIZE: &str = "100";

/// HTTP client for the target instance.
///
/// One instance is shared by the upload, update, and verification
/// phases; the rate limiter inside is the only mutable state and is
/// serialized behind a mutex. Constructed at startup, discarded at end
/// of run.
pub struct N8nApiClient {
    http: ReqwestClient,
    base_url: String,
    credentials: Credentials,
    api_key_header: String,
    update_method: UpdateMethod,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    retry_policy: RetryPolicy,
}

impl N8nApiClient {
    /// Build a client from the target configuration.
    ///
    /// Fails when the credential shape is incomplete or the HTTP client
    /// cannot be constructed.
    pub fn new(target: &TargetConfig, update_method: UpdateMethod) -> Result<Self> {
        let credentials = target
            .credentials()
            .ok_or_else(|| anyhow!("target credentials are incomplete: set api_key or username/password"))?;

        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(target.timeout_secs))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: target.base_url.trim_end_matches('/').to_string(),
            credentials,
            api_key_header: target.api_key_header.clone(),
            update_method,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::per_minute(
                target.rate_limit_per_minute,
            ))),
            retry_policy: RetryPolicy::from_config(&target.retry),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn url_with_params(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ApiError> {
        Url::parse_with_params(&self.endpoint(path), params)
            .map_err(|e| ApiError::Network(format!("invalid request URL: {e}")))
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Url::parse(&self.endpoint(path))
            .map_err(|e| ApiError::Network(format!("invalid request URL: {e}")))
    }

    /// Acquire a rate-limit token, then run one request through the
    /// retry policy. Returns the parsed response body, or `None` when
    /// the target replied with an empty body.
    async fn execute(
        &self,
        kind: RequestKind,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Option<Value>, ApiError> {
        self.rate_limiter.lock().await.acquire().await;
        self.retry_policy
            .execute(kind, || self.attempt(method.clone(), url.clone(), body.as_ref()))
            .await
    }

    async fn attempt(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        request = match &self.credentials {
            Credentials::ApiKey { key } => request.header(self.api_key_header.as_str(), key.as_str()),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        };

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, body, retry_after));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        if text.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    fn parse_body<T: serde::de::DeserializeOwned>(value: Option<Value>) -> Result<T, ApiError> {
        let value = value.ok_or_else(|| {
            ApiError::InvalidResponse("expected a response body, got none".to_string())
        })?;
        serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[async_trait]
impl WorkflowApi for N8nApiClient {
    async fn list_workflows(&self) -> Result<Vec<RemoteWorkflow>, ApiError> {
        let mut workflows = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let url = match &cursor {
                Some(c) => self.url_with_params(
                    "/workflows",
                    &[("limit", LIST_PAGE_SIZE), ("cursor", c.as_str())],
                )?,
                None => self.url_with_params("/workflows", &[("limit", LIST_PAGE_SIZE)])?,
            };

            let body = self
                .execute(RequestKind::Idempotent, Method::GET, url, None)
                .await?;
            let page: WorkflowListResponse = Self::parse_body(body)?;
            workflows.extend(page.data);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(workflows)
    }

    async fn find_workflow_by_name(&self, name: &str) -> Result<Option<RemoteWorkflow>, ApiError> {
        let url = self.url_with_params("/workflows", &[("name", name)])?;
        let body = self
            .execute(RequestKind::Idempotent, Method::GET, url, None)
            .await?;
        let page: WorkflowListResponse = Self::parse_body(body)?;
        // The filter is advisory on some target versions; match exactly.
        Ok(page.data.into_iter().find(|w| w.name == name))
    }

    async fn get_workflow(&self, id: &str) -> Result<RemoteWorkflow, ApiError> {
        let url = self.url(&format!("/workflows/{id}"))?;
        let body = self
            .execute(RequestKind::Idempotent, Method::GET, url, None)
            .await?;
        Self::parse_body(body)
    }

    async fn create_workflow(&self, payload: &WorkflowPayload) -> Result<RemoteWorkflow, ApiError> {
        let url = self.url("/workflows")?;
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let response = self
            .execute(RequestKind::Mutating, Method::POST, url, Some(body))
            .await?;
        Self::parse_body(response)
    }

    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, ApiError> {
        let url = self.url(&format!("/workflows/{id}"))?;
        let method = match self.update_method {
            UpdateMethod::Put => Method::PUT,
            UpdateMethod::Patch => Method::PATCH,
        };
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let response = self
            .execute(RequestKind::Mutating, method, url, Some(body))
            .await?;
        Self::parse_body(response)
    }

    async fn activate_workflow(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/workflows/{id}/activate"))?;
        self.execute(RequestKind::Mutating, Method::POST, url, None)
            .await?;
        Ok(())
    }
}
