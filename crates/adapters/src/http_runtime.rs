// SPDX-License-Identifier: MIT

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use wsc_core::{OpId, WorkspaceId};

use crate::runtime::{
    ArchiveResult, GcResult, ObserveAll, OpStatus, RestoreResult, Result, Runtime, RuntimeError,
};

/// HTTP client for the Runtime capability, carrying the API key as a bearer
/// token on every request.
pub struct HttpRuntime {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpRuntime {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, call_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| RuntimeError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized, R: serde::de::DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if response.status() == StatusCode::REQUEST_TIMEOUT {
            return Err(RuntimeError::Timeout);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Rejected(format!("{status}: {body}")));
        }

        response.json().await.map_err(|e| RuntimeError::Decode(e.to_string()))
    }

    async fn get<R: serde::de::DeserializeOwned>(&self, path: &str) -> Result<R> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Rejected(format!("{status}: {body}")));
        }

        response.json().await.map_err(|e| RuntimeError::Decode(e.to_string()))
    }
}

fn map_reqwest_err(err: reqwest::Error) -> RuntimeError {
    if err.is_timeout() {
        RuntimeError::Timeout
    } else {
        RuntimeError::Connection(err.to_string())
    }
}

#[derive(Serialize)]
struct StartContainerRequest<'a> {
    op_id: OpId,
    image_ref: &'a str,
}

#[derive(Serialize)]
struct OpRequest {
    op_id: OpId,
}

#[derive(Serialize)]
struct RestoreRequest<'a> {
    op_id: OpId,
    archive_key: &'a str,
}

#[derive(Serialize)]
struct GcRequest<'a> {
    protected: &'a [(WorkspaceId, OpId)],
}

#[async_trait]
impl Runtime for HttpRuntime {
    async fn observe_all(&self, prefix: &str) -> Result<ObserveAll> {
        self.get(&format!("/v1/observe?prefix={prefix}")).await
    }

    async fn start_container(&self, workspace_id: WorkspaceId, op_id: OpId, image_ref: &str) -> Result<OpStatus> {
        self.post(&format!("/v1/workspaces/{workspace_id}/container/start"), &StartContainerRequest { op_id, image_ref })
            .await
    }

    async fn stop_container(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus> {
        self.post(&format!("/v1/workspaces/{workspace_id}/container/stop"), &OpRequest { op_id }).await
    }

    async fn delete_container(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus> {
        self.post(&format!("/v1/workspaces/{workspace_id}/container/delete"), &OpRequest { op_id }).await
    }

    async fn create_volume(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus> {
        self.post(&format!("/v1/workspaces/{workspace_id}/volume/create"), &OpRequest { op_id }).await
    }

    async fn delete_volume(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus> {
        self.post(&format!("/v1/workspaces/{workspace_id}/volume/delete"), &OpRequest { op_id }).await
    }

    async fn run_archive(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<ArchiveResult> {
        self.post(&format!("/v1/workspaces/{workspace_id}/archive/run"), &OpRequest { op_id }).await
    }

    async fn run_restore(&self, workspace_id: WorkspaceId, op_id: OpId, archive_key: &str) -> Result<RestoreResult> {
        self.post(&format!("/v1/workspaces/{workspace_id}/restore/run"), &RestoreRequest { op_id, archive_key })
            .await
    }

    async fn run_gc(&self, protected: &[(WorkspaceId, OpId)]) -> Result<GcResult> {
        self.post("/v1/gc/run", &GcRequest { protected }).await
    }
}
