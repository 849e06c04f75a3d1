// SPDX-License-Identifier: MIT

//! The `Runtime` capability: the single remote surface WC, OB and GC call
//! into for every side effect on containers, volumes and archives. All nine
//! operations are idempotent on `(workspace_id, op_id)` — a crashed WC
//! leader's successor re-invokes the same call and gets back either the
//! in-progress status or the completed result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wsc_core::{OpId, WorkspaceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub workspace_id: WorkspaceId,
    pub running: bool,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub workspace_id: WorkspaceId,
    pub exists: bool,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub workspace_id: WorkspaceId,
    pub archive_key: Option<String>,
    pub exists: bool,
    pub reason: String,
    pub message: String,
}

/// Bulk snapshot returned by [`Runtime::observe_all`], one entry per
/// workspace the agent currently knows about under the given prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveAll {
    pub containers: Vec<ContainerInfo>,
    pub volumes: Vec<VolumeInfo>,
    pub archives: Vec<ArchiveInfo>,
}

/// Status of a single state-changing call. `InProgress` means WC should
/// leave the operation in flight and retry the same call next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Completed,
    AlreadyRunning,
    AlreadyStopped,
    AlreadyExists,
    AlreadyDeleted,
    InProgress,
}

impl OpStatus {
    pub fn is_done(self) -> bool {
        !matches!(self, OpStatus::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveResult {
    pub status: OpStatus,
    pub exit_code: i32,
    pub logs: String,
    pub archive_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub status: OpStatus,
    pub exit_code: i32,
    pub logs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcResult {
    pub deleted_count: u32,
    pub deleted_keys: Vec<String>,
}

/// Errors talking to the Runtime capability.
///
/// [`RuntimeError::classify`] splits these into retryable (connection/
/// timeout-shaped) and terminal (everything else), matching the Python
/// original's `core/retryable.py` split.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime connection failed: {0}")]
    Connection(String),

    #[error("runtime call timed out")]
    Timeout,

    #[error("runtime returned an error response: {0}")]
    Rejected(String),

    #[error("runtime response could not be decoded: {0}")]
    Decode(String),
}

/// Whether an error keeps an operation retryable or ends it immediately.
/// Implemented here and for [`sqlx::Error`] in `wsc-engine`, rather than a
/// bespoke match at every call site.
pub trait Classify {
    fn is_retryable(&self) -> bool;
}

impl Classify for RuntimeError {
    fn is_retryable(&self) -> bool {
        matches!(self, RuntimeError::Connection(_) | RuntimeError::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// The remote infrastructure-control surface. One production implementation
/// ([`crate::HttpRuntime`]) and one in-memory test double
/// ([`crate::FakeRuntime`], behind the `test-support` feature).
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn observe_all(&self, prefix: &str) -> Result<ObserveAll>;

    async fn start_container(&self, workspace_id: WorkspaceId, op_id: OpId, image_ref: &str) -> Result<OpStatus>;

    async fn stop_container(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus>;

    async fn delete_container(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus>;

    async fn create_volume(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus>;

    async fn delete_volume(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus>;

    async fn run_archive(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<ArchiveResult>;

    async fn run_restore(&self, workspace_id: WorkspaceId, op_id: OpId, archive_key: &str) -> Result<RestoreResult>;

    async fn run_gc(&self, protected: &[(WorkspaceId, OpId)]) -> Result<GcResult>;
}
