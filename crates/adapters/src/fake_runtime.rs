// SPDX-License-Identifier: MIT

//! In-memory [`Runtime`] double for engine and daemon tests. Scripted
//! responses let a test drive the exact sequence an end-to-end
//! scenarios describe (e.g. "Runtime returns `in_progress`, then on retry
//! `already_running`") without a Docker/S3 agent anywhere nearby.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use wsc_core::{OpId, WorkspaceId};

use crate::runtime::{ArchiveResult, GcResult, ObserveAll, OpStatus, RestoreResult, Result, Runtime, RuntimeError};

#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Ok(T),
    Err(String),
}

#[derive(Default)]
struct Queues {
    observe_all: VecDeque<Scripted<ObserveAll>>,
    container: VecDeque<Scripted<OpStatus>>,
    volume: VecDeque<Scripted<OpStatus>>,
    archive: VecDeque<Scripted<ArchiveResult>>,
    restore: VecDeque<Scripted<RestoreResult>>,
    gc: VecDeque<Scripted<GcResult>>,
}

/// Call log entry, so a test can assert `(workspace_id, op_id)` idempotency
/// keys were reused across retries rather than minted fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub op: &'static str,
    pub workspace_id: Option<WorkspaceId>,
    pub op_id: Option<OpId>,
}

#[derive(Default)]
pub struct FakeRuntime {
    queues: Mutex<Queues>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_observe_all(&self, result: Scripted<ObserveAll>) {
        self.queues.lock().observe_all.push_back(result);
    }

    pub fn push_container_status(&self, result: Scripted<OpStatus>) {
        self.queues.lock().container.push_back(result);
    }

    pub fn push_volume_status(&self, result: Scripted<OpStatus>) {
        self.queues.lock().volume.push_back(result);
    }

    pub fn push_archive_result(&self, result: Scripted<ArchiveResult>) {
        self.queues.lock().archive.push_back(result);
    }

    pub fn push_restore_result(&self, result: Scripted<RestoreResult>) {
        self.queues.lock().restore.push_back(result);
    }

    pub fn push_gc_result(&self, result: Scripted<GcResult>) {
        self.queues.lock().gc.push_back(result);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn record(&self, op: &'static str, workspace_id: Option<WorkspaceId>, op_id: Option<OpId>) {
        self.calls.lock().push(RecordedCall { op, workspace_id, op_id });
    }

    fn pop<T>(queue: &mut VecDeque<Scripted<T>>, default_status: T) -> Result<T> {
        match queue.pop_front() {
            Some(Scripted::Ok(value)) => Ok(value),
            Some(Scripted::Err(message)) => Err(RuntimeError::Rejected(message)),
            None => Ok(default_status),
        }
    }
}

#[async_trait]
impl Runtime for FakeRuntime {
    async fn observe_all(&self, _prefix: &str) -> Result<ObserveAll> {
        self.record("observe_all", None, None);
        Self::pop(&mut self.queues.lock().observe_all, ObserveAll::default())
    }

    async fn start_container(&self, workspace_id: WorkspaceId, op_id: OpId, _image_ref: &str) -> Result<OpStatus> {
        self.record("start_container", Some(workspace_id), Some(op_id));
        Self::pop(&mut self.queues.lock().container, OpStatus::Completed)
    }

    async fn stop_container(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus> {
        self.record("stop_container", Some(workspace_id), Some(op_id));
        Self::pop(&mut self.queues.lock().container, OpStatus::Completed)
    }

    async fn delete_container(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus> {
        self.record("delete_container", Some(workspace_id), Some(op_id));
        Self::pop(&mut self.queues.lock().container, OpStatus::Completed)
    }

    async fn create_volume(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus> {
        self.record("create_volume", Some(workspace_id), Some(op_id));
        Self::pop(&mut self.queues.lock().volume, OpStatus::Completed)
    }

    async fn delete_volume(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<OpStatus> {
        self.record("delete_volume", Some(workspace_id), Some(op_id));
        Self::pop(&mut self.queues.lock().volume, OpStatus::Completed)
    }

    async fn run_archive(&self, workspace_id: WorkspaceId, op_id: OpId) -> Result<ArchiveResult> {
        self.record("run_archive", Some(workspace_id), Some(op_id));
        Self::pop(
            &mut self.queues.lock().archive,
            ArchiveResult {
                status: OpStatus::Completed,
                exit_code: 0,
                logs: String::new(),
                archive_key: Some(format!("{workspace_id}.tar.zst")),
            },
        )
    }

    async fn run_restore(&self, workspace_id: WorkspaceId, op_id: OpId, _archive_key: &str) -> Result<RestoreResult> {
        self.record("run_restore", Some(workspace_id), Some(op_id));
        Self::pop(
            &mut self.queues.lock().restore,
            RestoreResult {
                status: OpStatus::Completed,
                exit_code: 0,
                logs: String::new(),
            },
        )
    }

    async fn run_gc(&self, _protected: &[(WorkspaceId, OpId)]) -> Result<GcResult> {
        self.record("run_gc", None, None);
        Self::pop(
            &mut self.queues.lock().gc,
            GcResult {
                deleted_count: 0,
                deleted_keys: Vec::new(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_results_are_returned_in_order() {
        let runtime = FakeRuntime::new();
        runtime.push_container_status(Scripted::Ok(OpStatus::InProgress));
        runtime.push_container_status(Scripted::Ok(OpStatus::AlreadyRunning));

        let ws = WorkspaceId::new();
        let op = OpId::new();
        let first = runtime.start_container(ws, op, "img").await.unwrap();
        let second = runtime.start_container(ws, op, "img").await.unwrap();

        assert_eq!(first, OpStatus::InProgress);
        assert_eq!(second, OpStatus::AlreadyRunning);
    }

    #[tokio::test]
    async fn empty_queue_falls_back_to_completed() {
        let runtime = FakeRuntime::new();
        let status = runtime.delete_volume(WorkspaceId::new(), OpId::new()).await.unwrap();
        assert_eq!(status, OpStatus::Completed);
    }

    #[tokio::test]
    async fn calls_are_recorded_with_the_same_op_id_across_retries() {
        let runtime = FakeRuntime::new();
        let ws = WorkspaceId::new();
        let op = OpId::new();
        let _ = runtime.start_container(ws, op, "img").await;
        let _ = runtime.start_container(ws, op, "img").await;

        let calls = runtime.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].op_id, calls[1].op_id);
    }
}
