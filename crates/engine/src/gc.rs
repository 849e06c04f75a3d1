// SPDX-License-Identifier: MIT

//! Archive GC: reaps orphaned archive objects — those under the cluster
//! prefix that no live workspace row references.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tracing::{info, warn};
use wsc_adapters::{LeaderGuard, Runtime};
use wsc_core::{OpId, WorkspaceId};
use wsc_storage::WorkspaceRepository;

use crate::classify::DbRetryPolicy;
use crate::coordinator::Coordinator;

pub struct GcCoordinator {
    repository: Arc<dyn WorkspaceRepository>,
    runtime: Arc<dyn Runtime>,
    interval: StdDuration,
    db_retry: DbRetryPolicy,
}

impl GcCoordinator {
    pub fn new(repository: Arc<dyn WorkspaceRepository>, runtime: Arc<dyn Runtime>, interval: StdDuration, db_retry: DbRetryPolicy) -> Self {
        Self { repository, runtime, interval, db_retry }
    }
}

#[async_trait]
impl Coordinator for GcCoordinator {
    fn name(&self) -> &'static str {
        "gc"
    }

    fn lock_name(&self) -> &'static str {
        "gc"
    }

    fn interval(&self) -> StdDuration {
        self.interval
    }

    async fn tick(&self, _leader: &mut LeaderGuard) {
        let protected = match self.db_retry.run(|| self.repository.list_protected_archive_keys()).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "gc: failed to list protected archive keys");
                return;
            }
        };

        let (protected_pairs, unparseable) = parse_protected_keys(&protected);
        if unparseable > 0 {
            warn!(count = unparseable, "gc: skipped protected keys that did not match the {{cluster}}/{{workspace}}/{{op}}/home.tar.zst layout");
        }

        match self.runtime.run_gc(&protected_pairs).await {
            Ok(result) => {
                if !result.deleted_keys.is_empty() {
                    info!(deleted_count = result.deleted_count, "gc: reaped orphaned archives");
                }
            }
            Err(err) => warn!(error = %err, "gc: Runtime.run_gc failed"),
        }
    }
}

/// Archive keys have the form `{cluster_id}/{workspace_id}/{op_id}/home.tar.zst`
/// the Runtime's `run_gc` takes `(workspace_id, op_id)` pairs
/// rather than raw keys because it reconstructs the key itself the same way
/// it wrote it — `op_id` is otherwise unrecoverable once an operation
/// completes and clears it from the row (see `DESIGN.md`).
fn parse_protected_keys(keys: &[String]) -> (Vec<(WorkspaceId, OpId)>, usize) {
    let mut pairs = Vec::with_capacity(keys.len());
    let mut unparseable = 0;

    for key in keys {
        let mut segments = key.split('/');
        let (_cluster, workspace, op) = (segments.next(), segments.next(), segments.next());
        match (workspace.and_then(|s| s.parse::<WorkspaceId>().ok()), op.and_then(|s| s.parse::<OpId>().ok())) {
            (Some(workspace_id), Some(op_id)) => pairs.push((workspace_id, op_id)),
            _ => unparseable += 1,
        }
    }

    (pairs, unparseable)
}

#[cfg(test)]
#[path = "gc_tests.rs"]
mod tests;
