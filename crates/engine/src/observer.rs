// SPDX-License-Identifier: MIT

//! The Bulk Observer: keeps `conditions` fresh for every non-deleted
//! workspace with a fixed, N-independent number of Runtime calls per tick.
//!
//! The adapter trait bundles the three `list_containers` /
//! `list_volumes` / `list_archives` calls into a single
//! [`Runtime::observe_all`] round trip — one HTTP call instead of three,
//! same "≤3 calls regardless of N" budget. See `DESIGN.md` for this
//! consolidation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;
use wsc_adapters::{ArchiveInfo, ContainerInfo, LeaderGuard, Runtime, VolumeInfo};
use wsc_core::{Clock, ConditionKey, ConditionStatus, Conditions, ErrorReason, WorkspaceId};
use wsc_storage::WorkspaceRepository;

use crate::classify::DbRetryPolicy;
use crate::coordinator::Coordinator;

/// Rows fetched per tick. Bounded so one OB pass can't monopolize the pool
/// indefinitely on a very large fleet; the next tick (30s later, or sooner
/// on a wake) picks up whatever is left.
const BATCH_LIMIT: i64 = 2_000;

pub struct ObserverCoordinator<C: Clock> {
    repository: Arc<dyn WorkspaceRepository>,
    runtime: Arc<dyn Runtime>,
    clock: C,
    cluster_id: String,
    idle_interval: StdDuration,
    db_retry: DbRetryPolicy,
}

impl<C: Clock> ObserverCoordinator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(repository: Arc<dyn WorkspaceRepository>, runtime: Arc<dyn Runtime>, clock: C, cluster_id: String, idle_interval: StdDuration, db_retry: DbRetryPolicy) -> Self {
        Self {
            repository,
            runtime,
            clock,
            cluster_id,
            idle_interval,
            db_retry,
        }
    }
}

#[async_trait]
impl<C: Clock> Coordinator for ObserverCoordinator<C> {
    fn name(&self) -> &'static str {
        "ob"
    }

    fn lock_name(&self) -> &'static str {
        "ob"
    }

    fn interval(&self) -> StdDuration {
        self.idle_interval
    }

    async fn tick(&self, _leader: &mut LeaderGuard) {
        let queue = match self.db_retry.run(|| self.repository.list_observer_queue(BATCH_LIMIT)).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "observer: failed to list the observer queue");
                return;
            }
        };
        if queue.is_empty() {
            return;
        }

        let prefix = format!("{}/", self.cluster_id);
        let now = self.clock.now();

        let observed = self.runtime.observe_all(&prefix).await;
        let (containers, volumes, archives, unreachable) = match observed {
            Ok(all) => (index_containers(all.containers), index_volumes(all.volumes), index_archives(all.archives), false),
            Err(err) => {
                warn!(error = %err, "observer: Runtime.observe_all failed, marking all dimensions Unreachable this tick");
                (HashMap::new(), HashMap::new(), HashMap::new(), true)
            }
        };

        for workspace in queue {
            let container_status = match containers.get(&workspace.id) {
                Some(info) => workspace.conditions.container_ready.as_ref().map_or_else(
                    || ConditionStatus::new(info.running, info.reason.clone(), info.message.clone(), now),
                    |existing| existing.merge(info.running, info.reason.clone(), info.message.clone(), now),
                ),
                None => merge_absent(&workspace.conditions.container_ready, unreachable, "container", now),
            };

            let volume_status = match volumes.get(&workspace.id) {
                Some(info) => workspace.conditions.volume_ready.as_ref().map_or_else(
                    || ConditionStatus::new(info.exists, info.reason.clone(), info.message.clone(), now),
                    |existing| existing.merge(info.exists, info.reason.clone(), info.message.clone(), now),
                ),
                None => merge_absent(&workspace.conditions.volume_ready, unreachable, "volume", now),
            };

            let archive_status = match archives.get(&workspace.id) {
                Some(info) => workspace.conditions.archive_ready.as_ref().map_or_else(
                    || ConditionStatus::new(info.exists, info.reason.clone(), info.message.clone(), now),
                    |existing| existing.merge(info.exists, info.reason.clone(), info.message.clone(), now),
                ),
                None => merge_absent(&workspace.conditions.archive_ready, unreachable, "archive", now),
            };

            let conditions = Conditions {
                container_ready: Some(container_status),
                volume_ready: Some(volume_status),
                archive_ready: Some(archive_status),
            };

            let judged = wsc_core::judge(&conditions, workspace.deleted_at.is_some());

            // Never silently clear an error WC is the owner of, except the
            // one reason judge itself can set/clear (ContainerWithoutVolume)
            // — everything else (Timeout/RetryExceeded/...) only changes on
            // a WC write, so OB must carry it forward unmodified.
            let error_reason = reconcile_error_reason(workspace.error_reason, judged.error_reason);

            if let Err(err) = self.db_retry.run(|| self.repository.observe(workspace.id, &conditions, judged.phase, error_reason, now)).await {
                warn!(workspace_id = %workspace.id, error = %err, "observer: failed to persist observed conditions");
            }
        }
    }
}

fn index_containers(containers: Vec<ContainerInfo>) -> HashMap<WorkspaceId, ContainerInfo> {
    containers.into_iter().map(|c| (c.workspace_id, c)).collect()
}

fn index_volumes(volumes: Vec<VolumeInfo>) -> HashMap<WorkspaceId, VolumeInfo> {
    volumes.into_iter().map(|v| (v.workspace_id, v)).collect()
}

fn index_archives(archives: Vec<ArchiveInfo>) -> HashMap<WorkspaceId, ArchiveInfo> {
    archives.into_iter().map(|a| (a.workspace_id, a)).collect()
}

/// A workspace absent from a dimension's listing (the agent doesn't know
/// about it under the prefix, or the whole call failed this tick) reads as
/// "not ready", merged the same way a live observation would be so
/// `last_transition_time` still doesn't regress.
fn merge_absent(existing: &Option<ConditionStatus>, call_failed: bool, dimension: &str, now: chrono::DateTime<Utc>) -> ConditionStatus {
    let (reason, message) = if call_failed {
        ("Unreachable".to_string(), format!("Runtime.observe_all failed for the {dimension} dimension"))
    } else {
        ("NotFound".to_string(), format!("no {dimension} reported for this workspace"))
    };
    match existing {
        Some(status) => status.merge(false, reason, message, now),
        None => ConditionStatus::new(false, reason, message, now),
    }
}

/// `ContainerWithoutVolume` is the only error_reason judge is allowed to set
/// or clear; every other value is WC's to own and OB must pass it through
/// untouched (see `record_retry`/`complete_operation` in `wsc-storage`).
fn reconcile_error_reason(stored: Option<ErrorReason>, judged: Option<ErrorReason>) -> Option<ErrorReason> {
    match stored {
        Some(ErrorReason::ContainerWithoutVolume) | None => judged,
        other => other,
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
