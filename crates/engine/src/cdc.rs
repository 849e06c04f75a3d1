// SPDX-License-Identifier: MIT

//! CDC Listener: the single leader instance holding a `LISTEN` connection
//! against the three notification channels the `workspaces` trigger fires
//! fanning each one out to the wake bus and/or the per-owner
//! SSE event log.
//!
//! Unlike OB/WC/TTL/GC/METRICS this isn't tick-based — it blocks on
//! `PgListener::recv` — so it doesn't implement [`crate::coordinator::Coordinator`]
//! and is driven by its own small loop instead.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::{PgListener, PgNotification};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wsc_adapters::{LeaderElection, Wake, WakeBus};
use wsc_core::{OwnerId, WorkspaceId};
use wsc_storage::{SseEventLog, WorkspaceRepository};

/// Sleep between a dropped `LISTEN` connection (or a lost leader race) and
/// the next retry — same order of magnitude as `FOLLOWER_RETRY` in
/// `coordinator.rs`.
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct WakePayload {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SsePayload {
    id: Uuid,
    owner_user_id: Uuid,
}

pub struct CdcListener {
    pool: PgPool,
    repository: Arc<dyn WorkspaceRepository>,
    wake_bus: Arc<WakeBus>,
    event_log: Arc<dyn SseEventLog>,
    sse_maxlen: i64,
}

impl CdcListener {
    pub fn new(pool: PgPool, repository: Arc<dyn WorkspaceRepository>, wake_bus: Arc<WakeBus>, event_log: Arc<dyn SseEventLog>, sse_maxlen: i64) -> Self {
        Self {
            pool,
            repository,
            wake_bus,
            event_log,
            sse_maxlen,
        }
    }

    /// Acquire the `cdc` advisory lock and, once held, run the listen loop
    /// until the connection drops or `cancel` fires; then fall back to
    /// retrying leadership, matching every other coordinator's posture.
    pub async fn run(self: Arc<Self>, leader: Arc<LeaderElection>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            match leader.try_acquire("cdc").await {
                Ok(Some(guard)) => {
                    info!("cdc: acquired leader lock");
                    self.listen_until_dropped(&cancel).await;
                    info!("cdc: stepping down");
                    if let Err(err) = guard.release().await {
                        warn!(error = %err, "cdc: failed to release leader lock cleanly");
                    }
                }
                Ok(None) => sleep_or_cancel(&cancel).await,
                Err(err) => {
                    warn!(error = %err, "cdc: leader election attempt failed");
                    sleep_or_cancel(&cancel).await;
                }
            }
        }
    }

    async fn listen_until_dropped(&self, cancel: &CancellationToken) {
        let mut listener = match PgListener::connect_with(&self.pool).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, "cdc: failed to open a LISTEN connection");
                return;
            }
        };

        if let Err(err) = listener.listen_all(["ws_sse", "ws_wake", "ws_deleted"]).await {
            warn!(error = %err, "cdc: failed to LISTEN on the workspace channels");
            return;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                notification = listener.recv() => {
                    match notification {
                        Ok(n) => self.handle(n).await,
                        Err(err) => {
                            // CDC notifications are at-least-once with no payload
                            // durability guarantee: a dropped connection just
                            // means the next OB tick rediscovers whatever changed
                            // in the meantime. Fall back to re-electing.
                            warn!(error = %err, "cdc: LISTEN connection dropped");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, notification: PgNotification) {
        match notification.channel() {
            "ws_wake" => self.handle_wake(notification.payload()).await,
            "ws_sse" => self.handle_sse(notification.payload()).await,
            "ws_deleted" => self.handle_deleted(notification.payload()).await,
            other => debug!(channel = other, "cdc: ignoring unrecognized channel"),
        }
    }

    async fn handle_wake(&self, payload: &str) {
        let Ok(parsed) = serde_json::from_str::<WakePayload>(payload) else {
            warn!(payload, "cdc: malformed ws_wake payload");
            return;
        };
        let wake = Wake {
            workspace_id: WorkspaceId::from_uuid(parsed.id),
        };
        self.wake_bus.publish_wc(wake);
        self.wake_bus.publish_ob(wake);
    }

    async fn handle_sse(&self, payload: &str) {
        let Ok(parsed) = serde_json::from_str::<SsePayload>(payload) else {
            warn!(payload, "cdc: malformed ws_sse payload");
            return;
        };
        let workspace_id = WorkspaceId::from_uuid(parsed.id);
        let owner_id = OwnerId::from_uuid(parsed.owner_user_id);

        let workspace = match self.repository.get(workspace_id).await {
            Ok(Some(workspace)) => workspace,
            Ok(None) => return,
            Err(err) => {
                warn!(workspace_id = %workspace_id, error = %err, "cdc: failed to fetch workspace projection for an SSE event");
                return;
            }
        };

        let body = sse_event_body(&workspace);

        if let Err(err) = self.event_log.append(owner_id, workspace_id, "update", body, self.sse_maxlen).await {
            warn!(workspace_id = %workspace_id, error = %err, "cdc: failed to append an SSE event");
        }
    }

    async fn handle_deleted(&self, payload: &str) {
        let Ok(parsed) = serde_json::from_str::<SsePayload>(payload) else {
            warn!(payload, "cdc: malformed ws_deleted payload");
            return;
        };
        let workspace_id = WorkspaceId::from_uuid(parsed.id);
        let owner_id = OwnerId::from_uuid(parsed.owner_user_id);

        let body = deleted_event_body(workspace_id);
        if let Err(err) = self.event_log.append(owner_id, workspace_id, "deleted", body, self.sse_maxlen).await {
            warn!(workspace_id = %workspace_id, error = %err, "cdc: failed to append a deletion SSE event");
        }
    }
}

/// An earlier schema named a `name` field in the SSE payload, but no such
/// column exists anywhere in this data model's attribute table — dropped
/// here rather than fabricated; see DESIGN.md.
fn sse_event_body(workspace: &wsc_core::Workspace) -> serde_json::Value {
    json!({
        "id": workspace.id,
        "phase": workspace.phase,
        "operation": workspace.operation,
        "error_reason": workspace.error_reason,
        "archive_key": workspace.archive_key,
        "updated_at": workspace.updated_at,
    })
}

fn deleted_event_body(workspace_id: WorkspaceId) -> serde_json::Value {
    json!({ "id": workspace_id, "deleted": true })
}

async fn sleep_or_cancel(cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(RETRY_DELAY) => {}
    }
}

#[cfg(test)]
#[path = "cdc_tests.rs"]
mod tests;
