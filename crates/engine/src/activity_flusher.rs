// SPDX-License-Identifier: MIT

//! Per-process activity flush task: drains whatever
//! `last_access_at` bumps this process's `ActivityStore` has buffered and
//! applies them to `workspaces` with set-if-greater semantics. Runs on its
//! own ticker with **no leader lock** — every process flushes its own
//! buffer, unlike the five leader-elected coordinators.

use std::time::Duration as StdDuration;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use wsc_core::Clock;
use wsc_storage::{ActivityStore, WorkspaceRepository};

pub struct ActivityFlusher<C: Clock> {
    activity_store: std::sync::Arc<dyn ActivityStore>,
    repository: std::sync::Arc<dyn WorkspaceRepository>,
    clock: C,
    interval: StdDuration,
}

impl<C: Clock> ActivityFlusher<C> {
    pub fn new(activity_store: std::sync::Arc<dyn ActivityStore>, repository: std::sync::Arc<dyn WorkspaceRepository>, clock: C, interval: StdDuration) -> Self {
        Self {
            activity_store,
            repository,
            clock,
            interval,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.flush_once().await;
        }
    }

    async fn flush_once(&self) {
        let batch = match self.activity_store.drain_unflushed().await {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, "activity flusher: failed to drain buffered access timestamps");
                return;
            }
        };
        if batch.is_empty() {
            return;
        }

        if let Err(err) = self.repository.apply_last_access_batch(&batch).await {
            warn!(error = %err, "activity flusher: failed to apply a last_access_at batch");
            return;
        }

        let ids: Vec<_> = batch.into_iter().map(|(id, _)| id).collect();
        if let Err(err) = self.activity_store.mark_flushed(&ids, self.clock.now()).await {
            warn!(error = %err, "activity flusher: failed to mark a batch flushed");
        }
    }
}
