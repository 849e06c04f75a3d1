// SPDX-License-Identifier: MIT

//! The TTL Scheduler: demotes `desired_state` after per-phase idleness
//! Runs leader-only, every `TTL_SECONDS`, and never touches
//! `operation`/`phase`/`conditions` — only `desired_state`, which is the
//! write-partitioning policy's API/TTL lane.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use tracing::{debug, warn};
use wsc_adapters::LeaderGuard;
use wsc_core::{Clock, DesiredState, Phase, Workspace};
use wsc_storage::WorkspaceRepository;

use crate::classify::DbRetryPolicy;
use crate::coordinator::Coordinator;

pub struct TtlCoordinator<C: Clock> {
    repository: Arc<dyn WorkspaceRepository>,
    clock: C,
    ttl_standby: ChronoDuration,
    ttl_archive: ChronoDuration,
    interval: StdDuration,
    db_retry: DbRetryPolicy,
}

impl<C: Clock> TtlCoordinator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(repository: Arc<dyn WorkspaceRepository>, clock: C, ttl_standby: ChronoDuration, ttl_archive: ChronoDuration, interval: StdDuration, db_retry: DbRetryPolicy) -> Self {
        Self {
            repository,
            clock,
            ttl_standby,
            ttl_archive,
            interval,
            db_retry,
        }
    }
}

/// Which demotion (if any) `workspace` is due for, given `now`. Pure and
/// total like `wsc_core::judge`/`plan`, so the boundary case (exactly at the
/// threshold is not yet due) is testable without a repository in hand.
fn demotion(workspace: &Workspace, ttl_standby: ChronoDuration, ttl_archive: ChronoDuration, now: chrono::DateTime<chrono::Utc>) -> Option<DesiredState> {
    match workspace.phase {
        Phase::Running => {
            let last_access = workspace.last_access_at.unwrap_or(workspace.phase_changed_at);
            if now - last_access > ttl_standby {
                Some(DesiredState::Standby)
            } else {
                None
            }
        }
        Phase::Standby => {
            if now - workspace.phase_changed_at > ttl_archive {
                Some(DesiredState::Archived)
            } else {
                None
            }
        }
        _ => None,
    }
}

#[async_trait]
impl<C: Clock> Coordinator for TtlCoordinator<C> {
    fn name(&self) -> &'static str {
        "ttl"
    }

    fn lock_name(&self) -> &'static str {
        "ttl"
    }

    fn interval(&self) -> StdDuration {
        self.interval
    }

    async fn tick(&self, _leader: &mut LeaderGuard) {
        let candidates = match self.db_retry.run(|| self.repository.list_ttl_candidates()).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "ttl: failed to list candidates");
                return;
            }
        };

        let now = self.clock.now();

        for workspace in candidates {
            // A demotion only ever moves desired_state *down*; if the user
            // already asked for something at or below where TTL would send
            // it, leave desired_state alone (no-op write avoided, and no
            // risk of re-raising a state the user just lowered themselves).
            let Some(target) = demotion(&workspace, self.ttl_standby, self.ttl_archive, now) else {
                continue;
            };
            if !demotes(workspace.desired_state, target) {
                continue;
            }

            match self.db_retry.run(|| self.repository.set_desired_state(workspace.id, target, now)).await {
                Ok(true) => debug!(workspace_id = %workspace.id, target = %target, "ttl: demoted desired_state"),
                Ok(false) => {}
                Err(err) => warn!(workspace_id = %workspace.id, error = %err, "ttl: failed to demote desired_state"),
            }
        }
    }
}

/// Whether moving `current` to `target` is actually a demotion — ordered
/// `RUNNING > STANDBY > ARCHIVED > DELETED`, matching the lifecycle ladder
/// on the workspace row.
fn demotes(current: DesiredState, target: DesiredState) -> bool {
    rank(target) < rank(current)
}

fn rank(state: DesiredState) -> u8 {
    match state {
        DesiredState::Running => 3,
        DesiredState::Standby => 2,
        DesiredState::Archived => 1,
        DesiredState::Deleted => 0,
    }
}

#[cfg(test)]
#[path = "ttl_tests.rs"]
mod tests;
