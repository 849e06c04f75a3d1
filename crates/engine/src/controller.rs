// SPDX-License-Identifier: MIT

//! The Workspace Controller: the reconciler centerpiece, running Judge,
//! Plan, Execute and Persist per workspace per tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use tracing::warn;
use wsc_adapters::{LeaderGuard, Runtime};
use wsc_core::{Clock, ConditionStatus, Conditions, ErrorReason, OpId, Operation, Phase, Workspace};
use wsc_storage::{OperationOutcome, WorkspaceRepository};

use crate::classify::DbRetryPolicy;
use crate::coordinator::Coordinator;
use crate::execute::{execute_operation, ExecuteResult};
use crate::plan::{plan, PlanOutcome};

/// Rows fetched per tick. One tick's worth of work; the next tick (on the
/// active interval when anything is in flight) picks up the rest.
const BATCH_LIMIT: i64 = 2_000;

pub struct ControllerCoordinator<C: Clock> {
    repository: Arc<dyn WorkspaceRepository>,
    runtime: Arc<dyn Runtime>,
    clock: C,
    max_retries: i32,
    per_op_timeout: ChronoDuration,
    active_interval: StdDuration,
    idle_interval: StdDuration,
    active: AtomicBool,
    db_retry: DbRetryPolicy,
}

impl<C: Clock> ControllerCoordinator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn WorkspaceRepository>,
        runtime: Arc<dyn Runtime>,
        clock: C,
        max_retries: i32,
        per_op_timeout: ChronoDuration,
        active_interval: StdDuration,
        idle_interval: StdDuration,
        db_retry: DbRetryPolicy,
    ) -> Self {
        Self {
            repository,
            runtime,
            clock,
            max_retries,
            per_op_timeout,
            active_interval,
            idle_interval,
            active: AtomicBool::new(false),
            db_retry,
        }
    }

    /// Claim (if `claim`) and run the single Runtime call this tick plans,
    /// then persist its outcome. Returns whether the row was actually
    /// touched, which drives the WC_ACTIVE/WC_IDLE alternation.
    async fn attempt(&self, workspace: &Workspace, operation: Operation, claim: bool, leader: &mut LeaderGuard) -> bool {
        match leader.verify_holding().await {
            Ok(true) => {}
            Ok(false) => {
                warn!(workspace_id = %workspace.id, "lost the leader lock mid-tick, abandoning this workspace");
                return false;
            }
            Err(err) => {
                warn!(workspace_id = %workspace.id, error = %err, "verify_holding failed, abandoning this workspace");
                return false;
            }
        }

        let op_id = if claim {
            let op_id = OpId::new();
            let now = self.clock.now();
            match self.db_retry.run(|| self.repository.start_operation(workspace.id, operation, op_id, now)).await {
                Ok(true) => op_id,
                Ok(false) => return false,
                Err(err) => {
                    warn!(workspace_id = %workspace.id, error = %err, "failed to claim a new operation");
                    return false;
                }
            }
        } else {
            match workspace.op_id {
                Some(id) => id,
                None => return false,
            }
        };

        let result = execute_operation(self.runtime.as_ref(), workspace, operation, op_id).await;
        self.persist(workspace, operation, op_id, result).await;
        true
    }

    async fn persist(&self, workspace: &Workspace, operation: Operation, op_id: OpId, result: ExecuteResult) {
        let now = self.clock.now();

        match result {
            ExecuteResult::InProgress => {}

            // DELETING's own success is definitive proof the resources are
            // gone — a delete of an already-errored row writes phase=DELETED straight
            // off the Runtime result, without waiting for a fresh OB pass
            // that (by design) no longer observes a soft-deleted row.
            ExecuteResult::Completed { archive_key } if operation == Operation::Deleting => {
                self.write_outcome(
                    workspace.id,
                    op_id,
                    OperationOutcome {
                        phase: Phase::Deleted,
                        archive_key,
                        error_reason: None,
                        error_count: 0,
                    },
                    now,
                )
                .await;
            }

            // ARCHIVING/CREATE_EMPTY_ARCHIVE producing an archive_key is
            // itself direct proof archive_ready now holds, so we can move
            // straight to ARCHIVED without waiting for an intervening OB
            // tick — every other operation leaves phase to lag until the
            // next OB pass re-observes its conditions.
            ExecuteResult::Completed { archive_key } if matches!(operation, Operation::Archiving | Operation::CreateEmptyArchive) => {
                let phase = phase_with_archive_ready(workspace, now);
                self.write_outcome(
                    workspace.id,
                    op_id,
                    OperationOutcome {
                        phase,
                        archive_key,
                        error_reason: None,
                        error_count: 0,
                    },
                    now,
                )
                .await;
            }

            ExecuteResult::Completed { archive_key } => {
                self.write_outcome(
                    workspace.id,
                    op_id,
                    OperationOutcome {
                        phase: workspace.judged_phase().phase,
                        archive_key,
                        error_reason: None,
                        error_count: 0,
                    },
                    now,
                )
                .await;
            }

            ExecuteResult::Failed { error_reason } => {
                let error_count = workspace.error_count + 1;
                if error_reason.is_terminal() {
                    self.write_outcome(
                        workspace.id,
                        op_id,
                        OperationOutcome {
                            phase: workspace.judged_phase().phase,
                            archive_key: None,
                            error_reason: Some(error_reason),
                            error_count,
                        },
                        now,
                    )
                    .await;
                } else if error_count >= self.max_retries {
                    self.write_outcome(
                        workspace.id,
                        op_id,
                        OperationOutcome {
                            phase: workspace.judged_phase().phase,
                            archive_key: None,
                            error_reason: Some(ErrorReason::RetryExceeded),
                            error_count,
                        },
                        now,
                    )
                    .await;
                } else if let Err(err) = self.db_retry.run(|| self.repository.record_retry(workspace.id, op_id, error_reason, error_count, now)).await {
                    warn!(workspace_id = %workspace.id, error = %err, "failed to record a retryable Execute failure");
                }
            }
        }
    }

    async fn write_outcome(&self, workspace_id: wsc_core::WorkspaceId, op_id: OpId, outcome: OperationOutcome, now: chrono::DateTime<chrono::Utc>) {
        if let Err(err) = self.db_retry.run(|| self.repository.complete_operation(workspace_id, op_id, outcome, now)).await {
            warn!(workspace_id = %workspace_id, error = %err, "failed to persist an operation outcome");
        }
    }
}

/// `judge`, applied to this workspace's stored conditions with
/// `archive_ready` forced true — used only for the ARCHIVING/
/// CREATE_EMPTY_ARCHIVE success path, where the operation's own result is
/// the evidence.
fn phase_with_archive_ready(workspace: &Workspace, now: chrono::DateTime<chrono::Utc>) -> Phase {
    let archive_status = match &workspace.conditions.archive_ready {
        Some(existing) => existing.merge(true, "ArchiveUploaded", "archive write completed", now),
        None => ConditionStatus::new(true, "ArchiveUploaded", "archive write completed", now),
    };
    let conditions = Conditions {
        archive_ready: Some(archive_status),
        ..workspace.conditions.clone()
    };
    wsc_core::judge(&conditions, workspace.is_deleted()).phase
}

#[async_trait]
impl<C: Clock> Coordinator for ControllerCoordinator<C> {
    fn name(&self) -> &'static str {
        "wc"
    }

    fn lock_name(&self) -> &'static str {
        "wc"
    }

    fn interval(&self) -> StdDuration {
        if self.active.load(Ordering::Relaxed) {
            self.active_interval
        } else {
            self.idle_interval
        }
    }

    async fn tick(&self, leader: &mut LeaderGuard) {
        let queue = match self.db_retry.run(|| self.repository.list_controller_queue(BATCH_LIMIT)).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "controller: failed to list the controller queue");
                return;
            }
        };

        let mut touched_any = false;
        let now = self.clock.now();

        for workspace in queue {
            let outcome = plan(
                workspace.phase,
                workspace.operation,
                workspace.op_started_at,
                workspace.desired_state,
                workspace.error_reason,
                self.per_op_timeout,
                now,
            );

            match outcome {
                PlanOutcome::Wait => {}

                PlanOutcome::ContinueInFlight => {
                    touched_any |= self.attempt(&workspace, workspace.operation, false, leader).await;
                }

                PlanOutcome::TimedOut => {
                    if let Some(op_id) = workspace.op_id {
                        self.write_outcome(
                            workspace.id,
                            op_id,
                            OperationOutcome {
                                phase: workspace.judged_phase().phase,
                                archive_key: None,
                                error_reason: Some(ErrorReason::Timeout),
                                error_count: workspace.error_count + 1,
                            },
                            now,
                        )
                        .await;
                        touched_any = true;
                    }
                }

                PlanOutcome::Start(operation) => {
                    touched_any |= self.attempt(&workspace, operation, true, leader).await;
                }
            }
        }

        self.active.store(touched_any, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
