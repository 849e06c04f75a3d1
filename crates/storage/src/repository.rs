// SPDX-License-Identifier: MIT

//! The `workspaces` table is the single consensus point between coordinators
//! (see the write-partitioning policy this trait's method names follow:
//! `observe_*` is OB-only, `start_operation`/`complete_operation` is WC-only,
//! `set_desired_state`/`soft_delete` is the API/TTL path).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use wsc_core::{Conditions, DesiredState, ErrorReason, OpId, Operation, OwnerId, Phase, Workspace, WorkspaceId};

use crate::error::Result;
use crate::row::WorkspaceRow;

/// Fields supplied by the API when a workspace is first created. Everything
/// else starts at its column default (`PENDING`/`NONE`/no conditions).
#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub owner_user_id: OwnerId,
    pub image_ref: String,
    pub home_store_key: String,
    pub desired_state: DesiredState,
}

/// Outcome of a completed operation, written back atomically with the
/// operation being cleared.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub phase: Phase,
    pub archive_key: Option<String>,
    pub error_reason: Option<ErrorReason>,
    pub error_count: i32,
}

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn create(&self, new: NewWorkspace) -> Result<Workspace>;

    async fn get(&self, id: WorkspaceId) -> Result<Option<Workspace>>;

    /// Rows the Bulk Observer should poll next: no operation in flight, not
    /// soft-deleted, oldest `observed_at` first (nulls first).
    async fn list_observer_queue(&self, limit: i64) -> Result<Vec<Workspace>>;

    /// Rows the Workspace Controller should act on: an operation already in
    /// flight (continue it), or desired_state has not yet been reached and
    /// nothing is in flight (start one), or the row is pending deletion.
    async fn list_controller_queue(&self, limit: i64) -> Result<Vec<Workspace>>;

    /// OB-only: persist freshly observed conditions and the phase `judge`
    /// derived from them. No-ops (returns `false`) if an operation is in
    /// flight, since WC owns `phase` while reconciling.
    async fn observe(
        &self,
        id: WorkspaceId,
        conditions: &Conditions,
        phase: Phase,
        error_reason: Option<ErrorReason>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// WC-only: claim the right to run `operation`, minting `op_id`. Fails
    /// (`false`) if another operation is already in flight — the caller
    /// should treat this as a lost race, not an error.
    async fn start_operation(
        &self,
        id: WorkspaceId,
        operation: Operation,
        op_id: OpId,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// WC-only: clear the in-flight operation and persist its outcome.
    /// Guarded on `op_id` so a delayed retry of a superseded attempt can
    /// never clobber a newer one.
    async fn complete_operation(&self, id: WorkspaceId, op_id: OpId, outcome: OperationOutcome, now: DateTime<Utc>) -> Result<bool>;

    /// WC-only: record a retryable Execute failure without releasing the
    /// operation — `operation`/`op_id`/`op_started_at` are left untouched so
    /// the same attempt is retried (same idempotency key) next tick, only
    /// `error_reason`/`error_count` move. Guarded on `op_id` like
    /// `complete_operation`.
    async fn record_retry(&self, id: WorkspaceId, op_id: OpId, error_reason: ErrorReason, error_count: i32, now: DateTime<Utc>) -> Result<bool>;

    async fn set_desired_state(&self, id: WorkspaceId, desired_state: DesiredState, now: DateTime<Utc>) -> Result<bool>;

    async fn soft_delete(&self, id: WorkspaceId, now: DateTime<Utc>) -> Result<bool>;

    /// GC-only: remove a row once it has reached `DELETED` and its archive
    /// (if any) has been reaped.
    async fn hard_delete(&self, id: WorkspaceId) -> Result<bool>;

    /// TTL-only: batch-apply the activity flusher's set-if-greater
    /// `last_access_at` values.
    async fn apply_last_access_batch(&self, batch: &[(WorkspaceId, DateTime<Utc>)]) -> Result<()>;

    /// GC-only: archive keys that must survive a GC sweep — the
    /// `{archive_key : deleted_at IS NULL AND archive_key IS NOT NULL}`.
    async fn list_protected_archive_keys(&self) -> Result<Vec<String>>;

    /// TTL-only: quiescent rows eligible for idleness-based demotion —
    /// `operation = NONE AND phase IN (RUNNING, STANDBY)`.
    async fn list_ttl_candidates(&self) -> Result<Vec<Workspace>>;

    /// METRICS-only: live workspace count grouped by phase, excluding
    /// DELETING/DELETED (not relevant to live-fleet monitoring).
    async fn count_by_phase(&self) -> Result<Vec<(Phase, i64)>>;

    /// METRICS-only: live workspace count grouped by in-flight operation,
    /// excluding NONE.
    async fn count_by_operation(&self) -> Result<Vec<(Operation, i64)>>;
}

pub struct PgWorkspaceRepository {
    pool: PgPool,
}

impl PgWorkspaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceRepository for PgWorkspaceRepository {
    async fn create(&self, new: NewWorkspace) -> Result<Workspace> {
        let row: WorkspaceRow = sqlx::query_as(
            r#"
            INSERT INTO workspaces (owner_user_id, image_ref, home_store_key, desired_state)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.owner_user_id.as_uuid())
        .bind(new.image_ref)
        .bind(new.home_store_key)
        .bind(new.desired_state)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get(&self, id: WorkspaceId) -> Result<Option<Workspace>> {
        let row: Option<WorkspaceRow> = sqlx::query_as("SELECT * FROM workspaces WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list_observer_queue(&self, limit: i64) -> Result<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> = sqlx::query_as(
            r#"
            SELECT * FROM workspaces
            WHERE deleted_at IS NULL AND operation = 'none'
            ORDER BY observed_at ASC NULLS FIRST
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_controller_queue(&self, limit: i64) -> Result<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> = sqlx::query_as(
            r#"
            SELECT * FROM workspaces
            WHERE operation != 'none'
               OR deleted_at IS NOT NULL
               OR (desired_state = 'running'  AND phase NOT IN ('running'))
               OR (desired_state = 'standby'  AND phase NOT IN ('standby', 'running'))
               OR (desired_state = 'archived' AND phase NOT IN ('archived'))
            ORDER BY updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn observe(
        &self,
        id: WorkspaceId,
        conditions: &Conditions,
        phase: Phase,
        error_reason: Option<ErrorReason>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET conditions = $2,
                observed_at = $3,
                phase = $4,
                phase_changed_at = CASE WHEN phase IS DISTINCT FROM $4 THEN $3 ELSE phase_changed_at END,
                error_reason = $5,
                updated_at = $3
            WHERE id = $1 AND operation = 'none'
            "#,
        )
        .bind(id.as_uuid())
        .bind(Json(conditions.clone()))
        .bind(now)
        .bind(phase)
        .bind(error_reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn start_operation(&self, id: WorkspaceId, operation: Operation, op_id: OpId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET operation = $2, op_id = $3, op_started_at = $4, updated_at = $4
            WHERE id = $1 AND operation = 'none'
            "#,
        )
        .bind(id.as_uuid())
        .bind(operation)
        .bind(op_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_operation(&self, id: WorkspaceId, op_id: OpId, outcome: OperationOutcome, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET operation = 'none',
                op_id = NULL,
                op_started_at = NULL,
                phase = $3,
                phase_changed_at = CASE WHEN phase IS DISTINCT FROM $3 THEN $4 ELSE phase_changed_at END,
                archive_key = COALESCE($5, archive_key),
                error_reason = $6,
                error_count = $7,
                updated_at = $4
            WHERE id = $1 AND op_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(op_id.as_uuid())
        .bind(outcome.phase)
        .bind(now)
        .bind(outcome.archive_key)
        .bind(outcome.error_reason)
        .bind(outcome.error_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_retry(&self, id: WorkspaceId, op_id: OpId, error_reason: ErrorReason, error_count: i32, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET error_reason = $3, error_count = $4, updated_at = $5
            WHERE id = $1 AND op_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(op_id.as_uuid())
        .bind(error_reason)
        .bind(error_count)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_desired_state(&self, id: WorkspaceId, desired_state: DesiredState, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET desired_state = $2, updated_at = $3
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(desired_state)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete(&self, id: WorkspaceId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET desired_state = 'deleted', deleted_at = $2, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn hard_delete(&self, id: WorkspaceId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = $1 AND phase = 'deleted'")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn apply_last_access_batch(&self, batch: &[(WorkspaceId, DateTime<Utc>)]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for (id, at) in batch {
            sqlx::query("UPDATE workspaces SET last_access_at = GREATEST(COALESCE(last_access_at, $2), $2) WHERE id = $1")
                .bind(id.as_uuid())
                .bind(*at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn list_protected_archive_keys(&self) -> Result<Vec<String>> {
        let keys: Vec<(String,)> = sqlx::query_as("SELECT archive_key FROM workspaces WHERE deleted_at IS NULL AND archive_key IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys.into_iter().map(|(key,)| key).collect())
    }

    async fn list_ttl_candidates(&self) -> Result<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> = sqlx::query_as(
            r#"
            SELECT * FROM workspaces
            WHERE deleted_at IS NULL AND operation = 'none' AND phase IN ('running', 'standby')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_by_phase(&self) -> Result<Vec<(Phase, i64)>> {
        let rows: Vec<(Phase, i64)> = sqlx::query_as(
            r#"
            SELECT phase, count(*) FROM workspaces
            WHERE deleted_at IS NULL AND phase NOT IN ('deleting', 'deleted')
            GROUP BY phase
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_by_operation(&self) -> Result<Vec<(Operation, i64)>> {
        let rows: Vec<(Operation, i64)> = sqlx::query_as(
            r#"
            SELECT operation, count(*) FROM workspaces
            WHERE operation != 'none'
            GROUP BY operation
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
