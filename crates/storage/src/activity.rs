// SPDX-License-Identifier: MIT

//! Per-workspace last-access tracking.
//!
//! Every proxied request touches a workspace's activity timestamp, which
//! would be an UPDATE per request against `workspaces` if done directly.
//! Instead requests record into `workspace_activity` (a tiny, lock-cheap
//! upsert keyed on workspace id) and the TTL coordinator periodically
//! flushes the batch into `workspaces.last_access_at`.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use wsc_core::WorkspaceId;

use crate::error::Result;

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Record that `id` was accessed at `now`. Set-if-greater: a record
    /// arriving out of order (slower request, retried proxy call) never
    /// moves the timestamp backwards.
    async fn record_access(&self, id: WorkspaceId, now: DateTime<Utc>) -> Result<()>;

    /// Drain every row not yet flushed, returning `(id, last_access_epoch_ms)`
    /// pairs for the caller to apply to `workspaces` and then mark flushed.
    async fn drain_unflushed(&self) -> Result<Vec<(WorkspaceId, DateTime<Utc>)>>;

    async fn mark_flushed(&self, ids: &[WorkspaceId], now: DateTime<Utc>) -> Result<()>;
}

pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn record_access(&self, id: WorkspaceId, now: DateTime<Utc>) -> Result<()> {
        let epoch_ms = now.timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO workspace_activity (workspace_id, last_access_epoch_ms, flushed_at)
            VALUES ($1, $2, NULL)
            ON CONFLICT (workspace_id) DO UPDATE
            SET last_access_epoch_ms = GREATEST(workspace_activity.last_access_epoch_ms, excluded.last_access_epoch_ms),
                flushed_at = NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(epoch_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn drain_unflushed(&self) -> Result<Vec<(WorkspaceId, DateTime<Utc>)>> {
        let rows: Vec<(uuid::Uuid, i64)> =
            sqlx::query_as("SELECT workspace_id, last_access_epoch_ms FROM workspace_activity WHERE flushed_at IS NULL")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, epoch_ms)| (WorkspaceId::from_uuid(id), Utc.timestamp_millis_opt(epoch_ms).single().unwrap_or(now_fallback())))
            .collect())
    }

    async fn mark_flushed(&self, ids: &[WorkspaceId], now: DateTime<Utc>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        sqlx::query("UPDATE workspace_activity SET flushed_at = $2 WHERE workspace_id = ANY($1)")
            .bind(&uuids)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Epoch-millis values come straight out of a column this table itself
/// wrote, so the conversion back to `DateTime` is infallible in practice;
/// this only exists to give `single()` a total fallback instead of a panic.
fn now_fallback() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_roundtrip_is_lossless_for_millisecond_precision() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).single().unwrap();
        assert_eq!(now.timestamp_millis(), 1_700_000_000_123);
    }
}
