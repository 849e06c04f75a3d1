// SPDX-License-Identifier: MIT

//! Per-owner SSE event log, trimmed to a bounded length on every insert.
//!
//! Replaces what a Redis Stream would give the original implementation:
//! an append-only, per-owner feed that new SSE subscribers can resume from
//! a `seq` cursor, folded into the same Postgres instance everything else
//! already talks to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use wsc_core::{OwnerId, WorkspaceId};

use crate::error::Result;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SseEvent {
    pub seq: i64,
    pub owner_user_id: uuid::Uuid,
    pub workspace_id: uuid::Uuid,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SseEventLog: Send + Sync {
    /// Append one event and trim the owner's log to `maxlen`. Returns the
    /// assigned `seq`, used by the CDC listener to notify subscribers.
    async fn append(&self, owner_user_id: OwnerId, workspace_id: WorkspaceId, event_type: &str, payload: Value, maxlen: i64) -> Result<i64>;

    /// Events after `after_seq` for one owner, oldest first, for a
    /// reconnecting SSE client replaying from its last seen cursor.
    async fn events_since(&self, owner_user_id: OwnerId, after_seq: i64) -> Result<Vec<SseEvent>>;
}

pub struct PgSseEventLog {
    pool: PgPool,
}

impl PgSseEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SseEventLog for PgSseEventLog {
    async fn append(&self, owner_user_id: OwnerId, workspace_id: WorkspaceId, event_type: &str, payload: Value, maxlen: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let (seq,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sse_events (owner_user_id, workspace_id, event_type, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING seq
            "#,
        )
        .bind(owner_user_id.as_uuid())
        .bind(workspace_id.as_uuid())
        .bind(event_type)
        .bind(payload)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM sse_events
            WHERE owner_user_id = $1
              AND seq <= (SELECT max(seq) FROM sse_events WHERE owner_user_id = $1) - $2
            "#,
        )
        .bind(owner_user_id.as_uuid())
        .bind(maxlen)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(seq)
    }

    async fn events_since(&self, owner_user_id: OwnerId, after_seq: i64) -> Result<Vec<SseEvent>> {
        let rows: Vec<SseEvent> = sqlx::query_as(
            r#"
            SELECT * FROM sse_events
            WHERE owner_user_id = $1 AND seq > $2
            ORDER BY seq ASC
            "#,
        )
        .bind(owner_user_id.as_uuid())
        .bind(after_seq)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
