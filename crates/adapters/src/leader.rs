// SPDX-License-Identifier: MIT

//! Active/standby leader election via a Postgres session-level advisory
//! lock, held on one dedicated connection for as long as this process is
//! the leader for `lock_name`.

use fnv::FnvHasher;
use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use std::hash::Hasher;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn lock_id(name: &str) -> i64 {
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_bytes());
    hasher.finish() as i64
}

/// A held advisory lock. Dropping it without calling `release` leaves the
/// lock held until the underlying connection closes — acceptable, since a
/// crashed process's connection dies with it and Postgres releases
/// session-level advisory locks on disconnect.
pub struct LeaderGuard {
    conn: PgConnection,
    name: String,
    lock_id: i64,
}

impl LeaderGuard {
    /// Release the lock explicitly (graceful shutdown / clean step-down).
    pub async fn release(mut self) -> Result<(), LeaderError> {
        sqlx::query("SELECT pg_advisory_unlock($1)").bind(self.lock_id).execute(&mut self.conn).await?;
        Ok(())
    }

    /// Pre-critical-operation split-brain check: confirm the backend that
    /// took this lock is still the one holding it (catches a connection
    /// that silently dropped and was re-used by the pool for someone else).
    pub async fn verify_holding(&mut self) -> Result<bool, LeaderError> {
        let (held,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM pg_locks l
                JOIN pg_stat_activity a ON a.pid = l.pid
                WHERE l.locktype = 'advisory'
                  AND l.objid = $1
                  AND l.pid = pg_backend_pid()
                  AND a.pid = pg_backend_pid()
            )
            "#,
        )
        .bind(self.lock_id)
        .fetch_one(&mut self.conn)
        .await?;

        Ok(held)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Attempts `try_acquire` for each coordinator's lock name; only the holder
/// runs that coordinator's loop.
pub struct LeaderElection {
    pool: PgPool,
}

impl LeaderElection {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Try to become leader for `name`. Returns `None` if another instance
    /// already holds it — the caller should sleep `idle_interval` and retry.
    pub async fn try_acquire(&self, name: &str) -> Result<Option<LeaderGuard>, LeaderError> {
        let mut conn = self.pool.acquire().await?.detach();
        let id = lock_id(name);

        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)").bind(id).fetch_one(&mut conn).await?;

        if acquired {
            Ok(Some(LeaderGuard {
                conn,
                name: name.to_string(),
                lock_id: id,
            }))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_id_is_stable_and_distinct_per_name() {
        assert_eq!(lock_id("ob"), lock_id("ob"));
        assert_ne!(lock_id("ob"), lock_id("wc"));
        assert_ne!(lock_id("ttl"), lock_id("gc"));
        assert_ne!(lock_id("gc"), lock_id("metrics"));
    }
}
