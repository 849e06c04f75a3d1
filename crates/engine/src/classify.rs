// SPDX-License-Identifier: MIT

//! Error classification for the DB-facing half of the retryable/terminal
//! split. The Runtime-facing half ([`wsc_adapters::Classify`] on
//! [`wsc_adapters::RuntimeError`]) already lives in `wsc-adapters`; this
//! extends the same trait to [`sqlx::Error`] so call sites can match on one
//! interface regardless of which side failed.

use std::time::Duration;

use rand::Rng;
use wsc_adapters::Classify;
use wsc_storage::StorageError;

impl Classify for sqlx::Error {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed
        )
    }
}

/// `StorageError` wraps `sqlx::Error` for the database-backed cases;
/// everything else (a row genuinely not found, a migration failure) is
/// never worth retrying.
impl Classify for StorageError {
    fn is_retryable(&self) -> bool {
        match self {
            StorageError::Database(inner) => inner.is_retryable(),
            StorageError::Migration(_) | StorageError::NotFound(_) => false,
        }
    }
}

/// Run `f` with up to `max_attempts` tries, backing off exponentially with
/// jitter between retryable failures. A non-retryable error, or exhausting
/// the attempt budget, returns the last error to the caller, which logs and
/// treats it as a skipped tick rather than propagating further.
pub async fn with_db_retry<T, E, F, Fut>(max_attempts: u32, base_delay: Duration, mut f: F) -> Result<T, E>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < max_attempts && err.is_retryable() => {
                let jitter_ms = rand::thread_rng().gen_range(0..50);
                let backoff = base_delay * 2u32.pow(attempt) + Duration::from_millis(jitter_ms);
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// The `(max_attempts, base_delay)` pair every coordinator holds so its DB
/// writes and queue reads share one retry budget instead of repeating both
/// arguments at every call site.
#[derive(Debug, Clone, Copy)]
pub struct DbRetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl DbRetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    pub async fn run<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        E: Classify,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        with_db_retry(self.max_attempts, self.base_delay, f).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn policy_run_retries_the_same_as_the_free_function() {
        let calls = AtomicU32::new(0);
        let policy = DbRetryPolicy::new(3, Duration::from_millis(1));
        let result = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FakeErr { retryable: true })
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn storage_error_delegates_to_the_inner_sqlx_error() {
        let retryable = StorageError::Database(sqlx::Error::PoolTimedOut);
        assert!(retryable.is_retryable());

        let not_found = StorageError::NotFound(wsc_core::WorkspaceId::new());
        assert!(!not_found.is_retryable());
    }

    #[derive(Debug)]
    struct FakeErr {
        retryable: bool,
    }

    impl Classify for FakeErr {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let calls = AtomicU32::new(0);
        let result = with_db_retry(3, Duration::from_millis(1), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(FakeErr { retryable: true })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, FakeErr> = with_db_retry(5, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FakeErr { retryable: false })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_the_budget_returns_the_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, FakeErr> = with_db_retry(2, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FakeErr { retryable: true })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
