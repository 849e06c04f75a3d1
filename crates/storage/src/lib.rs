// SPDX-License-Identifier: MIT

//! Postgres-backed persistence for the workspace orchestrator.
//!
//! The `workspaces` table is the single consensus point coordinators agree
//! through; everything else here (`workspace_activity`, `sse_events`) exists
//! to keep high-frequency, low-stakes writes off that table's hot path.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod activity;
mod error;
mod repository;
mod row;
mod sse;

pub use activity::{ActivityStore, PgActivityStore};
pub use error::{StorageError, Result};
pub use repository::{NewWorkspace, OperationOutcome, PgWorkspaceRepository, WorkspaceRepository};
pub use row::WorkspaceRow;
pub use sse::{PgSseEventLog, SseEvent, SseEventLog};

/// Embedded migrations, run by the daemon on startup and by `#[sqlx::test]`
/// in integration tests across this workspace.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations");
