// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("workspace {0} not found")]
    NotFound(wsc_core::WorkspaceId),
}

pub type Result<T> = std::result::Result<T, StorageError>;
