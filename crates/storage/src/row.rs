// SPDX-License-Identifier: MIT

//! The `workspaces` row shape, and its conversion to/from the domain
//! [`wsc_core::Workspace`].

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;
use wsc_core::{Conditions, DesiredState, ErrorReason, OpId, Operation, OwnerId, Phase, Workspace, WorkspaceId};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkspaceRow {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub image_ref: String,
    pub home_store_key: String,
    pub conditions: Json<Conditions>,
    pub phase: Phase,
    pub operation: Operation,
    pub op_id: Option<Uuid>,
    pub op_started_at: Option<DateTime<Utc>>,
    pub desired_state: DesiredState,
    pub archive_key: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub phase_changed_at: DateTime<Utc>,
    pub error_reason: Option<ErrorReason>,
    pub error_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<WorkspaceRow> for Workspace {
    fn from(row: WorkspaceRow) -> Self {
        Workspace {
            id: WorkspaceId::from_uuid(row.id),
            owner_user_id: OwnerId::from_uuid(row.owner_user_id),
            image_ref: row.image_ref,
            home_store_key: row.home_store_key,
            conditions: row.conditions.0,
            phase: row.phase,
            operation: row.operation,
            op_id: row.op_id.map(OpId::from_uuid),
            op_started_at: row.op_started_at,
            desired_state: row.desired_state,
            archive_key: row.archive_key,
            observed_at: row.observed_at,
            last_access_at: row.last_access_at,
            phase_changed_at: row.phase_changed_at,
            error_reason: row.error_reason,
            error_count: row.error_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}
