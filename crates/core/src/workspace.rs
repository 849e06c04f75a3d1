// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};

use crate::{Conditions, DesiredState, ErrorReason, OpId, Operation, OwnerId, Phase, WorkspaceId};

/// A workspace record as the reconciler reasons about it.
///
/// This is the domain-level view of a `workspaces` row: everything `judge`,
/// `plan` and `execute` need, with no sqlx or JSON concerns attached. See
/// `wsc_storage::WorkspaceRow` for the persisted column shape this is built
/// from and written back to.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub owner_user_id: OwnerId,
    pub image_ref: String,
    pub home_store_key: String,
    pub conditions: Conditions,
    pub phase: Phase,
    pub operation: Operation,
    pub op_id: Option<OpId>,
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

impl Workspace {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Re-derive this workspace's phase from its own conditions, per
    /// invariant I1. Callers only trust this when `operation == NONE`.
    pub fn judged_phase(&self) -> crate::JudgeOutput {
        crate::judge(&self.conditions, self.is_deleted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::workspace_builder;

    #[test]
    fn judged_phase_matches_standalone_judge_call() {
        let ws = workspace_builder().build();
        let direct = crate::judge(&ws.conditions, ws.is_deleted());
        assert_eq!(ws.judged_phase(), direct);
    }
}
