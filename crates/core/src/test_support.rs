// SPDX-License-Identifier: MIT

//! Builders used by this crate's own tests and re-exported (behind the
//! `test-support` feature) for `wsc-storage`, `wsc-adapters` and `wsc-engine`
//! test code that needs a throwaway [`Workspace`] without repeating every
//! field.

use chrono::{DateTime, Utc};

use crate::{
    Conditions, DesiredState, ErrorReason, OpId, Operation, OwnerId, Phase, Workspace, WorkspaceId,
};

/// Builder for a [`Workspace`] with sane defaults: freshly created, no
/// conditions observed, `PENDING`/`NONE`, desired state `RUNNING`.
#[derive(Debug, Clone)]
pub struct WorkspaceBuilder {
    workspace: Workspace,
}

impl WorkspaceBuilder {
    pub fn new() -> Self {
        let now = epoch(0);
        Self {
            workspace: Workspace {
                id: WorkspaceId::new(),
                owner_user_id: OwnerId::new(),
                image_ref: "registry.example.com/base:latest".to_string(),
                home_store_key: "home/default".to_string(),
                conditions: Conditions::default(),
                phase: Phase::Pending,
                operation: Operation::None,
                op_id: None,
                op_started_at: None,
                desired_state: DesiredState::Running,
                archive_key: None,
                observed_at: None,
                last_access_at: None,
                phase_changed_at: now,
                error_reason: None,
                error_count: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        }
    }

    pub fn id(mut self, id: WorkspaceId) -> Self {
        self.workspace.id = id;
        self
    }

    pub fn owner(mut self, owner: OwnerId) -> Self {
        self.workspace.owner_user_id = owner;
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.workspace.phase = phase;
        self
    }

    pub fn operation(mut self, operation: Operation, op_id: OpId, started_at: DateTime<Utc>) -> Self {
        self.workspace.operation = operation;
        self.workspace.op_id = Some(op_id);
        self.workspace.op_started_at = Some(started_at);
        self
    }

    pub fn desired_state(mut self, desired_state: DesiredState) -> Self {
        self.workspace.desired_state = desired_state;
        self
    }

    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.workspace.conditions = conditions;
        self
    }

    pub fn error(mut self, reason: ErrorReason, count: i32) -> Self {
        self.workspace.error_reason = Some(reason);
        self.workspace.error_count = count;
        self
    }

    pub fn deleted_at(mut self, when: DateTime<Utc>) -> Self {
        self.workspace.deleted_at = Some(when);
        self
    }

    pub fn last_access_at(mut self, when: DateTime<Utc>) -> Self {
        self.workspace.last_access_at = Some(when);
        self
    }

    pub fn phase_changed_at(mut self, when: DateTime<Utc>) -> Self {
        self.workspace.phase_changed_at = when;
        self
    }

    pub fn build(self) -> Workspace {
        self.workspace
    }
}

impl Default for WorkspaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn workspace_builder() -> WorkspaceBuilder {
    WorkspaceBuilder::new()
}

/// A fixed, arbitrary instant `secs` seconds past the Unix epoch, for tests
/// that need a concrete timestamp without depending on the wall clock.
pub fn epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("valid test timestamp")
}
