// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// The in-flight action moving a workspace between phases.
///
/// At most one operation is in flight per workspace (invariant I2): a
/// non-`None` operation implies `op_id` and `op_started_at` are both set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "operation", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    None,
    Provisioning,
    Restoring,
    Starting,
    Stopping,
    Archiving,
    CreateEmptyArchive,
    Deleting,
}

impl Operation {
    pub fn is_none(self) -> bool {
        matches!(self, Operation::None)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::None => "NONE",
            Operation::Provisioning => "PROVISIONING",
            Operation::Restoring => "RESTORING",
            Operation::Starting => "STARTING",
            Operation::Stopping => "STOPPING",
            Operation::Archiving => "ARCHIVING",
            Operation::CreateEmptyArchive => "CREATE_EMPTY_ARCHIVE",
            Operation::Deleting => "DELETING",
        };
        f.write_str(s)
    }
}

/// The user-expressed target state the reconciler chases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "desired_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    Deleted,
    Archived,
    Standby,
    Running,
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DesiredState::Deleted => "DELETED",
            DesiredState::Archived => "ARCHIVED",
            DesiredState::Standby => "STANDBY",
            DesiredState::Running => "RUNNING",
        };
        f.write_str(s)
    }
}
