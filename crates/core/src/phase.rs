// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Derived state describing the current physical state of a workspace.
///
/// Phase is never written directly by API callers — it is always the output
/// of [`crate::judge`] applied to the workspace's observed conditions, except
/// while an operation is in flight, when it may briefly lag (see invariant
/// I1 in the architecture notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "phase", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Archived,
    Standby,
    Running,
    Error,
    Deleting,
    Deleted,
}

impl Phase {
    /// Whether this phase corresponds to a fully torn-down workspace row.
    pub fn is_terminal_lifecycle(self) -> bool {
        matches!(self, Phase::Deleted)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Pending => "PENDING",
            Phase::Archived => "ARCHIVED",
            Phase::Standby => "STANDBY",
            Phase::Running => "RUNNING",
            Phase::Error => "ERROR",
            Phase::Deleting => "DELETING",
            Phase::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}
