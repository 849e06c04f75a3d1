// SPDX-License-Identifier: MIT

//! `judge`: the pure, total function deriving a workspace's phase from its
//! observed conditions and soft-delete flag.
//!
//! This is the single source of truth for phase (invariant I1). It is never
//! async, never fallible, and never touches the database — `wsc-engine`
//! calls it with data already read out of a row and writes the result back.

use crate::{ConditionKey, Conditions, ErrorReason, Phase};

/// Result of applying [`judge`] to a workspace's conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JudgeOutput {
    pub phase: Phase,
    pub healthy: bool,
    pub error_reason: Option<ErrorReason>,
}

impl JudgeOutput {
    fn healthy(phase: Phase) -> Self {
        Self {
            phase,
            healthy: true,
            error_reason: None,
        }
    }
}

/// Check the one standing invariant judge is responsible for enforcing:
/// a container cannot be ready without its volume (I3).
fn check_invariants(conditions: &Conditions) -> Result<(), ErrorReason> {
    if conditions.container_ready() && !conditions.volume_ready() {
        return Err(ErrorReason::ContainerWithoutVolume);
    }
    Ok(())
}

/// Derive `(phase, healthy, error_reason)` from `(conditions, deleted_at)`.
///
/// Priority order (strict):
/// 1. `deleted_at` set → `DELETING` if any resource remains, else `DELETED`.
/// 2. Invariant check → `ERROR` / `ContainerWithoutVolume` if violated.
/// 3. Resource ladder, highest available wins: container∧volume → `RUNNING`;
///    volume → `STANDBY`; archive → `ARCHIVED`; else `PENDING`.
pub fn judge(conditions: &Conditions, deleted_at: bool) -> JudgeOutput {
    if deleted_at {
        let phase = if conditions.has_any_resource() {
            Phase::Deleting
        } else {
            Phase::Deleted
        };
        return JudgeOutput::healthy(phase);
    }

    if let Err(reason) = check_invariants(conditions) {
        return JudgeOutput {
            phase: Phase::Error,
            healthy: false,
            error_reason: Some(reason),
        };
    }

    let phase = if conditions.container_ready() && conditions.volume_ready() {
        Phase::Running
    } else if conditions.volume_ready() {
        Phase::Standby
    } else if conditions.archive_ready() {
        Phase::Archived
    } else {
        Phase::Pending
    };

    JudgeOutput::healthy(phase)
}

/// Key used for the condition keys this module cares about — re-exported so
/// callers building a [`Conditions`] value from storage rows have a single
/// place to look up the fixed key set.
pub const CONDITION_KEYS: [ConditionKey; 3] = [
    ConditionKey::ContainerReady,
    ConditionKey::VolumeReady,
    ConditionKey::ArchiveReady,
];

#[cfg(test)]
#[path = "judge_tests.rs"]
mod tests;
