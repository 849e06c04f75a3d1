// SPDX-License-Identifier: MIT

//! Plan: decide the next operation for a workspace given its judged phase,
//! current operation, desired state and error history. Pure and total like
//! `wsc_core::judge` — no I/O, just a decision from data already in hand.

use chrono::{DateTime, Duration, Utc};
use wsc_core::{DesiredState, ErrorReason, Operation, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// An operation is already in flight and hasn't timed out; keep waiting.
    ContinueInFlight,
    /// An operation is in flight and exceeded `per_op_timeout`; the caller
    /// clears it, sets `error_reason=Timeout`, and increments `error_count`.
    TimedOut,
    /// Nothing to do: phase already matches desired_state, a terminal/
    /// exhausted error is blocking replan, or the transition table's cell
    /// is a deliberate no-op.
    Wait,
    /// Start this operation fresh.
    Start(Operation),
}

/// `(phase, desired_state)` → operation, per the transition table. `None`
/// means the cell is a deliberate no-op (already there, or a dead end that
/// waits for a different desired_state).
fn transition(phase: Phase, desired_state: DesiredState) -> Option<Operation> {
    use DesiredState::*;
    use Operation::*;
    use Phase::*;

    match (phase, desired_state) {
        (Pending, Running) => Some(Provisioning),
        (Pending, Standby) => Some(Provisioning),
        (Pending, Archived) => Some(CreateEmptyArchive),
        (Pending, Deleted) => Some(Deleting),

        (Archived, Running) => Some(Restoring),
        (Archived, Standby) => Some(Restoring),
        (Archived, Archived) => None,
        (Archived, Deleted) => Some(Deleting),

        (Standby, Running) => Some(Starting),
        (Standby, Standby) => None,
        (Standby, Archived) => Some(Archiving),
        (Standby, Deleted) => Some(Deleting),

        // RUNNING → ARCHIVED/DELETED is a two-step plan: stop first, the
        // next tick picks up ARCHIVING/DELETING once phase has settled to
        // STANDBY.
        (Running, Running) => None,
        (Running, Standby) => Some(Stopping),
        (Running, Archived) => Some(Stopping),
        (Running, Deleted) => Some(Stopping),

        // ERROR only ever plans towards DELETED; every other desired_state
        // waits (the retryable-vs-terminal decision for "retry last op"
        // happens before this table is consulted, in `plan`).
        (Error, Deleted) => Some(Deleting),
        (Error, _) => None,

        (Deleting, _) => None,
        (Deleted, _) => None,
    }
}

/// The full Plan decision for one workspace tick.
#[allow(clippy::too_many_arguments)]
pub fn plan(
    phase: Phase,
    operation: Operation,
    op_started_at: Option<DateTime<Utc>>,
    desired_state: DesiredState,
    error_reason: Option<ErrorReason>,
    per_op_timeout: Duration,
    now: DateTime<Utc>,
) -> PlanOutcome {
    if !operation.is_none() {
        let started = op_started_at.unwrap_or(now);
        return if now - started > per_op_timeout {
            PlanOutcome::TimedOut
        } else {
            PlanOutcome::ContinueInFlight
        };
    }

    if let Some(reason) = error_reason {
        if reason.blocks_replan() {
            // A blocking error still lets DELETED through: the user can
            // always tear down a workspace stuck in ERROR.
            return match transition(phase, desired_state) {
                Some(op) if desired_state == DesiredState::Deleted => PlanOutcome::Start(op),
                _ => PlanOutcome::Wait,
            };
        }
    }

    match transition(phase, desired_state) {
        Some(op) => PlanOutcome::Start(op),
        None => PlanOutcome::Wait,
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
