// SPDX-License-Identifier: MIT

//! Execute: given the operation Plan decided to start, invoke the single
//! matching Runtime call (or call sequence, for DELETING) and classify the
//! result into something `wsc_engine::controller` can persist.
//!
//! This module never touches the database — it is pure dispatch-and-
//! classify over a [`Runtime`], matching `wsc_core::judge`'s "no I/O" shape
//! one layer up the stack.

use wsc_adapters::{Classify, OpStatus, Runtime, RuntimeError};
use wsc_core::{ErrorReason, OpId, Operation, Workspace};

/// What a single Execute attempt produced, already classified for the
/// caller's Persist step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteResult {
    /// The operation is done; clear it and, if present, persist the new
    /// archive key.
    Completed { archive_key: Option<String> },
    /// Still running on the Runtime side; leave the operation in flight and
    /// retry the same call (same `op_id`) next tick.
    InProgress,
    /// The call failed or was rejected. `error_reason.is_terminal()`
    /// decides whether the caller clears the operation immediately or
    /// keeps retrying against the error budget.
    Failed { error_reason: ErrorReason },
}

fn from_op_status(status: OpStatus) -> ExecuteResult {
    if status.is_done() {
        ExecuteResult::Completed { archive_key: None }
    } else {
        ExecuteResult::InProgress
    }
}

/// Runtime rejections don't carry a structured code over the wire (see
/// `RuntimeError::Rejected`'s doc comment in `wsc-adapters`) — the agent
/// encodes the reason as a short token in the message body, which this
/// recognizes the same small set of tokens a real agent would emit for a
/// permanent failure. Anything else rejected falls back to the generic
/// retryable `ActionFailed`.
fn classify_rejection(message: &str) -> ErrorReason {
    if message.contains("image_pull_failed") {
        ErrorReason::ImagePullFailed
    } else if message.contains("archive_corrupted") {
        ErrorReason::ArchiveCorrupted
    } else if message.contains("data_lost") {
        ErrorReason::DataLost
    } else {
        ErrorReason::ActionFailed
    }
}

fn classify_runtime_error(err: &RuntimeError) -> ErrorReason {
    if err.is_retryable() {
        return ErrorReason::Unreachable;
    }
    match err {
        RuntimeError::Rejected(message) => classify_rejection(message),
        _ => ErrorReason::ActionFailed,
    }
}

/// Run the Runtime call(s) for `operation` and classify the outcome.
pub async fn execute_operation(runtime: &dyn Runtime, workspace: &Workspace, operation: Operation, op_id: OpId) -> ExecuteResult {
    let outcome = run(runtime, workspace, operation, op_id).await;
    match outcome {
        Ok(result) => result,
        Err(err) => ExecuteResult::Failed {
            error_reason: classify_runtime_error(&err),
        },
    }
}

async fn run(runtime: &dyn Runtime, workspace: &Workspace, operation: Operation, op_id: OpId) -> wsc_adapters::Result<ExecuteResult> {
    match operation {
        Operation::Provisioning => runtime.create_volume(workspace.id, op_id).await.map(from_op_status),

        Operation::Starting => runtime.start_container(workspace.id, op_id, &workspace.image_ref).await.map(from_op_status),

        Operation::Stopping => runtime.stop_container(workspace.id, op_id).await.map(from_op_status),

        Operation::Restoring => {
            let archive_key = workspace.archive_key.as_deref().unwrap_or_default();
            let result = runtime.run_restore(workspace.id, op_id, archive_key).await?;
            Ok(classify_run_result(result.status, result.exit_code, None))
        }

        Operation::Archiving | Operation::CreateEmptyArchive => {
            let result = runtime.run_archive(workspace.id, op_id).await?;
            Ok(classify_run_result(result.status, result.exit_code, result.archive_key))
        }

        // Sequential within the same op_id: the volume delete only runs once
        // the container delete has actually finished, same as a two-step
        // shell script would do it.
        Operation::Deleting => {
            let container = runtime.delete_container(workspace.id, op_id).await?;
            if !container.is_done() {
                return Ok(ExecuteResult::InProgress);
            }
            let volume = runtime.delete_volume(workspace.id, op_id).await?;
            Ok(from_op_status(volume))
        }

        // Plan never emits `Start(Operation::None)`; reaching this means a
        // caller invoked Execute out of turn.
        Operation::None => Ok(ExecuteResult::Failed {
            error_reason: ErrorReason::ActionFailed,
        }),
    }
}

fn classify_run_result(status: OpStatus, exit_code: i32, archive_key: Option<String>) -> ExecuteResult {
    if !status.is_done() {
        return ExecuteResult::InProgress;
    }
    if exit_code == 0 {
        ExecuteResult::Completed { archive_key }
    } else {
        ExecuteResult::Failed {
            error_reason: ErrorReason::ActionFailed,
        }
    }
}

#[cfg(test)]
#[path = "execute_tests.rs"]
mod tests;
