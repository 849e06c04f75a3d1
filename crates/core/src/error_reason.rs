// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Classification of the last operation failure on a workspace.
///
/// A fixed subset ([`ErrorReason::is_terminal`]) is terminal: the controller
/// never retries automatically and waits for the user to change
/// `desired_state` before attempting anything further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "error_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    Timeout,
    RetryExceeded,
    ActionFailed,
    DataLost,
    Unreachable,
    ImagePullFailed,
    ContainerWithoutVolume,
    ArchiveCorrupted,
}

impl ErrorReason {
    /// Terminal error reasons require user intervention; the controller will
    /// not automatically retry the operation that produced them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ErrorReason::Timeout
                | ErrorReason::DataLost
                | ErrorReason::ImagePullFailed
                | ErrorReason::ContainerWithoutVolume
                | ErrorReason::ArchiveCorrupted
        )
    }

    /// Retryable error reasons keep the operation live; the controller will
    /// retry on the next tick, up to the configured retry budget.
    pub fn is_retryable(self) -> bool {
        !self.is_terminal()
    }

    /// Whether Plan should refuse to start a new operation while this reason
    /// is set, waiting instead for the user to change `desired_state`.
    ///
    /// `RetryExceeded` is not part of the `ErrorReason` enum's formally
    /// "terminal" subset (it is reached only after exhausting the retry
    /// budget on an otherwise-retryable failure), but it's still explicit
    /// that it also "requires user intervention" — so it blocks Plan the
    /// same way a terminal reason does. See DESIGN.md for this resolution.
    pub fn blocks_replan(self) -> bool {
        self.is_terminal() || matches!(self, ErrorReason::RetryExceeded)
    }
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorReason::Timeout => "Timeout",
            ErrorReason::RetryExceeded => "RetryExceeded",
            ErrorReason::ActionFailed => "ActionFailed",
            ErrorReason::DataLost => "DataLost",
            ErrorReason::Unreachable => "Unreachable",
            ErrorReason::ImagePullFailed => "ImagePullFailed",
            ErrorReason::ContainerWithoutVolume => "ContainerWithoutVolume",
            ErrorReason::ArchiveCorrupted => "ArchiveCorrupted",
        };
        f.write_str(s)
    }
}
