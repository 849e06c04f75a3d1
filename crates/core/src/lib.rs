// SPDX-License-Identifier: MIT

//! Domain types for the workspace orchestrator control plane.
//!
//! This crate holds everything that can be reasoned about without I/O:
//! identifiers, the workspace record shape, the condition/phase/operation
//! enums, and the `judge` function that derives a phase from conditions.
//! Nothing here talks to Postgres, the wake bus, or the Runtime capability —
//! that belongs to `wsc-storage`, `wsc-adapters` and `wsc-engine`.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod clock;
mod conditions;
mod error_code;
mod error_reason;
mod ids;
mod judge;
mod operation;
mod phase;
mod workspace;

pub use clock::{Clock, FakeClock, SystemClock};
pub use conditions::{ConditionKey, ConditionStatus, Conditions};
pub use error_code::{ErrorBody, ErrorCode, ErrorDetail};
pub use error_reason::ErrorReason;
pub use ids::{OpId, OwnerId, WorkspaceId};
pub use judge::{judge, JudgeOutput};
pub use operation::{DesiredState, Operation};
pub use phase::Phase;
pub use workspace::Workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
