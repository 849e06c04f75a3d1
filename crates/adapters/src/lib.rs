// SPDX-License-Identifier: MIT

//! Adapters to the outside world: the Runtime capability (containers,
//! volumes, archives), Postgres advisory-lock leader election, and the
//! wake-bus pub/sub that couples database change notifications to
//! coordinator loops.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod http_runtime;
mod leader;
mod runtime;
mod wake_bus;

#[cfg(any(test, feature = "test-support"))]
mod fake_runtime;

pub use http_runtime::HttpRuntime;
pub use leader::{LeaderElection, LeaderError, LeaderGuard};
pub use runtime::{
    ArchiveInfo, ArchiveResult, Classify, ContainerInfo, GcResult, ObserveAll, OpStatus, Result,
    RestoreResult, Runtime, RuntimeError, VolumeInfo,
};
pub use wake_bus::{Wake, WakeBus};

#[cfg(any(test, feature = "test-support"))]
pub use fake_runtime::{FakeRuntime, RecordedCall, Scripted};
