// SPDX-License-Identifier: MIT

//! The reconciliation engine: the Bulk Observer, Workspace Controller, TTL
//! Scheduler, Archive GC and Metrics Collector coordinators, the CDC
//! listener that fans database notifications out to the wake bus and SSE
//! event log, and the per-process activity flusher. `wsc-daemon` owns only
//! process wiring (config, signal handling, `main`); everything that
//! decides *what to do* lives here.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod activity_flusher;
mod cdc;
mod classify;
mod controller;
mod coordinator;
mod execute;
mod gc;
mod metrics;
mod observer;
mod plan;
mod ttl;

pub use activity_flusher::ActivityFlusher;
pub use cdc::CdcListener;
pub use classify::{with_db_retry, DbRetryPolicy};
pub use controller::ControllerCoordinator;
pub use coordinator::{run_coordinator, Coordinator};
pub use execute::{execute_operation, ExecuteResult};
pub use gc::GcCoordinator;
pub use metrics::{Metrics, MetricsCoordinator};
pub use observer::ObserverCoordinator;
pub use plan::{plan, PlanOutcome};
