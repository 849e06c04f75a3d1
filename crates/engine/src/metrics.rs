// SPDX-License-Identifier: MIT

//! The Metrics Collector: ambient observability, not a reconciliation
//! participant. Runs under its own leader lock like every other
//! coordinator, but never writes to the `workspaces` table — it only
//! refreshes gauges from what the other coordinators have already written.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};
use sqlx::PgPool;
use tracing::warn;
use wsc_adapters::LeaderGuard;
use wsc_core::{Operation, Phase};
use wsc_storage::WorkspaceRepository;

use crate::classify::DbRetryPolicy;
use crate::coordinator::Coordinator;

pub struct Metrics {
    pub registry: Registry,
    workspace_count: IntGaugeVec,
    operation_count: IntGaugeVec,
    db_pool_in_use: IntGauge,
    db_pool_idle: IntGauge,
    db_up: IntGauge,
}

impl Metrics {
    /// Fallible because `prometheus::Registry::register` can reject a
    /// duplicate metric name — not expected to ever happen with this
    /// crate's fixed, hardcoded gauge set, but propagated rather than
    /// unwrapped so a future naming collision fails `main` loudly at
    /// startup instead of panicking mid-tick.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let workspace_count = IntGaugeVec::new(Opts::new("workspace_count", "Live workspaces grouped by phase"), &["phase"])?;
        let operation_count = IntGaugeVec::new(Opts::new("workspace_operation_count", "Workspaces with an operation in flight, grouped by operation"), &["operation"])?;
        let db_pool_in_use = IntGauge::new("db_pool_in_use", "Postgres connections currently checked out of the pool")?;
        let db_pool_idle = IntGauge::new("db_pool_idle", "Postgres connections idle in the pool")?;
        let db_up = IntGauge::new("db_up", "1 if the last metrics tick reached Postgres, 0 otherwise")?;

        registry.register(Box::new(workspace_count.clone()))?;
        registry.register(Box::new(operation_count.clone()))?;
        registry.register(Box::new(db_pool_in_use.clone()))?;
        registry.register(Box::new(db_pool_idle.clone()))?;
        registry.register(Box::new(db_up.clone()))?;

        Ok(Self {
            registry,
            workspace_count,
            operation_count,
            db_pool_in_use,
            db_pool_idle,
            db_up,
        })
    }
}

pub struct MetricsCoordinator {
    repository: Arc<dyn WorkspaceRepository>,
    pool: PgPool,
    metrics: Arc<Metrics>,
    interval: StdDuration,
    db_retry: DbRetryPolicy,
}

impl MetricsCoordinator {
    pub fn new(repository: Arc<dyn WorkspaceRepository>, pool: PgPool, metrics: Arc<Metrics>, interval: StdDuration, db_retry: DbRetryPolicy) -> Self {
        Self {
            repository,
            pool,
            metrics,
            interval,
            db_retry,
        }
    }
}

#[async_trait]
impl Coordinator for MetricsCoordinator {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn lock_name(&self) -> &'static str {
        "metrics"
    }

    fn interval(&self) -> StdDuration {
        self.interval
    }

    async fn tick(&self, _leader: &mut LeaderGuard) {
        let by_phase = self.db_retry.run(|| self.repository.count_by_phase()).await;
        let by_operation = self.db_retry.run(|| self.repository.count_by_operation()).await;

        match (by_phase, by_operation) {
            (Ok(by_phase), Ok(by_operation)) => {
                reset_to_zero(&self.metrics.workspace_count, ALL_LIVE_PHASES.iter().map(phase_label));
                for (phase, count) in by_phase {
                    self.metrics.workspace_count.with_label_values(&[phase_label(&phase)]).set(count);
                }

                reset_to_zero(&self.metrics.operation_count, ALL_OPERATIONS.iter().map(operation_label));
                for (operation, count) in by_operation {
                    self.metrics.operation_count.with_label_values(&[operation_label(&operation)]).set(count);
                }

                self.metrics.db_up.set(1);
            }
            _ => {
                warn!("metrics: failed to refresh workspace gauges, marking db_up=0 this tick");
                self.metrics.db_up.set(0);
            }
        }

        self.metrics.db_pool_in_use.set(i64::from(self.pool.size()));
        self.metrics.db_pool_idle.set(self.pool.num_idle() as i64);
    }
}

const ALL_LIVE_PHASES: [Phase; 5] = [Phase::Pending, Phase::Archived, Phase::Standby, Phase::Running, Phase::Error];

const ALL_OPERATIONS: [Operation; 7] = [
    Operation::Provisioning,
    Operation::Restoring,
    Operation::Starting,
    Operation::Stopping,
    Operation::Archiving,
    Operation::CreateEmptyArchive,
    Operation::Deleting,
];

fn phase_label(phase: &Phase) -> &'static str {
    match phase {
        Phase::Pending => "pending",
        Phase::Archived => "archived",
        Phase::Standby => "standby",
        Phase::Running => "running",
        Phase::Error => "error",
        Phase::Deleting => "deleting",
        Phase::Deleted => "deleted",
    }
}

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::None => "none",
        Operation::Provisioning => "provisioning",
        Operation::Restoring => "restoring",
        Operation::Starting => "starting",
        Operation::Stopping => "stopping",
        Operation::Archiving => "archiving",
        Operation::CreateEmptyArchive => "create_empty_archive",
        Operation::Deleting => "deleting",
    }
}

/// Gauges only grow rows the last query returned; zero out every known
/// label first so a phase/operation that dropped to zero workspaces doesn't
/// keep reporting its last nonzero value forever.
fn reset_to_zero<'a>(vec: &IntGaugeVec, labels: impl Iterator<Item = &'a str>) {
    for label in labels {
        vec.with_label_values(&[label]).set(0);
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
