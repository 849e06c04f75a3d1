// SPDX-License-Identifier: MIT

//! Process-wide context: one of everything (pool, `Runtime` client, wake
//! bus, clock, metrics registry), constructed once in `main` and handed to
//! every coordinator as an `Arc`. No coordinator constructs its own copy of
//! any of these — this is the one place that does.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wsc_adapters::{LeaderElection, Runtime, WakeBus};
use wsc_core::SystemClock;
use wsc_engine::{
    run_coordinator, ActivityFlusher, CdcListener, ControllerCoordinator, Coordinator,
    DbRetryPolicy, GcCoordinator, Metrics, MetricsCoordinator, ObserverCoordinator, TtlCoordinator,
};
use wsc_storage::{ActivityStore, PgActivityStore, PgSseEventLog, PgWorkspaceRepository, SseEventLog, WorkspaceRepository};

use crate::config::Config;

pub struct AppContext {
    pub pool: PgPool,
    pub repository: Arc<dyn WorkspaceRepository>,
    pub runtime: Arc<dyn Runtime>,
    pub activity_store: Arc<dyn ActivityStore>,
    pub event_log: Arc<dyn SseEventLog>,
    pub wake_bus: Arc<WakeBus>,
    pub leader: Arc<LeaderElection>,
    pub metrics: Arc<Metrics>,
    pub clock: SystemClock,
    pub config: Config,
}

impl AppContext {
    pub fn new(pool: PgPool, runtime: Arc<dyn Runtime>, clock: SystemClock, config: Config) -> prometheus::Result<Self> {
        Ok(Self {
            repository: Arc::new(PgWorkspaceRepository::new(pool.clone())),
            activity_store: Arc::new(PgActivityStore::new(pool.clone())),
            event_log: Arc::new(PgSseEventLog::new(pool.clone())),
            wake_bus: Arc::new(WakeBus::new()),
            leader: Arc::new(LeaderElection::new(pool.clone())),
            metrics: Arc::new(Metrics::new()?),
            runtime,
            clock,
            pool,
            config,
        })
    }

    /// Spawn every coordinator, the CDC listener and the activity flusher as
    /// their own Tokio task, all sharing `cancel`. Returns their join
    /// handles; `main` awaits them to know when shutdown has finished.
    pub fn spawn_all(self: &Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for coordinator in self.coordinators() {
            let wake = self.wake_for(coordinator.name());
            handles.push(tokio::spawn(run_coordinator(coordinator, self.leader.clone(), wake, cancel.clone())));
        }

        let cdc = Arc::new(CdcListener::new(self.pool.clone(), self.repository.clone(), self.wake_bus.clone(), self.event_log.clone(), self.config.sse_stream_maxlen));
        handles.push(tokio::spawn(cdc.run(self.leader.clone(), cancel.clone())));

        let flusher = ActivityFlusher::new(self.activity_store.clone(), self.repository.clone(), self.clock.clone(), ACTIVITY_FLUSH_INTERVAL);
        handles.push(tokio::spawn(flusher.run(cancel.clone())));

        handles
    }

    fn coordinators(&self) -> Vec<Arc<dyn Coordinator>> {
        let db_retry = DbRetryPolicy::new(self.config.db_retry_max_attempts, self.config.db_retry_base_delay);
        vec![
            Arc::new(ObserverCoordinator::new(self.repository.clone(), self.runtime.clone(), self.clock.clone(), self.config.cluster_id.clone(), self.config.ob_idle_interval, db_retry)),
            Arc::new(ControllerCoordinator::new(
                self.repository.clone(),
                self.runtime.clone(),
                self.clock.clone(),
                self.config.max_retries,
                self.config.per_op_timeout,
                self.config.wc_active_interval,
                self.config.wc_idle_interval,
                db_retry,
            )),
            Arc::new(TtlCoordinator::new(self.repository.clone(), self.clock.clone(), self.config.ttl_standby, self.config.ttl_archive, self.config.ttl_interval, db_retry)),
            Arc::new(GcCoordinator::new(self.repository.clone(), self.runtime.clone(), self.config.gc_interval, db_retry)),
            Arc::new(MetricsCoordinator::new(self.repository.clone(), self.pool.clone(), self.metrics.clone(), self.config.metrics_interval, db_retry)),
        ]
    }

    /// `None` for coordinators with no wake channel (TTL, METRICS), matching
    /// the wake-bus contract — they run on their interval alone.
    fn wake_for(&self, name: &str) -> Option<tokio::sync::broadcast::Receiver<wsc_adapters::Wake>> {
        match name {
            "ob" => Some(self.wake_bus.subscribe_ob()),
            "wc" => Some(self.wake_bus.subscribe_wc()),
            "gc" => Some(self.wake_bus.subscribe_gc()),
            _ => None,
        }
    }
}

/// The activity flusher has no leader lock and no wake channel; it runs on
/// its own fixed cadence, short enough that `last_access_at` stays close to
/// real time for the TTL scheduler without an UPDATE per proxied request.
const ACTIVITY_FLUSH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
