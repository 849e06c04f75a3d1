// SPDX-License-Identifier: MIT

//! A "dynamic base-class + decorator" pattern, reworked here as one small
//! trait plus one generic loop driver: coordinator-specific behavior is
//! entirely the body of [`Coordinator::tick`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wsc_adapters::{LeaderElection, LeaderGuard, Wake};

/// How long a follower sleeps before retrying `try_acquire` after losing
/// (or never winning) the leader-election race for its lock name.
const FOLLOWER_RETRY: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Short name used in logs and as the wake-bus/metrics label.
    fn name(&self) -> &'static str;

    /// Advisory-lock name this coordinator competes for leadership on.
    fn lock_name(&self) -> &'static str;

    /// How long to sleep between ticks absent a wake. May vary call to
    /// call (the Workspace Controller alternates `WC_ACTIVE`/`WC_IDLE`
    /// depending on whether the previous tick touched any in-flight
    /// operation).
    fn interval(&self) -> Duration;

    /// Run one reconciliation pass. `leader` is the guard this coordinator
    /// currently holds — passed through so a tick can call
    /// `leader.verify_holding()` immediately before a state-mutating step,
    /// for split-brain defense. Coordinators that never
    /// mutate state (e.g. METRICS) simply ignore it.
    async fn tick(&self, leader: &mut LeaderGuard);
}

/// Drive one coordinator forever: alternate between "follower, retrying
/// `try_acquire`" and "leader, ticking on its interval or a wake", until
/// `cancel` fires. Wakes are coalesced — draining the channel before a tick
/// means N wakes queued during one tick only cause one extra tick, not N.
pub async fn run_coordinator(
    coordinator: Arc<dyn Coordinator>,
    leader: Arc<LeaderElection>,
    mut wake: Option<broadcast::Receiver<Wake>>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        match leader.try_acquire(coordinator.lock_name()).await {
            Ok(Some(mut guard)) => {
                info!(coordinator = coordinator.name(), "acquired leader lock");
                run_as_leader(coordinator.as_ref(), &mut guard, wake.as_mut(), &cancel).await;
                info!(coordinator = coordinator.name(), "stepping down");
                if let Err(err) = guard.release().await {
                    warn!(coordinator = coordinator.name(), error = %err, "failed to release leader lock cleanly");
                }
            }
            Ok(None) => {
                sleep_or_cancel(FOLLOWER_RETRY, &cancel).await;
            }
            Err(err) => {
                warn!(coordinator = coordinator.name(), error = %err, "leader election attempt failed");
                sleep_or_cancel(FOLLOWER_RETRY, &cancel).await;
            }
        }
    }
}

async fn run_as_leader(coordinator: &dyn Coordinator, guard: &mut LeaderGuard, mut wake: Option<&mut broadcast::Receiver<Wake>>, cancel: &CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(coordinator.interval()) => {}
            woken = wait_for_wake(wake.as_deref_mut()) => {
                if woken {
                    drain_pending_wakes(wake.as_deref_mut());
                }
            }
        }

        debug!(coordinator = coordinator.name(), "tick");
        coordinator.tick(guard).await;
    }
}

/// Resolves once a wake arrives, or never if this coordinator has no wake
/// channel (TTL, METRICS) — in which case the `select!` above always takes
/// the interval-sleep branch instead.
async fn wait_for_wake(wake: Option<&mut broadcast::Receiver<Wake>>) -> bool {
    match wake {
        Some(rx) => matches!(rx.recv().await, Ok(_) | Err(broadcast::error::RecvError::Lagged(_))),
        None => std::future::pending().await,
    }
}

fn drain_pending_wakes(wake: Option<&mut broadcast::Receiver<Wake>>) {
    if let Some(rx) = wake {
        loop {
            match rx.try_recv() {
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(duration) => {}
    }
}
