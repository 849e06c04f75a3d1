// SPDX-License-Identifier: MIT

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use wsc_adapters::{ArchiveInfo, ContainerInfo, FakeRuntime, LeaderElection, ObserveAll, Scripted, VolumeInfo};
use wsc_core::{DesiredState, ErrorReason, FakeClock, OpId, Operation, OwnerId};
use wsc_storage::{NewWorkspace, OperationOutcome, PgWorkspaceRepository, WorkspaceRepository};

use super::*;

fn test_db_retry() -> DbRetryPolicy {
    DbRetryPolicy::new(3, Duration::from_millis(1))
}

fn new_workspace() -> NewWorkspace {
    NewWorkspace {
        owner_user_id: OwnerId::new(),
        image_ref: "registry.example.com/base:latest".to_string(),
        home_store_key: "home/test".to_string(),
        desired_state: DesiredState::Running,
    }
}

async fn fake_leader(pool: &PgPool) -> LeaderGuard {
    LeaderElection::new(pool.clone())
        .try_acquire("test")
        .await
        .expect("leader attempt")
        .expect("lock acquired")
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn a_failed_observe_all_marks_every_dimension_unreachable(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace()).await.expect("create");

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push_observe_all(Scripted::Err("agent unreachable".to_string()));

    let ob = ObserverCoordinator::new(repository.clone(), runtime, FakeClock::new(), "default".to_string(), Duration::from_secs(30), test_db_retry());
    let mut leader = fake_leader(&pool).await;
    ob.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.phase, wsc_core::Phase::Pending);
    let container = after.conditions.container_ready.expect("container condition set");
    assert!(!container.status);
    assert_eq!(container.reason, "Unreachable");

    Ok(())
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn a_running_container_and_volume_judge_to_running(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace()).await.expect("create");

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push_observe_all(Scripted::Ok(ObserveAll {
        containers: vec![ContainerInfo {
            workspace_id: ws.id,
            running: true,
            reason: "ContainerRunning".to_string(),
            message: "ok".to_string(),
        }],
        volumes: vec![VolumeInfo {
            workspace_id: ws.id,
            exists: true,
            reason: "VolumeBound".to_string(),
            message: "ok".to_string(),
        }],
        archives: vec![],
    }));

    let ob = ObserverCoordinator::new(repository.clone(), runtime, FakeClock::new(), "default".to_string(), Duration::from_secs(30), test_db_retry());
    let mut leader = fake_leader(&pool).await;
    ob.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.phase, wsc_core::Phase::Running);

    Ok(())
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn a_wc_set_terminal_error_reason_survives_an_observer_tick(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace()).await.expect("create");
    let now = chrono::Utc::now();
    let op_id = OpId::new();

    repository.start_operation(ws.id, Operation::Starting, op_id, now).await.expect("start");
    repository
        .complete_operation(
            ws.id,
            op_id,
            OperationOutcome {
                phase: wsc_core::Phase::Error,
                archive_key: None,
                error_reason: Some(ErrorReason::Timeout),
                error_count: 1,
            },
            now,
        )
        .await
        .expect("complete");

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push_observe_all(Scripted::Ok(ObserveAll::default()));

    let ob = ObserverCoordinator::new(repository.clone(), runtime, FakeClock::new(), "default".to_string(), Duration::from_secs(30), test_db_retry());
    let mut leader = fake_leader(&pool).await;
    ob.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.error_reason, Some(ErrorReason::Timeout), "OB must not clobber a WC-set terminal reason");

    Ok(())
}
