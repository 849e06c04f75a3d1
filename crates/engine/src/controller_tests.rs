// SPDX-License-Identifier: MIT

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use wsc_adapters::{FakeRuntime, LeaderElection, OpStatus, Scripted};
use wsc_core::{DesiredState, ErrorReason, FakeClock, OpId, Operation, OwnerId, Phase};
use wsc_storage::{NewWorkspace, PgWorkspaceRepository, WorkspaceRepository};

use super::*;

fn new_workspace(desired_state: DesiredState) -> NewWorkspace {
    NewWorkspace {
        owner_user_id: OwnerId::new(),
        image_ref: "registry.example.com/base:latest".to_string(),
        home_store_key: "home/test".to_string(),
        desired_state,
    }
}

async fn fake_leader(pool: &PgPool) -> LeaderGuard {
    LeaderElection::new(pool.clone()).try_acquire("test").await.expect("leader attempt").expect("lock acquired")
}

fn controller(repository: Arc<dyn WorkspaceRepository>, runtime: Arc<dyn Runtime>) -> ControllerCoordinator<FakeClock> {
    ControllerCoordinator::new(
        repository,
        runtime,
        FakeClock::new(),
        3,
        ChronoDuration::seconds(300),
        Duration::from_secs(2),
        Duration::from_secs(30),
        DbRetryPolicy::new(3, Duration::from_millis(1)),
    )
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn a_pending_workspace_plans_and_completes_provisioning(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace(DesiredState::Running)).await.expect("create");

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push_volume_status(Scripted::Ok(OpStatus::Completed));

    let wc = controller(repository.clone(), runtime.clone() as Arc<dyn Runtime>);
    let mut leader = fake_leader(&pool).await;
    wc.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.operation, Operation::None, "a completed operation must clear");
    assert!(after.op_id.is_none());

    Ok(())
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn an_in_progress_runtime_call_keeps_the_same_op_id_across_ticks(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace(DesiredState::Running)).await.expect("create");

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push_volume_status(Scripted::Ok(OpStatus::InProgress));
    runtime.push_volume_status(Scripted::Ok(OpStatus::Completed));

    let wc = controller(repository.clone(), runtime.clone() as Arc<dyn Runtime>);
    let mut leader = fake_leader(&pool).await;

    wc.tick(&mut leader).await;
    let mid = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(mid.operation, Operation::Provisioning);
    let op_id_first = mid.op_id.expect("op_id set while in flight");

    wc.tick(&mut leader).await;
    let calls = runtime.calls();
    assert_eq!(calls[0].op_id, Some(op_id_first));
    assert_eq!(calls[1].op_id, Some(op_id_first), "a retried call must reuse the same op_id");

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.operation, Operation::None);

    Ok(())
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn archiving_success_sets_phase_archived_without_waiting_for_observer(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace(DesiredState::Archived)).await.expect("create");
    let now = chrono::Utc::now();

    // Seed STANDBY so plan picks ARCHIVING for desired_state=ARCHIVED.
    repository
        .observe(
            ws.id,
            &wsc_core::Conditions {
                volume_ready: Some(wsc_core::ConditionStatus::new(true, "VolumeBound", "ok", now)),
                ..Default::default()
            },
            Phase::Standby,
            None,
            now,
        )
        .await
        .expect("seed observe");

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push_archive_result(Scripted::Ok(wsc_adapters::ArchiveResult {
        status: OpStatus::Completed,
        exit_code: 0,
        logs: String::new(),
        archive_key: Some("default/ws/op-1/home.tar.zst".to_string()),
    }));

    let wc = controller(repository.clone(), runtime as Arc<dyn Runtime>);
    let mut leader = fake_leader(&pool).await;
    wc.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.phase, Phase::Archived);
    assert_eq!(after.archive_key.as_deref(), Some("default/ws/op-1/home.tar.zst"));

    Ok(())
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn a_terminal_failure_clears_the_operation_without_retrying(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace(DesiredState::Running)).await.expect("create");

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push_volume_status(Scripted::Err("disk full: data_lost".to_string()));

    let wc = controller(repository.clone(), runtime as Arc<dyn Runtime>);
    let mut leader = fake_leader(&pool).await;
    wc.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.operation, Operation::None);
    assert_eq!(after.error_reason, Some(ErrorReason::DataLost));

    Ok(())
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn a_retryable_failure_under_budget_keeps_the_operation_live(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace(DesiredState::Running)).await.expect("create");

    let runtime = Arc::new(FakeRuntime::new());
    runtime.push_volume_status(Scripted::Err("agent unreachable".to_string()));

    let wc = controller(repository.clone(), runtime as Arc<dyn Runtime>);
    let mut leader = fake_leader(&pool).await;
    wc.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.operation, Operation::Provisioning, "a retryable failure under budget must not clear the operation");
    assert_eq!(after.error_reason, Some(ErrorReason::ActionFailed));
    assert_eq!(after.error_count, 1);

    Ok(())
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn exhausting_the_retry_budget_clears_the_operation_with_retry_exceeded(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace(DesiredState::Running)).await.expect("create");

    let runtime = Arc::new(FakeRuntime::new());
    for _ in 0..3 {
        runtime.push_volume_status(Scripted::Err("agent unreachable".to_string()));
    }

    let wc = controller(repository.clone(), runtime as Arc<dyn Runtime>);
    let mut leader = fake_leader(&pool).await;

    wc.tick(&mut leader).await;
    wc.tick(&mut leader).await;
    wc.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.operation, Operation::None, "the retry budget must eventually clear the operation");
    assert_eq!(after.error_reason, Some(ErrorReason::RetryExceeded));
    assert_eq!(after.error_count, 3);

    Ok(())
}

#[sqlx::test(migrator = "wsc_storage::MIGRATOR")]
async fn a_timed_out_operation_is_cleared_without_a_runtime_call(pool: PgPool) -> sqlx::Result<()> {
    let repository: Arc<dyn WorkspaceRepository> = Arc::new(PgWorkspaceRepository::new(pool.clone()));
    let ws = repository.create(new_workspace(DesiredState::Running)).await.expect("create");
    let op_id = OpId::new();
    let started_at = chrono::Utc::now() - ChronoDuration::seconds(600);
    repository.start_operation(ws.id, Operation::Provisioning, op_id, started_at).await.expect("start");

    let runtime = Arc::new(FakeRuntime::new());
    let wc = controller(repository.clone(), runtime.clone() as Arc<dyn Runtime>);
    let mut leader = fake_leader(&pool).await;
    wc.tick(&mut leader).await;

    let after = repository.get(ws.id).await.expect("get").expect("exists");
    assert_eq!(after.operation, Operation::None);
    assert_eq!(after.error_reason, Some(ErrorReason::Timeout));
    assert!(runtime.calls().is_empty(), "a timed-out operation must not invoke the Runtime at all");

    Ok(())
}

