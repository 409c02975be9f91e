//! End-to-end tests for the scheduler, tracker and administrator surface
//! on a SQLite-backed task store.

mod common;

use common::{wait_until, TestEnv, FAILING_TYPE_KEY, SUCCEEDING_TYPE_KEY};
use schedule_task_server::schedule_tasks::{AdminError, RunOutcome};
use schedule_task_server::task_store::{ScheduleTaskDescriptor, SqliteTaskStore, TaskStore};
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_scheduled_run_is_persisted() {
    let mut env = TestEnv::new(vec![ScheduleTaskDescriptor::new(
        "t1",
        "Succeeding",
        SUCCEEDING_TYPE_KEY,
        60,
    )]);

    env.scheduler.start();
    let store = env.store.clone();
    assert!(wait_until(|| store.get("t1").unwrap().last_success_utc.is_some()).await);
    env.scheduler.stop().await;

    // Reopen the database to check what was written
    let reopened = SqliteTaskStore::new(&env.db_path).unwrap();
    let stored = reopened.get("t1").unwrap();
    assert!(stored.last_start_utc.unwrap() <= stored.last_success_utc.unwrap());
    assert!(stored.last_non_success_end_utc.is_none());
    assert_eq!(env.succeeded.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mixed_tasks_scenario() {
    let mut env = TestEnv::new(vec![
        ScheduleTaskDescriptor::new("t1", "Succeeding", SUCCEEDING_TYPE_KEY, 60),
        ScheduleTaskDescriptor::new("t2", "Orphan", "unregistered", 60),
        ScheduleTaskDescriptor::new("t3", "Failing", FAILING_TYPE_KEY, 1).with_stop_on_error(true),
    ]);

    env.scheduler.start();
    let store = env.store.clone();
    assert!(
        wait_until(|| {
            let t1 = store.get("t1").unwrap();
            let t3 = store.get("t3").unwrap();
            t1.last_success_utc.is_some() && !t3.enabled
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(1200)).await;
    env.scheduler.stop().await;

    let t2 = env.store.get("t2").unwrap();
    assert!(t2.last_start_utc.is_none());
    assert!(t2.last_success_utc.is_none());
    assert!(t2.last_non_success_end_utc.is_none());

    let t3 = env.store.get("t3").unwrap();
    assert!(!t3.enabled);
    assert!(t3.last_non_success_end_utc.unwrap() >= t3.last_start_utc.unwrap());
    assert_eq!(env.failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reenabled_task_is_picked_up_again() {
    let mut env = TestEnv::new(vec![ScheduleTaskDescriptor::new(
        "t3",
        "Failing",
        FAILING_TYPE_KEY,
        1,
    )
    .with_stop_on_error(true)]);

    env.scheduler.start();
    let store = env.store.clone();
    assert!(wait_until(|| !store.get("t3").unwrap().enabled).await);

    let mut edit = env.store.get("t3").unwrap();
    edit.enabled = true;
    env.admin.update(&edit).unwrap();

    let failed = env.failed.clone();
    assert!(wait_until(|| failed.load(Ordering::SeqCst) >= 2).await);
    env.scheduler.stop().await;

    assert!(!env.store.get("t3").unwrap().enabled);
}

#[tokio::test]
async fn test_run_now_on_disabled_task() {
    let env = TestEnv::new(vec![ScheduleTaskDescriptor::new(
        "t1",
        "Succeeding",
        SUCCEEDING_TYPE_KEY,
        3600,
    )
    .with_enabled(false)]);

    let outcome = env.admin.run_now("t1").await.unwrap();
    assert_eq!(outcome, RunOutcome::Success);

    let info = env.admin.get("t1").unwrap();
    assert!(!info.task.enabled);
    assert!(!info.is_running);
    assert!(info.next_run_at.is_none());
    assert!(info.task.last_success_utc.is_some());
}

#[tokio::test]
async fn test_run_now_unregistered_and_missing() {
    let env = TestEnv::new(vec![ScheduleTaskDescriptor::new(
        "t2",
        "Orphan",
        "unregistered",
        60,
    )]);

    assert_eq!(
        env.admin.run_now("t2").await.unwrap(),
        RunOutcome::ImplementationMissing("unregistered".to_string())
    );
    assert!(matches!(
        env.admin.run_now("missing").await,
        Err(AdminError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_run_now_calls() {
    let env = TestEnv::new(vec![ScheduleTaskDescriptor::new(
        "t1",
        "Succeeding",
        SUCCEEDING_TYPE_KEY,
        60,
    )]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let admin = env.admin.clone();
        handles.push(tokio::spawn(async move { admin.run_now("t1").await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            RunOutcome::Success => successes += 1,
            RunOutcome::AlreadyRunning => {}
            other => panic!("Unexpected outcome: {:?}", other),
        }
    }

    // Every execution corresponds to exactly one successful run
    assert!(successes >= 1);
    assert_eq!(env.succeeded.load(Ordering::SeqCst), successes);
    assert!(env.tracker.running_task_ids().is_empty());
}

#[tokio::test]
async fn test_admin_crud_round_trip() {
    let env = TestEnv::new(Vec::new());

    let created = env
        .admin
        .create(&ScheduleTaskDescriptor::new("", "Created", SUCCEEDING_TYPE_KEY, 120))
        .unwrap();

    let listed = env.admin.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].task, created);

    env.admin.delete(&created.id).unwrap();
    assert!(env.admin.list().unwrap().is_empty());
}
