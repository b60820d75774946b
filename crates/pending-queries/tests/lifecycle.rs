use std::sync::Arc;
use std::time::Duration;

use gasoline_pending_queries::{
    NewQuery, QueriesCfg, QueryError, QueryRegistry, QueryState, Transition,
};
use serde_json::json;

fn registry() -> Arc<QueryRegistry> {
    Arc::new(QueryRegistry::default())
}

#[test]
fn take_is_fifo_per_type_and_tab() {
    let reg = registry();
    let a = reg.create(NewQuery::new("dom", json!({"n": 1})).on_tab(3), None, "c").expect("a");
    let b = reg.create(NewQuery::new("a11y", json!({})), None, "c").expect("b");
    let c = reg.create(NewQuery::new("dom", json!({"n": 2})).on_tab(4), None, "c").expect("c");

    assert_eq!(reg.take("dom", 4).map(|q| q.correlation_id), Some(c.correlation_id));
    assert_eq!(reg.take("dom", 0).map(|q| q.correlation_id), Some(a.correlation_id.clone()));
    assert!(reg.take("dom", 0).is_none());
    assert_eq!(reg.take("a11y", 99).map(|q| q.correlation_id), Some(b.correlation_id));
    assert_eq!(
        reg.status(&a.correlation_id, "c").expect("status").state,
        QueryState::Taken
    );
}

#[test]
fn generated_ids_are_unique_and_explicit_ids_are_kept() {
    let reg = registry();
    let first = reg.create(NewQuery::new("dom", json!({})), None, "c").expect("first");
    let second = reg.create(NewQuery::new("dom", json!({})), None, "c").expect("second");
    assert_ne!(first.correlation_id, second.correlation_id);
    assert!(first.correlation_id.starts_with("q-"));

    let mut named = NewQuery::new("dom", json!({}));
    named.correlation_id = Some("custom-1".into());
    reg.create(named.clone(), None, "c").expect("named");
    assert_eq!(
        reg.create(named, None, "c"),
        Err(QueryError::DuplicateId("custom-1".into()))
    );
}

#[test]
fn completion_is_idempotent() {
    let reg = registry();
    let q = reg.create(NewQuery::new("dom", json!({})), None, "c").expect("create");
    assert_eq!(
        reg.set_result(&q.correlation_id, json!({"html": "<p>"})),
        Ok(Transition::Applied(QueryState::Completed))
    );
    assert_eq!(
        reg.set_result(&q.correlation_id, json!("again")),
        Ok(Transition::AlreadyTerminal(QueryState::Completed))
    );
    assert_eq!(
        reg.fail(&q.correlation_id, "late failure"),
        Ok(Transition::AlreadyTerminal(QueryState::Completed))
    );
    let snapshot = reg.status(&q.correlation_id, "c").expect("status");
    assert_eq!(snapshot.result, Some(json!({"html": "<p>"})));
    assert_eq!(reg.completed().len(), 1);
}

#[test]
fn other_clients_cannot_see_queries() {
    let reg = registry();
    let q = reg.create(NewQuery::new("dom", json!({})), None, "alice").expect("create");
    assert!(reg.status(&q.correlation_id, "alice").is_ok());
    assert_eq!(
        reg.status(&q.correlation_id, "bob"),
        Err(QueryError::NotFound(q.correlation_id.clone()))
    );
}

#[test]
fn per_client_cap_returns_queue_full() {
    let reg = QueryRegistry::new(QueriesCfg {
        per_client_limit: 2,
        ..QueriesCfg::default()
    });
    reg.create(NewQuery::new("dom", json!({})), None, "c").expect("1");
    reg.create(NewQuery::new("dom", json!({})), None, "c").expect("2");
    assert!(matches!(
        reg.create(NewQuery::new("dom", json!({})), None, "c"),
        Err(QueryError::QueueFull(_))
    ));
    reg.create(NewQuery::new("dom", json!({})), None, "other").expect("other client");
}

#[test]
fn total_bound_evicts_oldest_terminal_first() {
    let reg = QueryRegistry::new(QueriesCfg {
        max_entries: 2,
        ..QueriesCfg::default()
    });
    let done = reg.create(NewQuery::new("dom", json!({})), None, "c").expect("1");
    reg.set_result(&done.correlation_id, json!(1)).expect("complete");
    reg.create(NewQuery::new("dom", json!({})), None, "c").expect("2");
    reg.create(NewQuery::new("dom", json!({})), None, "c").expect("3 evicts terminal");
    assert!(reg.status(&done.correlation_id, "c").is_err());
    assert!(matches!(
        reg.create(NewQuery::new("dom", json!({})), None, "c"),
        Err(QueryError::QueueFull(_))
    ));
}

#[test]
fn extension_statuses_are_normalised() {
    let reg = registry();
    let q = reg.create(NewQuery::new("exec", json!({})), None, "c").expect("create");
    assert_eq!(
        reg.apply_status(&q.correlation_id, "still_processing", None, None),
        Ok(Transition::StillPending)
    );
    assert_eq!(
        reg.apply_status(&q.correlation_id, "canceled", None, None),
        Ok(Transition::Applied(QueryState::Failed))
    );
    let snapshot = reg.status(&q.correlation_id, "c").expect("status");
    assert_eq!(snapshot.error.as_deref(), Some("cancelled"));
    assert_eq!(reg.failed().len(), 1);
}

#[test]
fn expire_all_finishes_open_queries() {
    let reg = registry();
    let q = reg.create(NewQuery::new("dom", json!({})), None, "c").expect("create");
    assert_eq!(reg.expire_all("extension disconnected"), 1);
    let snapshot = reg.status(&q.correlation_id, "c").expect("status");
    assert_eq!(snapshot.state, QueryState::Expired);
    assert_eq!(snapshot.error.as_deref(), Some("extension disconnected"));
    assert_eq!(reg.queue_depth(), 0);
}

#[tokio::test]
async fn wait_returns_when_result_arrives() {
    let reg = registry();
    let q = reg.create(NewQuery::new("dom", json!({})), None, "c").expect("create");
    let id = q.correlation_id.clone();
    let completer = Arc::clone(&reg);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        completer.set_result(&id, json!("done")).expect("complete");
    });
    let snapshot = reg
        .wait(&q.correlation_id, "c", Duration::from_secs(5))
        .await
        .expect("wait");
    assert_eq!(snapshot.state, QueryState::Completed);
    assert_eq!(snapshot.result, Some(json!("done")));
}

#[tokio::test]
async fn wait_times_out_without_result() {
    let reg = registry();
    let q = reg.create(NewQuery::new("dom", json!({})), None, "c").expect("create");
    let snapshot = reg
        .wait(&q.correlation_id, "c", Duration::from_millis(20))
        .await
        .expect("wait");
    assert_eq!(snapshot.state, QueryState::Queued);
    assert_eq!(snapshot.queue_position, Some(0));
}

#[tokio::test]
async fn overdue_query_expires_on_wait_without_sweeper() {
    let reg = registry();
    let q = reg
        .create(NewQuery::new("dom", json!({})), Some(Duration::from_millis(100)), "c")
        .expect("create");
    tokio::time::sleep(Duration::from_millis(150)).await;

    let started = std::time::Instant::now();
    let snapshot = reg
        .wait(&q.correlation_id, "c", Duration::from_secs(2))
        .await
        .expect("wait");
    assert_eq!(snapshot.state, QueryState::Expired);
    assert_eq!(snapshot.error.as_deref(), Some("timeout"));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(reg.queue_depth(), 0);
}

#[tokio::test]
async fn wait_is_bounded_by_the_query_deadline() {
    let reg = registry();
    let q = reg
        .create(NewQuery::new("dom", json!({})), Some(Duration::from_millis(50)), "c")
        .expect("create");

    let started = std::time::Instant::now();
    let snapshot = reg
        .wait(&q.correlation_id, "c", Duration::from_secs(2))
        .await
        .expect("wait");
    assert_eq!(snapshot.state, QueryState::Expired);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn status_expires_overdue_query() {
    let reg = registry();
    let q = reg
        .create(NewQuery::new("dom", json!({})), Some(Duration::from_millis(20)), "c")
        .expect("create");
    assert_eq!(reg.status(&q.correlation_id, "c").expect("status").state, QueryState::Queued);
    tokio::time::sleep(Duration::from_millis(40)).await;
    let snapshot = reg.status(&q.correlation_id, "c").expect("status");
    assert_eq!(snapshot.state, QueryState::Expired);
    assert!(reg.take("dom", 0).is_none());
}

#[tokio::test]
async fn sweeper_expires_overdue_queries() {
    let reg = Arc::new(QueryRegistry::new(QueriesCfg {
        sweep_interval_ms: 10,
        ..QueriesCfg::default()
    }));
    let q = reg
        .create(NewQuery::new("dom", json!({})), Some(Duration::from_millis(20)), "c")
        .expect("create");
    let sweeper = reg.spawn_sweeper();
    let snapshot = reg
        .wait(&q.correlation_id, "c", Duration::from_secs(5))
        .await
        .expect("wait");
    assert_eq!(snapshot.state, QueryState::Expired);
    sweeper.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn long_poll_wakes_on_new_query() {
    let reg = registry();
    let producer = Arc::clone(&reg);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        producer
            .create(NewQuery::new("dom", json!({})), None, "c")
            .expect("create");
    });
    let taken = reg.wait_for_pending("dom", 0, Duration::from_secs(5)).await;
    assert!(taken.is_some());
    assert!(reg.wait_for_pending("dom", 0, Duration::from_millis(10)).await.is_none());
}
