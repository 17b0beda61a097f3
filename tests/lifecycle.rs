//! Lifecycle scenarios for the supervision loop: connect, pair, recycle.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{
    activate, phase_of, quick_config, test_release, wait_until, Counters, MockAdapter,
    RecordingHandler,
};
use overseer::{Config, EventKind, Overseer, PairPid, Phase, Telemetry};

fn start(
    adapter: std::sync::Arc<MockAdapter>,
    cfg: Config,
) -> (Overseer, Counters) {
    let counters = Counters::default();
    let overseer = Overseer::start(
        RecordingHandler::new(counters.clone()),
        adapter,
        test_release(),
        cfg,
    )
    .expect("overseer starts");
    (overseer, counters)
}

#[tokio::test]
async fn happy_path_simple_pool() {
    let adapter = MockAdapter::new();
    let cfg = Config {
        max_nodes: 2,
        conn_timeout: Duration::from_secs(5),
        pair_timeout: Duration::from_secs(5),
        ..quick_config()
    };
    let (overseer, counters) = start(adapter.clone(), cfg);

    let labor = overseer
        .start_child()
        .await
        .unwrap()
        .expect("spawned labor");
    assert!(labor.name.starts_with("w-"));
    assert_eq!(labor.phase, Phase::Connecting);

    overseer.node_up(&labor.name);
    let pushes = &adapter.pushes;
    wait_until("release pushed", || async move {
        pushes.load(Ordering::SeqCst) >= 1
    })
    .await;

    overseer
        .pair(&labor.name, PairPid::new(&labor.name, 1))
        .await
        .expect("pair accepted");

    let o = &overseer;
    let n = labor.name.as_str();
    wait_until("worker active", || async move {
        phase_of(o, n).await == Some(Phase::Active)
    })
    .await;

    overseer.telemetry(Telemetry::new(&labor.name, serde_json::json!({"cpu": 0.4})));
    overseer.telemetry(Telemetry::new(&labor.name, serde_json::json!({"cpu": 0.9})));
    let telemetry = &counters.telemetry;
    wait_until("telemetry delivered", || async move {
        telemetry.load(Ordering::SeqCst) == 2
    })
    .await;

    assert_eq!(overseer.count_children().await.unwrap(), 1);
    assert_eq!(counters.connected_names(), vec![labor.name.clone()]);
    assert!(counters.disconnected_names().is_empty());
}

#[tokio::test]
async fn connect_timeout_drops_never_connected_worker() {
    let adapter = MockAdapter::new();
    let cfg = Config {
        conn_timeout: Duration::from_millis(100),
        ..quick_config()
    };
    let (overseer, counters) = start(adapter.clone(), cfg);

    let labor = overseer.start_child().await.unwrap().expect("labor");

    let o = &overseer;
    wait_until("labor dropped", || async move {
        o.count_children().await.unwrap() == 0
    })
    .await;

    // Never connected: no disconnect/terminate callbacks, just the drop.
    assert!(counters.disconnected_names().is_empty());
    assert!(counters.terminated_names().is_empty());
    assert!(counters.event_kinds().contains(&EventKind::ConnTimeout));

    // Underlying resources are still reclaimed (in the background).
    let a = adapter.as_ref();
    let n = labor.name.as_str();
    wait_until("host reclaimed", || async move {
        a.terminated_names() == vec![n.to_string()]
    })
    .await;
}

#[tokio::test]
async fn zero_conn_timeout_drops_immediately() {
    let adapter = MockAdapter::new();
    let cfg = Config {
        conn_timeout: Duration::ZERO,
        ..quick_config()
    };
    let (overseer, counters) = start(adapter.clone(), cfg);

    let labor = overseer.start_child().await.unwrap().expect("labor");
    assert!(labor.phase.is_live());

    let o = &overseer;
    wait_until("labor dropped at once", || async move {
        o.count_children().await.unwrap() == 0
    })
    .await;
    assert!(counters.disconnected_names().is_empty());
}

#[tokio::test]
async fn disconnect_then_reconnect_reloads_and_repairs() {
    let adapter = MockAdapter::new();
    let cfg = Config {
        conn_timeout: Duration::from_secs(5),
        ..quick_config()
    };
    let (overseer, counters) = start(adapter.clone(), cfg);

    let name = activate(&overseer, 1).await;

    overseer.node_down(&name);
    let o = &overseer;
    let n = name.as_str();
    wait_until("worker disconnected", || async move {
        phase_of(o, n).await == Some(Phase::Disconnected)
    })
    .await;
    assert_eq!(counters.disconnected_names(), vec![name.clone()]);

    // Reconnect within the window: full reload + repair.
    overseer.node_up(&name);
    let pushes = &adapter.pushes;
    wait_until("release pushed after reconnect", || async move {
        pushes.load(Ordering::SeqCst) >= 1
    })
    .await;
    overseer
        .pair(&name, PairPid::new(&name, 2))
        .await
        .expect("re-pair accepted");

    wait_until("worker active again", || async move {
        phase_of(o, n).await == Some(Phase::Active)
    })
    .await;

    assert_eq!(counters.connected_names().len(), 2);
    assert_eq!(overseer.count_children().await.unwrap(), 1);
    assert!(counters.terminated_names().is_empty());
}

#[tokio::test]
async fn disconnect_without_reconnect_drops_the_labor() {
    let adapter = MockAdapter::new();
    let cfg = Config {
        conn_timeout: Duration::from_millis(150),
        ..quick_config()
    };
    let (overseer, counters) = start(adapter.clone(), cfg);

    let name = activate(&overseer, 1).await;
    overseer.node_down(&name);

    let o = &overseer;
    wait_until("labor dropped after window", || async move {
        o.count_children().await.unwrap() == 0
    })
    .await;

    // Permanent loss is surfaced, and the host is reclaimed.
    assert_eq!(counters.terminated_names(), vec![name.clone()]);
    let a = adapter.as_ref();
    let n = name.as_str();
    wait_until("host reclaimed", || async move {
        a.terminated_names() == vec![n.to_string()]
    })
    .await;
}

#[tokio::test]
async fn endpoint_exit_redrives_load_and_pair() {
    let adapter = MockAdapter::new();
    let (overseer, counters) = start(adapter.clone(), quick_config());

    let name = activate(&overseer, 1).await;
    assert_eq!(adapter.pushes.load(Ordering::SeqCst), 0);

    overseer.exit(PairPid::new(&name, 1), "worker crashed");

    // The still-live host gets the release again.
    let pushes = &adapter.pushes;
    wait_until("release re-pushed", || async move {
        pushes.load(Ordering::SeqCst) >= 1
    })
    .await;

    overseer
        .pair(&name, PairPid::new(&name, 2))
        .await
        .expect("re-pair accepted");
    let o = &overseer;
    let n = name.as_str();
    wait_until("worker active again", || async move {
        phase_of(o, n).await == Some(Phase::Active)
    })
    .await;

    // Recovery is transparent: no connect/disconnect callbacks fired.
    assert_eq!(counters.connected_names().len(), 1);
    assert!(counters.disconnected_names().is_empty());
}

#[tokio::test]
async fn stale_endpoint_exit_is_ignored() {
    let adapter = MockAdapter::new();
    let (overseer, _counters) = start(adapter.clone(), quick_config());

    let name = activate(&overseer, 7).await;
    overseer.exit(PairPid::new(&name, 99), "old endpoint");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(phase_of(&overseer, &name).await, Some(Phase::Active));
    assert_eq!(adapter.pushes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cap_refuses_without_touching_the_adapter() {
    let adapter = MockAdapter::new();
    let cfg = Config {
        max_nodes: 1,
        conn_timeout: Duration::from_secs(5),
        ..quick_config()
    };
    let (overseer, counters) = start(adapter.clone(), cfg);

    let first = overseer.start_child().await.unwrap();
    assert!(first.is_some());

    let second = overseer.start_child().await.unwrap();
    assert!(second.is_none());
    assert_eq!(adapter.spawns.load(Ordering::SeqCst), 1);
    assert_eq!(overseer.count_children().await.unwrap(), 1);
    assert!(counters.event_kinds().contains(&EventKind::CapReached));
}

#[tokio::test]
async fn terminate_is_idempotent_and_completes_on_node_down() {
    let adapter = MockAdapter::new();
    let cfg = Config {
        conn_timeout: Duration::from_secs(5),
        ..quick_config()
    };
    let (overseer, counters) = start(adapter.clone(), cfg);

    let name = activate(&overseer, 1).await;

    let terminated = overseer.terminate_child(&name).await.expect("terminate");
    assert_eq!(terminated.phase, Phase::Terminated);
    assert_eq!(overseer.count_children().await.unwrap(), 0);
    // Still registered until its final node_down arrives.
    assert_eq!(phase_of(&overseer, &name).await, Some(Phase::Terminated));

    // Second terminate does not error.
    let again = overseer.terminate_child(&name).await.expect("terminate again");
    assert_eq!(again.phase, Phase::Terminated);

    overseer.node_down(&name);
    let o = &overseer;
    let n = name.as_str();
    wait_until("labor removed", || async move {
        phase_of(o, n).await.is_none()
    })
    .await;
    assert_eq!(counters.terminated_names(), vec![name]);
}

#[tokio::test]
async fn repeated_node_up_is_idempotent() {
    let adapter = MockAdapter::new();
    let (overseer, counters) = start(adapter.clone(), quick_config());

    let name = activate(&overseer, 1).await;
    overseer.node_up(&name);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(phase_of(&overseer, &name).await, Some(Phase::Active));
    assert_eq!(counters.connected_names().len(), 1);
}

#[tokio::test]
async fn spawn_failure_replies_none() {
    let adapter = MockAdapter::new();
    adapter.fail_spawn.store(true, Ordering::SeqCst);
    let (overseer, counters) = start(adapter.clone(), quick_config());

    assert!(overseer.start_child().await.unwrap().is_none());
    assert_eq!(overseer.count_children().await.unwrap(), 0);

    let counters_events = counters.event_kinds();
    assert!(counters_events.contains(&EventKind::SpawnFailed));
}

#[tokio::test]
async fn exhausted_load_retries_drop_the_labor() {
    let adapter = MockAdapter::new();
    adapter.fail_push.store(true, Ordering::SeqCst);
    let cfg = Config {
        load_retries: 1,
        conn_timeout: Duration::from_secs(5),
        pair_timeout: Duration::from_secs(5),
        ..quick_config()
    };
    let (overseer, counters) = start(adapter.clone(), cfg);

    let labor = overseer.start_child().await.unwrap().expect("labor");
    overseer.node_up(&labor.name);

    let o = &overseer;
    wait_until("labor given up", || async move {
        o.count_children().await.unwrap() == 0
    })
    .await;

    let kinds = counters.event_kinds();
    assert!(kinds.contains(&EventKind::LoadFailed));
    assert!(kinds.contains(&EventKind::RetryScheduled));
    assert_eq!(counters.terminated_names(), vec![labor.name.clone()]);
    let a = adapter.as_ref();
    let n = labor.name.as_str();
    wait_until("host reclaimed", || async move {
        a.terminated_names() == vec![n.to_string()]
    })
    .await;
}
