#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use shardvisor::{
    BoxError, ClientRef, Cluster, ClusterError, ClusterSpec, EventKind, ServerRole, SetupFn,
    Stage,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use common::{Call, FakeConnector, SleepLauncher, WAIT, collect_until, entries, init_tracing, spec};

struct Harness {
    cluster: Arc<Cluster>,
    connector: FakeConnector,
    launcher: SleepLauncher,
    ctx: CancellationToken,
}

impl Harness {
    fn new(spec: ClusterSpec, connector: FakeConnector, launcher: SleepLauncher) -> Self {
        init_tracing();
        let cluster = Cluster::builder(spec, Arc::new(connector.clone()))
            .launcher(Arc::new(launcher.clone()))
            .build()
            .unwrap();
        Self {
            cluster: Arc::new(cluster),
            connector,
            launcher,
            ctx: CancellationToken::new(),
        }
    }

    fn start(&self) -> JoinHandle<Result<(), ClusterError>> {
        let cluster = self.cluster.clone();
        let ctx = self.ctx.clone();
        tokio::spawn(async move { cluster.run(&ctx).await })
    }

    async fn stop(&self, runner: JoinHandle<Result<(), ClusterError>>) -> ClusterError {
        self.ctx.cancel();
        finish(runner).await.unwrap_err()
    }
}

async fn finish(runner: JoinHandle<Result<(), ClusterError>>) -> Result<(), ClusterError> {
    tokio::time::timeout(WAIT, runner)
        .await
        .expect("run did not return")
        .unwrap()
}

fn ready_count(events: &[shardvisor::Event]) -> usize {
    events
        .iter()
        .filter(|e| e.kind == EventKind::ServerReady)
        .count()
}

fn fully_up(expected_ready: usize) -> impl FnMut(&[shardvisor::Event]) -> bool {
    move |seen: &[shardvisor::Event]| {
        seen.iter().any(|e| e.kind == EventKind::SetupCompleted)
            && ready_count(seen) == expected_ready
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_bring_up() {
    let base = tempfile::tempdir().unwrap();
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let calls = hook_calls.clone();
    let hook = SetupFn::arc("count", move |_ctx: CancellationToken, _client: ClientRef| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(())
        }
    });

    let mut spec = spec(base.path(), 2, 3);
    spec.on_setup = Some(hook);
    let h = Harness::new(spec, FakeConnector::new(), SleepLauncher::new());
    let topo = h.cluster.topology();
    let mut rx = h.cluster.subscribe();
    let runner = h.start();

    collect_until(&mut rx, fully_up(8)).await;

    assert_eq!(h.cluster.services().await, topo.service_names());
    assert_eq!(h.cluster.services().await.len(), 2 * 3 + 2);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);

    let launches = h.launcher.launches();
    assert_eq!(launches.len(), 8);
    let data = launches.iter().filter(|l| l.role == ServerRole::Data).count();
    assert_eq!(data, 6);
    for s in 0..2 {
        for r in 0..3 {
            let name = topo.data_service(s, r);
            let launch = h.launcher.launch_of(&name).unwrap();
            assert_eq!(launch.dir.as_deref(), Some(base.path().join(&name).as_path()));
            assert!(base.path().join(&name).is_dir());
            assert!(launch.args.contains(&"--shardsvr".to_string()));
            assert!(launch.args.contains(&format!("rsData{s}")));
        }
    }
    let router = h.launcher.launch_of("routing").unwrap();
    assert_eq!(router.dir, None);
    assert!(router.args.contains(&"rsConfig/127.0.0.1:28001".to_string()));

    // One initiation per replica set, each sent to one of its own members.
    let initiations = h.connector.commands_named("replSetInitiate");
    assert_eq!(initiations.len(), 3);
    let cfg: Vec<_> = initiations
        .iter()
        .filter(|(_, doc)| doc["replSetInitiate"]["_id"] == "rsConfig")
        .collect();
    assert_eq!(cfg.len(), 1);
    assert_eq!(cfg[0].0, topo.config_addr());
    for s in 0..2u16 {
        let rs = format!("rsData{s}");
        let shard: Vec<_> = initiations
            .iter()
            .filter(|(_, doc)| doc["replSetInitiate"]["_id"] == rs.as_str())
            .collect();
        assert_eq!(shard.len(), 1, "{rs} initiated more than once");
        assert_eq!(shard[0].1["replSetInitiate"]["members"].as_array().unwrap().len(), 3);
        assert!((0..3).any(|r| topo.data_addr(s, r) == shard[0].0));
    }

    // Router steps in fixed order.
    let router_calls: Vec<Call> = h
        .connector
        .calls_to(topo.router_addr())
        .into_iter()
        .filter(|c| !matches!(c, Call::Connect(_)))
        .collect();
    let addr = topo.router_addr();
    assert_eq!(
        router_calls,
        vec![
            Call::Command {
                addr,
                db: "admin".into(),
                name: "addShard".into(),
                doc: json!({ "addShard": "rsData0/127.0.0.1:29000,127.0.0.1:29001,127.0.0.1:29002" }),
            },
            Call::Command {
                addr,
                db: "admin".into(),
                name: "addShard".into(),
                doc: json!({ "addShard": "rsData1/127.0.0.1:29100,127.0.0.1:29101,127.0.0.1:29102" }),
            },
            Call::CreateCollection {
                addr,
                db: "cloud".into(),
                name: "_init".into(),
            },
            Call::Command {
                addr,
                db: "admin".into(),
                name: "enableSharding".into(),
                doc: json!({ "enableSharding": "cloud" }),
            },
        ]
    );

    let err = h.stop(runner).await;
    assert!(err.is_canceled(), "unexpected error: {err}");
    assert!(entries(base.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_config_initiated_before_data_and_router_start() {
    let base = tempfile::tempdir().unwrap();
    let h = Harness::new(spec(base.path(), 2, 2), FakeConnector::new(), SleepLauncher::new());
    let mut rx = h.cluster.subscribe();
    let runner = h.start();

    let events = collect_until(&mut rx, fully_up(6)).await;

    let barrier = events
        .iter()
        .find(|e| e.kind == EventKind::StartupBarrierOpened)
        .unwrap()
        .seq;
    let cfg_initiated = events
        .iter()
        .find(|e| e.kind == EventKind::ReplicaSetInitiated && e.is_for("cfg"))
        .unwrap()
        .seq;
    assert!(cfg_initiated < barrier);

    let dependents: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::ServerStarting && !e.is_for("cfg"))
        .collect();
    assert_eq!(dependents.len(), 5);
    for ev in dependents {
        assert!(ev.seq > barrier, "{:?} started before the barrier", ev.service);
    }

    assert!(h.stop(runner).await.is_canceled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_kill_one_service() {
    let base = tempfile::tempdir().unwrap();
    let h = Harness::new(spec(base.path(), 1, 2), FakeConnector::new(), SleepLauncher::new());
    let mut rx = h.cluster.subscribe();
    let runner = h.start();
    collect_until(&mut rx, fully_up(4)).await;

    h.cluster.kill("data-0-0").await.unwrap();
    collect_until(&mut rx, |seen| {
        seen.iter()
            .any(|e| e.kind == EventKind::ServerStopped && e.is_for("data-0-0"))
    })
    .await;

    assert!(!base.path().join("data-0-0").exists());
    assert!(base.path().join("data-0-1").is_dir());
    assert!(base.path().join("cfg").is_dir());
    assert_eq!(h.cluster.services().await, vec!["cfg", "data-0-1", "routing"]);
    assert!(!runner.is_finished());

    let err = h.cluster.kill("nonexistent").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(h.cluster.services().await, vec!["cfg", "data-0-1", "routing"]);

    let err = h.cluster.kill("data-0-0").await.unwrap_err();
    assert!(err.is_not_found());

    assert!(h.stop(runner).await.is_canceled());
    assert!(entries(base.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_kill_config_before_initiation_stalls_until_canceled() {
    let base = tempfile::tempdir().unwrap();
    let topo = shardvisor::Topology::new(1, 2);
    let mut spec = spec(base.path(), 1, 2);
    spec.setup_timeout = Duration::from_secs(60);
    let connector = FakeConnector::new().refuse(topo.config_addr());
    let h = Harness::new(spec, connector, SleepLauncher::new());
    let mut rx = h.cluster.subscribe();
    let runner = h.start();

    collect_until(&mut rx, |seen| {
        seen.iter()
            .any(|e| e.kind == EventKind::ProcessSpawned && e.is_for("cfg"))
    })
    .await;

    h.cluster.kill("cfg").await.unwrap();
    collect_until(&mut rx, |seen| {
        let stopped = seen
            .iter()
            .any(|e| e.kind == EventKind::ServerStopped && e.is_for("cfg"));
        stopped && seen.iter().any(|e| e.kind == EventKind::ServiceKilled)
    })
    .await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!runner.is_finished());
    assert!(h.cluster.services().await.is_empty());
    assert!(h.launcher.launches().iter().all(|l| l.service == "cfg"));
    assert!(h.connector.commands_named("replSetInitiate").is_empty());

    assert!(h.stop(runner).await.is_canceled());
    assert!(entries(base.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_mid_bring_up() {
    let base = tempfile::tempdir().unwrap();
    let topo = shardvisor::Topology::new(1, 2);
    let mut spec = spec(base.path(), 1, 2);
    spec.setup_timeout = Duration::from_secs(60);
    let connector = FakeConnector::new().refuse(topo.router_addr());
    let h = Harness::new(spec, connector, SleepLauncher::new());
    let mut rx = h.cluster.subscribe();
    let runner = h.start();

    collect_until(&mut rx, |seen| {
        seen.iter()
            .any(|e| e.kind == EventKind::ProcessSpawned && e.is_for("routing"))
    })
    .await;

    let start = std::time::Instant::now();
    let err = h.stop(runner).await;
    assert!(err.is_canceled(), "unexpected error: {err}");
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(entries(base.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_add_shard_failure_is_fatal() {
    let base = tempfile::tempdir().unwrap();
    let h = Harness::new(
        spec(base.path(), 2, 1),
        FakeConnector::new().fail_command("addShard"),
        SleepLauncher::new(),
    );
    let err = finish(h.start()).await.unwrap_err();

    match &err {
        ClusterError::Command { service, stage, .. } => {
            assert_eq!(service, "routing");
            assert_eq!(*stage, Stage::AddShard);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.as_label(), "add_shard");
    assert_eq!(h.connector.commands_named("addShard").len(), 1);
    assert!(h.connector.commands_named("enableSharding").is_empty());
    assert!(entries(base.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_setup_hook_failure_is_fatal() {
    let base = tempfile::tempdir().unwrap();
    let mut spec = spec(base.path(), 1, 1);
    spec.on_setup = Some(SetupFn::arc(
        "broken",
        |_ctx: CancellationToken, _client: ClientRef| async move {
            Err::<(), BoxError>("seed data missing".into())
        },
    ));
    let h = Harness::new(spec, FakeConnector::new(), SleepLauncher::new());

    let err = finish(h.start()).await.unwrap_err();
    assert!(matches!(err, ClusterError::Setup { .. }), "unexpected error: {err}");
    assert_eq!(err.to_string(), "setup: seed data missing");
    assert_eq!(h.connector.commands_named("enableSharding").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_config_never_ready_times_out() {
    let base = tempfile::tempdir().unwrap();
    let topo = shardvisor::Topology::new(1, 1);
    let mut spec = spec(base.path(), 1, 1);
    spec.setup_timeout = Duration::from_millis(500);
    let h = Harness::new(
        spec,
        FakeConnector::new().refuse(topo.config_addr()),
        SleepLauncher::new(),
    );

    let start = std::time::Instant::now();
    let err = finish(h.start()).await.unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert_eq!(err.service(), Some("cfg"));
    assert!(start.elapsed() < Duration::from_secs(5));

    let launched: Vec<_> = h.launcher.launches().into_iter().map(|l| l.service).collect();
    assert_eq!(launched, vec!["cfg"]);
    assert!(entries(base.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_data_process_exit_is_fatal() {
    let base = tempfile::tempdir().unwrap();
    let h = Harness::new(
        spec(base.path(), 1, 2),
        FakeConnector::new(),
        SleepLauncher::new().exit("data-0-1", 3),
    );

    let err = finish(h.start()).await.unwrap_err();
    match &err {
        ClusterError::ProcessExited { service, status } => {
            assert_eq!(service, "data-0-1");
            assert_eq!(status.code(), Some(3));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(entries(base.path()).is_empty());
}

#[test]
fn test_invalid_spec_rejected() {
    let spec = ClusterSpec {
        shards: 0,
        ..ClusterSpec::default()
    };
    let err = Cluster::new(spec, Arc::new(FakeConnector::new()))
        .err()
        .unwrap();
    assert!(matches!(err, ClusterError::InvalidSpec { .. }));
}
