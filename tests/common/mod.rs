//! Shared test fixtures: a scripted in-memory adapter and a recording
//! handler.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use overseer::{
    Adapter, AdapterError, BackoffPolicy, Config, EntryPoint, Event, EventKind, Flow, Handler,
    JitterPolicy, Labor, Overseer, Phase, Release, ReleaseSource, Telemetry,
};

/// Adapter whose behaviour is scripted through atomic flags and whose
/// calls are counted.
pub struct MockAdapter {
    counter: AtomicUsize,
    pub fail_spawn: AtomicBool,
    pub fail_push: AtomicBool,
    pub spawns: AtomicUsize,
    pub connects: AtomicUsize,
    pub pushes: AtomicUsize,
    pub starts: AtomicUsize,
    pub terminated: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            counter: AtomicUsize::new(0),
            fail_spawn: AtomicBool::new(false),
            fail_push: AtomicBool::new(false),
            spawns: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            pushes: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            terminated: Mutex::new(Vec::new()),
        })
    }

    pub fn terminated_names(&self) -> Vec<String> {
        self.terminated.lock().unwrap().clone()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    async fn spawn(&self, _overseer_id: &str) -> Result<Labor, AdapterError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(AdapterError::SpawnFailed {
                reason: "scripted spawn failure".to_string(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.spawns.fetch_add(1, Ordering::SeqCst);
        Ok(Labor::new(format!("w-{n}@mock"), format!("pid-{n}")))
    }

    async fn terminate(&self, labor: &Labor) -> Result<Labor, AdapterError> {
        self.terminated.lock().unwrap().push(labor.name.clone());
        Ok(labor.clone().into_phase(Phase::Terminated))
    }

    async fn connect(&self, _labor: &Labor) -> Result<(), AdapterError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn push_release(
        &self,
        labor: &Labor,
        _archive: &std::path::Path,
    ) -> Result<(), AdapterError> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(AdapterError::PushFailed {
                name: labor.name.clone(),
                reason: "scripted push failure".to_string(),
            });
        }
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start_release(
        &self,
        _labor: &Labor,
        _entry: Option<&EntryPoint>,
    ) -> Result<(), AdapterError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared counters the recording handler writes into.
#[derive(Clone, Default)]
pub struct Counters {
    pub connected: Arc<Mutex<Vec<String>>>,
    pub disconnected: Arc<Mutex<Vec<String>>>,
    pub terminated: Arc<Mutex<Vec<String>>>,
    pub telemetry: Arc<AtomicUsize>,
    pub events: Arc<Mutex<Vec<EventKind>>>,
    pub stop_reason: Arc<Mutex<Option<String>>>,
}

impl Counters {
    pub fn connected_names(&self) -> Vec<String> {
        self.connected.lock().unwrap().clone()
    }

    pub fn disconnected_names(&self) -> Vec<String> {
        self.disconnected.lock().unwrap().clone()
    }

    pub fn terminated_names(&self) -> Vec<String> {
        self.terminated.lock().unwrap().clone()
    }

    pub fn event_kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().clone()
    }
}

/// Handler that records every callback and always continues.
pub struct RecordingHandler {
    counters: Counters,
}

impl RecordingHandler {
    pub fn new(counters: Counters) -> Self {
        Self { counters }
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn handle_connected(&mut self, name: &str) -> Flow {
        self.counters.connected.lock().unwrap().push(name.to_string());
        Flow::Noreply
    }

    async fn handle_disconnected(&mut self, name: &str) -> Flow {
        self.counters
            .disconnected
            .lock()
            .unwrap()
            .push(name.to_string());
        Flow::Noreply
    }

    async fn handle_telemetry(&mut self, _telemetry: &Telemetry) -> Flow {
        self.counters.telemetry.fetch_add(1, Ordering::SeqCst);
        Flow::Noreply
    }

    async fn handle_terminated(&mut self, name: &str) -> Flow {
        self.counters
            .terminated
            .lock()
            .unwrap()
            .push(name.to_string());
        Flow::Noreply
    }

    async fn handle_event(&mut self, event: &Event) -> Flow {
        self.counters.events.lock().unwrap().push(event.kind);
        Flow::Noreply
    }

    async fn terminate(&mut self, reason: &str) {
        *self.counters.stop_reason.lock().unwrap() = Some(reason.to_string());
    }
}

/// Release backed by a real temp file so the fetch step succeeds.
pub fn test_release() -> Release {
    let path = std::env::temp_dir().join("overseer-test-release.tar.gz");
    std::fs::write(&path, b"not a real archive").expect("write test release");
    Release::new(ReleaseSource::File(path)).with_entry_point("fleet_worker", "start")
}

/// Config with millisecond-scale deadlines and deterministic backoff.
pub fn quick_config() -> Config {
    Config {
        conn_timeout: Duration::from_millis(200),
        pair_timeout: Duration::from_millis(500),
        load_retries: 2,
        load_backoff: BackoffPolicy {
            first: Duration::from_millis(20),
            max: Duration::from_millis(50),
            factor: 1.0,
            jitter: JitterPolicy::None,
        },
        ..Config::default()
    }
}

/// Polls `probe` every 10ms until it holds, panicking after 3 seconds.
pub async fn wait_until<F, Fut>(what: &str, mut probe: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        if probe().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Current phase of the named labor, if registered.
pub async fn phase_of(overseer: &Overseer, name: &str) -> Option<Phase> {
    overseer
        .snapshot()
        .await
        .ok()?
        .labors
        .into_iter()
        .find(|l| l.name == name)
        .map(|l| l.phase)
}

/// Drives one worker to its active phase and returns its name.
pub async fn activate(overseer: &Overseer, pid_id: u64) -> String {
    let labor = overseer
        .start_child()
        .await
        .expect("overseer running")
        .expect("labor spawned");
    let name = labor.name.clone();
    overseer.node_up(&name);
    overseer
        .pair(&name, overseer::PairPid::new(&name, pid_id))
        .await
        .expect("pair accepted");

    let o = overseer;
    let n = name.as_str();
    wait_until("worker active", || async move {
        phase_of(o, n).await == Some(Phase::Active)
    })
    .await;
    name
}
