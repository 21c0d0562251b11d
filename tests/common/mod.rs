#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use shardvisor::{
    AdminClient, ClientError, ClientRef, ClusterSpec, Connector, Document, Event, Launch, Launcher,
    commands,
};
use tokio::process::Command;
use tokio::sync::broadcast::{self, error::RecvError};

pub const WAIT: Duration = Duration::from_secs(15);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn spec(dir: &Path, shards: u16, replicas: u16) -> ClusterSpec {
    ClusterSpec::builder()
        .dir(dir)
        .shards(shards)
        .replicas(replicas)
        .setup_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Everything the fake clients were asked to do, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(SocketAddr),
    Command {
        addr: SocketAddr,
        db: String,
        name: String,
        doc: Document,
    },
    CreateCollection {
        addr: SocketAddr,
        db: String,
        name: String,
    },
}

#[derive(Default)]
struct Behavior {
    refuse: HashSet<SocketAddr>,
    fail_command: Option<String>,
}

/// Connector handing out recording in-memory clients.
#[derive(Clone, Default)]
pub struct FakeConnector {
    calls: Arc<Mutex<Vec<Call>>>,
    behavior: Arc<Mutex<Behavior>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pings to `addr` are refused forever.
    pub fn refuse(self, addr: SocketAddr) -> Self {
        self.behavior.lock().unwrap().refuse.insert(addr);
        self
    }

    /// Command `name` replies `{ ok: 0 }`.
    pub fn fail_command(self, name: &str) -> Self {
        self.behavior.lock().unwrap().fail_command = Some(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands_named(&self, name: &str) -> Vec<(SocketAddr, Document)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Command { addr, name: n, doc, .. } if n == name => Some((addr, doc)),
                _ => None,
            })
            .collect()
    }

    pub fn calls_to(&self, target: SocketAddr) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| match c {
                Call::Connect(addr) => *addr == target,
                Call::Command { addr, .. } | Call::CreateCollection { addr, .. } => *addr == target,
            })
            .collect()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, addr: SocketAddr) -> Result<ClientRef, ClientError> {
        self.calls.lock().unwrap().push(Call::Connect(addr));
        Ok(Arc::new(FakeClient {
            addr,
            calls: self.calls.clone(),
            behavior: self.behavior.clone(),
        }))
    }
}

struct FakeClient {
    addr: SocketAddr,
    calls: Arc<Mutex<Vec<Call>>>,
    behavior: Arc<Mutex<Behavior>>,
}

#[async_trait]
impl AdminClient for FakeClient {
    async fn ping(&self) -> Result<(), ClientError> {
        if self.behavior.lock().unwrap().refuse.contains(&self.addr) {
            return Err(ClientError::Connect("connection refused".into()));
        }
        Ok(())
    }

    async fn run_command(&self, db: &str, command: Document) -> Result<Document, ClientError> {
        let name = commands::command_name(&command).to_string();
        self.calls.lock().unwrap().push(Call::Command {
            addr: self.addr,
            db: db.to_string(),
            name: name.clone(),
            doc: command,
        });
        let fail = self.behavior.lock().unwrap().fail_command.as_deref() == Some(name.as_str());
        if fail {
            return Ok(json!({ "ok": 0, "errmsg": "injected failure" }));
        }
        Ok(json!({ "ok": 1 }))
    }

    async fn create_collection(&self, db: &str, name: &str) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(Call::CreateCollection {
            addr: self.addr,
            db: db.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn disconnect(&self) {}
}

/// Runs `sleep` in place of the database binaries.
#[derive(Clone, Default)]
pub struct SleepLauncher {
    launches: Arc<Mutex<Vec<Launch>>>,
    exit_with: Arc<Mutex<Option<(String, i32)>>>,
}

impl SleepLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service `name` exits immediately with `code`.
    pub fn exit(self, name: &str, code: i32) -> Self {
        *self.exit_with.lock().unwrap() = Some((name.to_string(), code));
        self
    }

    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_of(&self, service: &str) -> Option<Launch> {
        self.launches().into_iter().find(|l| l.service == service)
    }
}

impl Launcher for SleepLauncher {
    fn command(&self, launch: &Launch) -> Command {
        self.launches.lock().unwrap().push(launch.clone());

        let exit = self.exit_with.lock().unwrap().clone();
        let mut cmd = match exit {
            Some((name, code)) if name == launch.service => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(format!("exit {code}"));
                cmd
            }
            _ => {
                let mut cmd = Command::new("sleep");
                cmd.arg("300");
                cmd
            }
        };
        if let Some(dir) = &launch.dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Receives events until `done` returns true for everything seen so far.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<Event>,
    mut done: impl FnMut(&[Event]) -> bool,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let fut = async {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    seen.push(ev);
                    if done(&seen) {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    };
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting for events");
    seen
}

pub fn entries(dir: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    out.sort();
    out
}
