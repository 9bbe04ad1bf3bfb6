#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zkwatch::daemon::{ShutdownSignal, Supervisor, SupervisorSettings, WorkerContext, WorkerSettings};
use zkwatch::extracts::MetricsCollection;
use zkwatch::introspection::{
    AttributeValue, IntrospectionSession, ObjectName, SessionError, SessionFactory, SessionResult,
};
use zkwatch::inventory::{InventoryProvider, TargetDescriptor};
use zkwatch::metrics::MetricsRegistry;

pub const HOSTNAME: &str = "zk1";
pub const LIST_INTERVAL: Duration = Duration::from_secs(1);
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const STOP_TIMEOUT: Duration = Duration::from_millis(100);

pub fn target(pid: u32) -> TargetDescriptor {
    TargetDescriptor::new(
        pid,
        format!("org.apache.zookeeper.server.quorum.QuorumPeerMain conf/zoo{}.cfg", pid),
    )
}

/// Metric published for every healthy poll of a target on `port`.
pub fn packets_sent_metric(port: &str) -> String {
    format!(
        "one_min.{}.zookeeper.{}.zk.standaloneServer.packetsSent",
        HOSTNAME, port
    )
}

pub fn thread_count_metric(port: &str) -> String {
    format!("one_min.{}.zookeeper.{}.thread.threadCount", HOSTNAME, port)
}

/// Inventory whose answer the test changes between passes.
#[derive(Default)]
pub struct ScriptedInventory {
    targets: Mutex<Vec<TargetDescriptor>>,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedInventory {
    pub fn new(targets: Vec<TargetDescriptor>) -> Arc<Self> {
        let inventory = Self::default();
        inventory.set(targets);
        Arc::new(inventory)
    }

    pub fn set(&self, targets: Vec<TargetDescriptor>) {
        *self.targets.lock().unwrap() = targets;
    }

    /// The next `n` listings fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryProvider for ScriptedInventory {
    async fn list(&self) -> Result<Vec<TargetDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(anyhow!("scripted inventory failure"));
        }
        Ok(self.targets.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeState {
    ports: Mutex<HashMap<u32, String>>,
    failing_opens: Mutex<HashMap<u32, usize>>,
    failing_reads: Mutex<HashSet<u32>>,
    hanging: Mutex<HashSet<u32>>,
    opened: Mutex<HashMap<u32, usize>>,
    port_reads: Mutex<HashMap<u32, usize>>,
    live: AtomicUsize,
    closed: AtomicUsize,
}

/// Hands out in-memory sessions for a standalone ZooKeeper server per pid.
#[derive(Clone, Default)]
pub struct FakeSessionFactory {
    state: Arc<FakeState>,
}

impl FakeSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_port(&self, pid: u32, port: &str) {
        self.state.ports.lock().unwrap().insert(pid, port.to_string());
    }

    /// The next `n` opens for `pid` fail.
    pub fn fail_opens(&self, pid: u32, n: usize) {
        self.state.failing_opens.lock().unwrap().insert(pid, n);
    }

    /// The next attribute read on a session for `pid` fails.
    pub fn fail_next_read(&self, pid: u32) {
        self.state.failing_reads.lock().unwrap().insert(pid);
    }

    /// Sessions for `pid` never answer a name query.
    pub fn hang(&self, pid: u32) {
        self.state.hanging.lock().unwrap().insert(pid);
    }

    pub fn opened(&self, pid: u32) -> usize {
        self.state.opened.lock().unwrap().get(&pid).copied().unwrap_or(0)
    }

    /// How many times a session for `pid` has been asked for its client port.
    pub fn port_reads(&self, pid: u32) -> usize {
        self.state.port_reads.lock().unwrap().get(&pid).copied().unwrap_or(0)
    }

    /// Sessions opened and not yet dropped.
    pub fn live_sessions(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn closed_sessions(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self, target: &TargetDescriptor) -> SessionResult<Box<dyn IntrospectionSession>> {
        let pid = target.pid();
        *self.state.opened.lock().unwrap().entry(pid).or_default() += 1;

        if let Some(remaining) = self.state.failing_opens.lock().unwrap().get_mut(&pid) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SessionError::NotFound { pid });
            }
        }

        self.state.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            pid,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct FakeSession {
    pid: u32,
    state: Arc<FakeState>,
    closed: bool,
}

impl FakeSession {
    fn beans(&self) -> Vec<(ObjectName, HashMap<String, AttributeValue>)> {
        let mut beans = vec![(
            ObjectName::new("java.lang", [("type", "Threading")]),
            HashMap::from([("ThreadCount".to_string(), AttributeValue::Int(8))]),
        )];
        if let Some(port) = self.state.ports.lock().unwrap().get(&self.pid) {
            beans.push((
                ObjectName::new(
                    "org.apache.ZooKeeperService",
                    [("name0", format!("StandaloneServer_port{}", port))],
                ),
                HashMap::from([
                    ("ClientPort".to_string(), AttributeValue::Text(port.clone())),
                    ("PacketsSent".to_string(), AttributeValue::Long(5)),
                ]),
            ));
        }
        beans
    }
}

#[async_trait]
impl IntrospectionSession for FakeSession {
    async fn query_names(&mut self, pattern: &ObjectName) -> SessionResult<Vec<ObjectName>> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let hanging = self.state.hanging.lock().unwrap().contains(&self.pid);
        if hanging {
            std::future::pending::<()>().await;
        }
        Ok(self
            .beans()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| name.matches(pattern))
            .collect())
    }

    async fn read_attributes(
        &mut self,
        name: &ObjectName,
        attributes: &[&str],
    ) -> SessionResult<HashMap<String, AttributeValue>> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.state.failing_reads.lock().unwrap().remove(&self.pid) {
            return Err(SessionError::malformed("scripted read failure"));
        }
        if attributes.contains(&"ClientPort") {
            *self.state.port_reads.lock().unwrap().entry(self.pid).or_default() += 1;
        }
        Ok(self
            .beans()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| {
                values
                    .into_iter()
                    .filter(|(k, _)| attributes.contains(&k.as_str()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn close(&mut self) -> SessionResult<()> {
        if !self.closed {
            self.closed = true;
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn supervisor(
    inventory: Arc<ScriptedInventory>,
    factory: &FakeSessionFactory,
    registry: &Arc<MetricsRegistry>,
    shutdown: &ShutdownSignal,
) -> Supervisor {
    let context = WorkerContext {
        factory: Arc::new(factory.clone()),
        registry: Arc::clone(registry),
        collection: Arc::new(MetricsCollection::default()),
        settings: Arc::new(WorkerSettings {
            poll_interval: POLL_INTERVAL,
            prefix_root: "one_min".into(),
            hostname: HOSTNAME.into(),
        }),
    };
    let settings = SupervisorSettings {
        list_interval: LIST_INTERVAL,
        worker_stop_timeout: STOP_TIMEOUT,
    };
    Supervisor::new(inventory, context, settings, shutdown.clone())
}

/// Lets spawned workers run up to their next timed wait.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
