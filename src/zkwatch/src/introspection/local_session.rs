use crate::introspection::error::{SessionError, SessionResult};
use crate::introspection::hsperf::{find_perf_data, PerfData};
use crate::introspection::object_name::ObjectName;
use crate::introspection::perf_beans::{jvm_beans, Attributes, Beans};
use crate::introspection::value::AttributeValue;
use crate::introspection::zookeeper::{self, ClientEndpoint, Monitor};
use crate::introspection::{IntrospectionSession, SessionFactory};
use crate::inventory::TargetDescriptor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

const ZOOKEEPER_DOMAIN: &str = "org.apache.ZooKeeperService";

/// Minimum age of a snapshot before a call re-reads the target. One poll issues
/// many queries; they should all see the same snapshot.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Attaches to local JVMs through their HotSpot performance data file.
pub struct LocalAttachFactory {
    perf_data_root: PathBuf,
    zk_command_timeout: Duration,
}

impl LocalAttachFactory {
    pub fn new(perf_data_root: impl Into<PathBuf>, zk_command_timeout: Duration) -> Self {
        Self {
            perf_data_root: perf_data_root.into(),
            zk_command_timeout,
        }
    }
}

#[async_trait]
impl SessionFactory for LocalAttachFactory {
    async fn open(&self, target: &TargetDescriptor) -> SessionResult<Box<dyn IntrospectionSession>> {
        let session =
            LocalSession::attach(&self.perf_data_root, target, self.zk_command_timeout).await?;
        Ok(Box::new(session))
    }
}

/// Session over one local JVM.
///
/// JVM groups come from the perf data file, `java.lang:type=OperatingSystem` from
/// the host process table, and the ZooKeeper groups from the client port named
/// in the server's config file plus its `mntr` command on that port.
pub struct LocalSession {
    pid: u32,
    perf_path: PathBuf,
    system: Arc<RwLock<System>>,
    zk_config: Option<PathBuf>,
    zk_endpoint: Option<ClientEndpoint>,
    zk_command_timeout: Duration,
    refresh_interval: Duration,
    refreshed_at: Option<Instant>,
    beans: Beans,
    closed: bool,
}

impl LocalSession {
    pub async fn attach(
        perf_data_root: &Path,
        target: &TargetDescriptor,
        zk_command_timeout: Duration,
    ) -> SessionResult<Self> {
        let pid = target.pid();
        let perf_path =
            find_perf_data(perf_data_root, pid).ok_or(SessionError::NotFound { pid })?;
        let perf = read_perf_data(pid, &perf_path).await?;

        let system = Arc::new(RwLock::new(System::new()));
        let cwd = process_cwd(&system, pid).await?;

        let command = perf
            .text("sun.rt.javaCommand")
            .unwrap_or(target.display_name())
            .to_string();
        let zk_config = zookeeper::config_path_from_command(&command).map(|path| {
            match (&cwd, path.is_relative()) {
                (Some(cwd), true) => cwd.join(path),
                _ => path,
            }
        });

        debug!(
            "Attached to PID {} through {} (config {:?})",
            pid,
            perf_path.display(),
            zk_config
        );

        Ok(Self {
            pid,
            perf_path,
            system,
            zk_config,
            zk_endpoint: None,
            zk_command_timeout,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refreshed_at: None,
            beans: Beans::new(),
            closed: false,
        })
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    async fn refresh(&mut self) -> SessionResult<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self
            .refreshed_at
            .is_some_and(|at| at.elapsed() < self.refresh_interval)
        {
            return Ok(());
        }

        let perf = read_perf_data(self.pid, &self.perf_path).await?;
        let mut beans = jvm_beans(&perf);
        beans.insert(
            ObjectName::new("java.lang", [("type", "OperatingSystem")]),
            self.os_attributes().await?,
        );
        beans.extend(self.zookeeper_beans().await);

        self.beans = beans;
        self.refreshed_at = Some(Instant::now());
        Ok(())
    }

    async fn os_attributes(&self) -> SessionResult<Attributes> {
        let system = Arc::clone(&self.system);
        let pid = Pid::from_u32(self.pid);

        let attributes = tokio::task::spawn_blocking(move || {
            let mut sys = system.blocking_write();
            sys.refresh_memory();
            sys.refresh_cpu_usage();
            sys.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_cpu().with_memory(),
            );

            let process = sys.process(pid)?;
            let cpus = sys.cpus().len().max(1) as f64;
            let load = System::load_average();
            let bytes = |v: u64| AttributeValue::Long(i64::try_from(v).unwrap_or(i64::MAX));

            Some(HashMap::from([
                ("TotalPhysicalMemorySize".to_string(), bytes(sys.total_memory())),
                ("FreePhysicalMemorySize".to_string(), bytes(sys.free_memory())),
                ("TotalSwapSpaceSize".to_string(), bytes(sys.total_swap())),
                ("FreeSwapSpaceSize".to_string(), bytes(sys.free_swap())),
                (
                    "CommittedVirtualMemorySize".to_string(),
                    bytes(process.virtual_memory()),
                ),
                ("SystemLoadAverage".to_string(), AttributeValue::Double(load.one)),
                (
                    "SystemCpuLoad".to_string(),
                    AttributeValue::Double(f64::from(sys.global_cpu_usage()) / 100.0),
                ),
                (
                    "ProcessCpuLoad".to_string(),
                    AttributeValue::Double(f64::from(process.cpu_usage()) / 100.0 / cpus),
                ),
                (
                    "AvailableProcessors".to_string(),
                    AttributeValue::Int(i32::try_from(sys.cpus().len()).unwrap_or(i32::MAX)),
                ),
            ]))
        })
        .await
        .map_err(|e| SessionError::io("/proc", io::Error::other(e)))?;

        attributes.ok_or(SessionError::NotFound { pid: self.pid })
    }

    /// ZooKeeper groups. The server group carries `ClientPort` once the config
    /// names one; the `mntr` figures and the data tree group only while the
    /// server answers.
    async fn zookeeper_beans(&mut self) -> Beans {
        if self.zk_endpoint.is_none() {
            let Some(config) = &self.zk_config else {
                return Beans::new();
            };
            match zookeeper::read_client_endpoint(config).await {
                Ok(endpoint) => self.zk_endpoint = Some(endpoint),
                Err(e) => {
                    debug!("PID {}: no ZooKeeper client endpoint: {:#}", self.pid, e);
                    return Beans::new();
                }
            }
        }
        let Some(endpoint) = &self.zk_endpoint else {
            return Beans::new();
        };

        let monitor = match zookeeper::monitor(endpoint, self.zk_command_timeout).await {
            Ok(monitor) if !monitor.is_empty() => Some(monitor),
            Ok(_) => {
                debug!("PID {}: mntr is not enabled on port {}", self.pid, endpoint.port);
                None
            }
            Err(e) => {
                debug!("PID {}: mntr failed: {:#}", self.pid, e);
                None
            }
        };
        server_beans(endpoint, monitor.as_ref())
    }
}

#[async_trait]
impl IntrospectionSession for LocalSession {
    async fn query_names(&mut self, pattern: &ObjectName) -> SessionResult<Vec<ObjectName>> {
        self.refresh().await?;
        Ok(self
            .beans
            .keys()
            .filter(|name| name.matches(pattern))
            .cloned()
            .collect())
    }

    async fn read_attributes(
        &mut self,
        name: &ObjectName,
        attributes: &[&str],
    ) -> SessionResult<HashMap<String, AttributeValue>> {
        self.refresh().await?;
        let Some(bean) = self.beans.get(name) else {
            return Ok(HashMap::new());
        };
        Ok(attributes
            .iter()
            .filter_map(|attr| bean.get(*attr).map(|v| (attr.to_string(), v.clone())))
            .collect())
    }

    async fn close(&mut self) -> SessionResult<()> {
        if !self.closed {
            self.closed = true;
            self.beans.clear();
            debug!("Session to PID {} closed", self.pid);
        }
        Ok(())
    }
}

async fn read_perf_data(pid: u32, path: &Path) -> SessionResult<PerfData> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SessionError::NotFound { pid },
        _ => SessionError::io(path, e),
    })?;
    PerfData::parse(&bytes)
}

async fn process_cwd(system: &Arc<RwLock<System>>, pid: u32) -> SessionResult<Option<PathBuf>> {
    let system = Arc::clone(system);
    let pid = Pid::from_u32(pid);
    tokio::task::spawn_blocking(move || {
        let mut sys = system.blocking_write();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cwd(UpdateKind::OnlyIfNotSet),
        );
        sys.process(pid)
            .and_then(|process| process.cwd())
            .map(Path::to_path_buf)
    })
    .await
    .map_err(|e| SessionError::io("/proc", io::Error::other(e)))
}

/// `…:name0=StandaloneServer_port<port>` and, with `mntr` figures, its
/// `name1=InMemoryDataTree` child.
fn server_beans(endpoint: &ClientEndpoint, monitor: Option<&Monitor>) -> Beans {
    let standalone = monitor.map_or(!endpoint.replicated, Monitor::is_standalone);
    let server = format!(
        "{}Server_port{}",
        if standalone { "Standalone" } else { "Replicated" },
        endpoint.port
    );
    let server_name = ObjectName::new(ZOOKEEPER_DOMAIN, [("name0", server.as_str())]);
    let client_port = AttributeValue::Text(endpoint.port.to_string());

    let Some(monitor) = monitor else {
        return Beans::from([(
            server_name,
            Attributes::from([("ClientPort".to_string(), client_port)]),
        )]);
    };

    let tree_name = server_name.clone().with_property("name1", "InMemoryDataTree");
    let long = |key: &str| monitor.long(key).map(AttributeValue::Long);
    let int = |key: &str| {
        monitor
            .long(key)
            .map(|v| AttributeValue::Int(i32::try_from(v).unwrap_or(i32::MAX)))
    };

    let server_attributes: Attributes = [
        ("ClientPort", Some(client_port)),
        ("NumAliveConnections", long("zk_num_alive_connections")),
        ("OutstandingRequests", long("zk_outstanding_requests")),
        ("PacketsReceived", long("zk_packets_received")),
        ("PacketsSent", long("zk_packets_sent")),
        ("MinRequestLatency", long("zk_min_latency")),
        ("AvgRequestLatency", long("zk_avg_latency")),
        ("MaxRequestLatency", long("zk_max_latency")),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
    .collect();

    let tree_attributes: Attributes = [
        ("NodeCount", int("zk_znode_count")),
        ("WatchCount", int("zk_watch_count")),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
    .collect();

    Beans::from([
        (server_name, server_attributes),
        (tree_name, tree_attributes),
    ])
}
