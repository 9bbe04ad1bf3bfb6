use crate::inventory::java_command::{is_java_launcher, java_command};
use crate::inventory::{DisplayNameFilter, InventoryProvider, TargetDescriptor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use sysinfo::{Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::sync::RwLock;
use tracing::trace;

/// Lists JVM processes running on this host whose java command passes the filter.
pub struct LocalJvmInventory {
    system: Arc<RwLock<System>>,
    filter: DisplayNameFilter,
}

impl LocalJvmInventory {
    pub fn new(filter: DisplayNameFilter) -> Self {
        Self {
            system: Arc::new(RwLock::new(System::new())),
            filter,
        }
    }

    fn describe(process: &Process) -> Option<TargetDescriptor> {
        // Linux reports threads as tasks of their process
        if process.thread_kind().is_some() {
            return None;
        }

        let argv: Vec<String> = process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let launcher_ok = argv.first().is_some_and(|a| is_java_launcher(a))
            || is_java_launcher(&process.name().to_string_lossy());
        if !launcher_ok {
            return None;
        }

        // the process name may be `java` while argv[0] is a wrapper path
        let display_name = java_command(&argv).or_else(|| {
            let mut patched = argv.clone();
            *patched.first_mut()? = "java".to_string();
            java_command(&patched)
        })?;

        Some(TargetDescriptor::new(process.pid().as_u32(), display_name))
    }
}

#[async_trait]
impl InventoryProvider for LocalJvmInventory {
    #[tracing::instrument(skip(self))]
    async fn list(&self) -> Result<Vec<TargetDescriptor>> {
        let system = Arc::clone(&self.system);

        let jvms = tokio::task::spawn_blocking(move || {
            let mut sys = system.blocking_write();
            sys.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                // name is always refreshed; argv can change on exec
                ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
            );
            sys.processes()
                .values()
                .filter_map(Self::describe)
                .collect::<Vec<_>>()
        })
        .await
        .context("Process table refresh did not complete")?;

        let own_pid = std::process::id();
        let mut targets: Vec<TargetDescriptor> = jvms
            .into_iter()
            .filter(|d| d.pid() != own_pid)
            .filter(|d| self.filter.matches(d.display_name()))
            .collect();
        targets.sort_by_key(|d| d.pid());

        trace!("Found {} matching JVMs", targets.len());
        Ok(targets)
    }
}
