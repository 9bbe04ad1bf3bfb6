mod java_command;
mod local_jvm;

pub use java_command::{is_java_launcher, java_command};
pub use local_jvm::LocalJvmInventory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// One monitorable local process.
///
/// Identity is the pid alone: two descriptors with the same pid are the same target
/// even if the display name was read differently.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pid: u32,
    display_name: String,
}

impl TargetDescriptor {
    pub fn new(pid: u32, display_name: impl Into<String>) -> Self {
        Self {
            pid,
            display_name: display_name.into(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl PartialEq for TargetDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
    }
}

impl Eq for TargetDescriptor {}

impl Hash for TargetDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pid.hash(state);
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID=[{}] {}", self.pid, self.display_name)
    }
}

/// Predicate on the display name that selects which processes are targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayNameFilter {
    Prefix(String),
    Contains(String),
}

impl DisplayNameFilter {
    pub fn matches(&self, display_name: &str) -> bool {
        match self {
            DisplayNameFilter::Prefix(prefix) => display_name.starts_with(prefix.as_str()),
            DisplayNameFilter::Contains(needle) => display_name.contains(needle.as_str()),
        }
    }
}

/// Source of candidate targets visible on this host.
///
/// An empty list is a valid answer. Errors are transient from the caller's point of
/// view and may be retried on the next call.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn list(&self) -> Result<Vec<TargetDescriptor>>;
}
