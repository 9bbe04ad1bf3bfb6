mod error;
pub mod hsperf;
mod local_session;
mod object_name;
mod perf_beans;
mod value;
pub mod zookeeper;

pub use error::{SessionError, SessionResult};
pub use hsperf::{find_perf_data, PerfData};
pub use local_session::{LocalAttachFactory, LocalSession};
pub use object_name::ObjectName;
pub use value::{memory_usage, AttributeValue};

use crate::inventory::TargetDescriptor;
use async_trait::async_trait;
use std::collections::HashMap;

/// Opens introspection sessions against targets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, target: &TargetDescriptor) -> SessionResult<Box<dyn IntrospectionSession>>;
}

/// A live connection to one target's named attribute groups.
///
/// A session is owned by exactly one worker; calls are sequential.
#[async_trait]
pub trait IntrospectionSession: Send {
    /// Names of every attribute group selected by `pattern`.
    async fn query_names(&mut self, pattern: &ObjectName) -> SessionResult<Vec<ObjectName>>;

    /// Reads the requested attributes of `name`. Attributes the group does not
    /// have are left out of the result rather than reported as errors.
    async fn read_attributes(
        &mut self,
        name: &ObjectName,
        attributes: &[&str],
    ) -> SessionResult<HashMap<String, AttributeValue>>;

    async fn close(&mut self) -> SessionResult<()>;
}
