use crate::constants::FALLBACK_HOSTNAME;
use crate::extracts::{bean_attributes, query_names};
use crate::introspection::{AttributeValue, IntrospectionSession};
use anyhow::Result;
use sysinfo::System;

const SERVER_PATTERNS: [&str; 2] = [
    "org.apache.ZooKeeperService:name0=StandaloneServer_port*",
    "org.apache.ZooKeeperService:name0=ReplicatedServer_port*",
];

pub fn local_hostname() -> String {
    System::host_name()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

/// Makes a client port attribute usable as one metric name segment. Blank
/// values yield `None`.
pub fn sanitize_port(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '.' || c == ':' { '_' } else { c })
        .collect();
    (!compact.is_empty()).then_some(compact)
}

pub fn metric_prefix(root: &str, hostname: &str, id: &str) -> String {
    format!("{}.{}.zookeeper.{}", root, hostname, id)
}

/// Client port of the first ZooKeeper server group the session exposes.
pub async fn client_port(session: &mut dyn IntrospectionSession) -> Result<Option<String>> {
    for pattern in SERVER_PATTERNS {
        let Some(name) = query_names(session, pattern).await?.into_iter().next() else {
            continue;
        };
        let attributes = bean_attributes(session, &name, &["ClientPort"]).await?;
        let port = attributes
            .get("ClientPort")
            .and_then(|value| match value {
                AttributeValue::Text(text) => Some(text.clone()),
                other => other.as_i64().map(|n| n.to_string()),
            })
            .and_then(|raw| sanitize_port(&raw));
        if port.is_some() {
            return Ok(port);
        }
    }
    Ok(None)
}

/// `<root>.<hostname>.zookeeper.<port>`, or the pid when no port is readable.
pub async fn resolve_prefix(
    session: &mut dyn IntrospectionSession,
    root: &str,
    hostname: &str,
    pid: u32,
) -> Result<String> {
    let id = match client_port(session).await? {
        Some(port) => port,
        None => pid.to_string(),
    };
    Ok(metric_prefix(root, hostname, &id))
}
