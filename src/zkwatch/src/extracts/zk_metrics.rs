use crate::extracts::{bean_attributes, query_names, MetricWriter, MetricsCollector};
use crate::introspection::IntrospectionSession;
use anyhow::Result;
use async_trait::async_trait;

const SERVER_ATTRIBUTES: [(&str, &str); 7] = [
    ("NumAliveConnections", "numAliveConnections"),
    ("OutstandingRequests", "outstandingRequests"),
    ("PacketsReceived", "packetsReceived"),
    ("PacketsSent", "packetsSent"),
    ("MinRequestLatency", "minRequestLatency"),
    ("AvgRequestLatency", "avgRequestLatency"),
    ("MaxRequestLatency", "maxRequestLatency"),
];

const DATA_TREE_ATTRIBUTES: [(&str, &str); 2] =
    [("NodeCount", "nodeCount"), ("WatchCount", "watchCount")];

/// Server and data tree groups of a ZooKeeper server, standalone or replicated.
pub struct ZkMetricsCollector;

impl ZkMetricsCollector {
    async fn server(
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
        mode: &str,
        section: &str,
    ) -> Result<()> {
        let pattern = format!("org.apache.ZooKeeperService:name0={}Server_port*", mode);
        if let Some(name) = query_names(session, &pattern).await?.into_iter().next() {
            let requested: Vec<&str> = SERVER_ATTRIBUTES.iter().map(|(a, _)| *a).collect();
            let attributes = bean_attributes(session, &name, &requested).await?;
            for (attribute, metric) in SERVER_ATTRIBUTES {
                writer.numeric(&format!("zk.{}.{}", section, metric), attributes.get(attribute))?;
            }
        }

        let pattern = format!(
            "org.apache.ZooKeeperService:name0={}Server_port*,name1=InMemoryDataTree",
            mode
        );
        if let Some(name) = query_names(session, &pattern).await?.into_iter().next() {
            let requested: Vec<&str> = DATA_TREE_ATTRIBUTES.iter().map(|(a, _)| *a).collect();
            let attributes = bean_attributes(session, &name, &requested).await?;
            for (attribute, metric) in DATA_TREE_ATTRIBUTES {
                writer.numeric(
                    &format!("zk.{}.nodeTree.{}", section, metric),
                    attributes.get(attribute),
                )?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsCollector for ZkMetricsCollector {
    fn name(&self) -> &'static str {
        "zookeeper"
    }

    async fn collect(
        &self,
        session: &mut dyn IntrospectionSession,
        writer: &mut MetricWriter<'_>,
    ) -> Result<()> {
        Self::server(session, writer, "Standalone", "standaloneServer").await?;
        Self::server(session, writer, "Replicated", "replicatedServer").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extracts::test_support::StaticSession;
    use crate::introspection::AttributeValue;
    use crate::metrics::{MetricScope, MetricValue, MetricsRegistry};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_standalone_server_and_data_tree() {
        let mut session = StaticSession::default()
            .with(
                "org.apache.ZooKeeperService:name0=StandaloneServer_port2181",
                &[
                    ("NumAliveConnections", AttributeValue::Long(3)),
                    ("AvgRequestLatency", AttributeValue::Long(1)),
                ],
            )
            .with(
                "org.apache.ZooKeeperService:name0=StandaloneServer_port2181,name1=InMemoryDataTree",
                &[
                    ("NodeCount", AttributeValue::Int(42)),
                    ("WatchCount", AttributeValue::Int(7)),
                ],
            );
        let registry = Arc::new(MetricsRegistry::new());
        let mut scope = MetricScope::new(Arc::clone(&registry));
        let mut writer = MetricWriter::new("one_min.h.zookeeper.2181", &mut scope);

        ZkMetricsCollector
            .collect(&mut session, &mut writer)
            .await
            .unwrap();

        assert_eq!(
            registry.names(),
            vec![
                "one_min.h.zookeeper.2181.zk.standaloneServer.avgRequestLatency",
                "one_min.h.zookeeper.2181.zk.standaloneServer.nodeTree.nodeCount",
                "one_min.h.zookeeper.2181.zk.standaloneServer.nodeTree.watchCount",
                "one_min.h.zookeeper.2181.zk.standaloneServer.numAliveConnections",
            ]
        );
        assert_eq!(
            registry
                .get("one_min.h.zookeeper.2181.zk.standaloneServer.nodeTree.nodeCount")
                .map(|m| m.current()),
            Some(MetricValue::Integer(42))
        );
    }

    #[tokio::test]
    async fn test_replicated_server_section() {
        let mut session = StaticSession::default().with(
            "org.apache.ZooKeeperService:name0=ReplicatedServer_port2181",
            &[("PacketsSent", AttributeValue::Long(9))],
        );
        let registry = Arc::new(MetricsRegistry::new());
        let mut scope = MetricScope::new(Arc::clone(&registry));
        let mut writer = MetricWriter::new("p", &mut scope);

        ZkMetricsCollector
            .collect(&mut session, &mut writer)
            .await
            .unwrap();

        assert_eq!(registry.names(), vec!["p.zk.replicatedServer.packetsSent"]);
    }
}
