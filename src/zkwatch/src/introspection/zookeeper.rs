use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Where a ZooKeeper server accepts client connections, as read from its config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEndpoint {
    pub port: u16,
    pub address: Option<String>,
    /// The config lists quorum peers (`server.N=`).
    pub replicated: bool,
}

impl ClientEndpoint {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let host = match self.address.as_deref() {
            None | Some("0.0.0.0") | Some("::") => "127.0.0.1",
            Some(address) => address,
        };
        format!("{}:{}", host, self.port)
            .parse::<SocketAddr>()
            .or_else(|_| format!("[{}]:{}", host, self.port).parse::<SocketAddr>())
            .with_context(|| format!("invalid client address {}:{}", host, self.port))
    }
}

/// Config file argument of a `QuorumPeerMain`/`ZooKeeperServerMain` java command.
pub fn config_path_from_command(java_command: &str) -> Option<PathBuf> {
    let mut parts = java_command.split_whitespace();
    parts.next()?;
    parts.next().map(PathBuf::from)
}

/// Reads the client endpoint from `zoo.cfg` style `key=value` content.
pub fn parse_client_endpoint(content: &str) -> Option<ClientEndpoint> {
    let mut port = None;
    let mut address = None;
    let mut dynamic_port = None;
    let mut replicated = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "clientPort" => port = value.parse::<u16>().ok(),
            "clientPortAddress" => address = Some(value.to_string()),
            // dynamic config form: server.N=host:peer:election[:role];[addr:]clientPort
            k if k.starts_with("server.") => {
                replicated = true;
                if let Some((_, client)) = value.split_once(';') {
                    let client_port = client.rsplit(':').next().and_then(|p| p.parse().ok());
                    dynamic_port = dynamic_port.or(client_port);
                }
            }
            _ => {}
        }
    }

    port.or(dynamic_port).map(|port| ClientEndpoint {
        port,
        address,
        replicated,
    })
}

pub async fn read_client_endpoint(config_path: &Path) -> Result<ClientEndpoint> {
    let content = tokio::fs::read_to_string(config_path)
        .await
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    parse_client_endpoint(&content)
        .ok_or_else(|| anyhow!("no client port in {}", config_path.display()))
}

/// Output of the `mntr` four letter command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Monitor {
    values: HashMap<String, String>,
}

impl Monitor {
    pub fn parse(response: &str) -> Self {
        let values = response
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Integer value; fractional values (newer servers report averages as
    /// decimals) are rounded.
    pub fn long(&self, key: &str) -> Option<i64> {
        let raw = self.text(key)?;
        raw.parse::<i64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(|v| v.round() as i64))
    }

    pub fn is_standalone(&self) -> bool {
        self.text("zk_server_state")
            .map_or(true, |state| state == "standalone")
    }
}

/// Sends a four letter command and returns the full response.
pub async fn four_letter_word(addr: SocketAddr, command: &str, limit: Duration) -> Result<String> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {}", addr))?;
        stream.write_all(command.as_bytes()).await?;
        stream.flush().await?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        Ok::<_, anyhow::Error>(response)
    };

    timeout(limit, exchange)
        .await
        .map_err(|_| anyhow!("{} to {} timed out after {:?}", command, addr, limit))?
}

pub async fn monitor(endpoint: &ClientEndpoint, limit: Duration) -> Result<Monitor> {
    let response = four_letter_word(endpoint.socket_addr()?, "mntr", limit).await?;
    Ok(Monitor::parse(&response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const MNTR: &str = "zk_version\t3.8.4-9316c2a7a97e1666d8f4593f34dd6fc36ecc436c\n\
zk_server_state\tstandalone\n\
zk_avg_latency\t0.4286\n\
zk_max_latency\t12\n\
zk_min_latency\t0\n\
zk_packets_received\t151\n\
zk_packets_sent\t150\n\
zk_num_alive_connections\t2\n\
zk_outstanding_requests\t0\n\
zk_znode_count\t6\n\
zk_watch_count\t1\n";

    #[test]
    fn test_parse_client_endpoint() {
        let cfg = "# comment\ntickTime=2000\ndataDir=/var/lib/zookeeper\nclientPort=2181\nclientPortAddress=10.0.0.5\n";
        assert_eq!(
            parse_client_endpoint(cfg),
            Some(ClientEndpoint {
                port: 2181,
                address: Some("10.0.0.5".into()),
                replicated: false,
            })
        );
    }

    #[test]
    fn test_parse_client_endpoint_dynamic_form() {
        let cfg = "server.1=zk1:2888:3888:participant;0.0.0.0:2182\n";
        let endpoint = parse_client_endpoint(cfg).unwrap();
        assert_eq!(endpoint.port, 2182);
        assert!(endpoint.replicated);
        assert_eq!(parse_client_endpoint("tickTime=2000\n"), None);
    }

    #[test]
    fn test_config_path_from_command() {
        assert_eq!(
            config_path_from_command("org.apache.zookeeper.server.quorum.QuorumPeerMain /etc/zk/zoo.cfg"),
            Some(PathBuf::from("/etc/zk/zoo.cfg"))
        );
        assert_eq!(
            config_path_from_command("org.apache.zookeeper.server.quorum.QuorumPeerMain"),
            None
        );
    }

    #[test]
    fn test_socket_addr_defaults_to_loopback() {
        let endpoint = ClientEndpoint {
            port: 2181,
            address: Some("0.0.0.0".into()),
            replicated: false,
        };
        assert_eq!(endpoint.socket_addr().unwrap().to_string(), "127.0.0.1:2181");

        let v6 = ClientEndpoint {
            port: 2181,
            address: Some("::1".into()),
            replicated: false,
        };
        assert_eq!(v6.socket_addr().unwrap().to_string(), "[::1]:2181");
    }

    #[test]
    fn test_monitor_parse() {
        let monitor = Monitor::parse(MNTR);
        assert!(monitor.is_standalone());
        assert_eq!(monitor.long("zk_avg_latency"), Some(0));
        assert_eq!(monitor.long("zk_packets_received"), Some(151));
        assert_eq!(monitor.long("zk_missing"), None);

        let refused = Monitor::parse("mntr is not executed because it is not in the whitelist.\n");
        assert!(refused.is_empty());
    }

    #[tokio::test]
    async fn test_monitor_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut command = [0u8; 4];
            socket.read_exact(&mut command).await.unwrap();
            assert_eq!(&command, b"mntr");
            socket.write_all(MNTR.as_bytes()).await.unwrap();
        });

        let endpoint = ClientEndpoint {
            port,
            address: None,
            replicated: false,
        };
        let monitor = monitor(&endpoint, Duration::from_secs(2)).await.unwrap();
        assert_eq!(monitor.long("zk_znode_count"), Some(6));
    }

    #[tokio::test]
    async fn test_monitor_refused_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = ClientEndpoint {
            port,
            address: None,
            replicated: false,
        };
        assert!(monitor(&endpoint, Duration::from_millis(500)).await.is_err());
    }
}
