use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::debug;
use rand::Rng;

use super::DnsClient;

/// Used when the caller supplies no nameservers.
pub const DEFAULT_NAMESERVERS: [&str; 10] = [
    "223.5.5.5:53",
    "223.6.6.6:53",
    "8.8.8.8:53",
    "8.8.4.4:53",
    "9.9.9.9:53",
    "114.114.114.114:53",
    "114.114.115.115:53",
    "1.2.4.8:53",
    "210.2.4.8:53",
    "119.29.29.29:53",
];

const REACHABILITY_PROBE_DOMAIN: &str = "www.baidu.com";
const REACHABILITY_ATTEMPTS: usize = 3;

/// Read-only after startup pruning; clones share the same backing slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameserverPool {
    servers: Arc<[SocketAddr]>,
}

impl NameserverPool {
    pub fn new(servers: Vec<SocketAddr>) -> Self {
        Self {
            servers: servers.into(),
        }
    }

    pub fn defaults() -> Self {
        Self::new(default_nameservers())
    }

    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Picks one nameserver uniformly at random.
    pub fn pick(&self) -> Option<SocketAddr> {
        if self.servers.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.servers.len());
        Some(self.servers[idx])
    }
}

pub fn default_nameservers() -> Vec<SocketAddr> {
    DEFAULT_NAMESERVERS
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Parses a comma-separated list of nameserver IPs, appending port 53.
pub fn parse_nameservers_csv(value: &str) -> Result<Vec<SocketAddr>, String> {
    let mut out: Vec<SocketAddr> = Vec::new();
    for part in value.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let ip: IpAddr = item
            .parse()
            .map_err(|_| format!("invalid nameserver '{item}', expected an IP address"))?;
        let addr = SocketAddr::new(ip, 53);
        if !out.contains(&addr) {
            out.push(addr);
        }
    }
    if out.is_empty() {
        return Err("nameserver list is empty".to_string());
    }
    Ok(out)
}

/// Returns true on the first successful exchange with `nameserver`.
pub async fn probe_reachable(nameserver: SocketAddr, timeout: Duration) -> bool {
    let client = DnsClient::new(NameserverPool::new(vec![nameserver])).with_timeout(timeout);
    for attempt in 1..=REACHABILITY_ATTEMPTS {
        match client.exchange(REACHABILITY_PROBE_DOMAIN, nameserver).await {
            Ok(_) => return true,
            Err(e) => debug!(
                "nameserver {nameserver} probe {attempt}/{REACHABILITY_ATTEMPTS} failed: {e}"
            ),
        }
    }
    false
}

/// Splits `servers` into `(reachable, unreachable)`, keeping the input order.
pub async fn prune_unreachable(
    servers: &[SocketAddr],
    timeout: Duration,
) -> (Vec<SocketAddr>, Vec<SocketAddr>) {
    let probes = servers.iter().map(|ns| probe_reachable(*ns, timeout));
    let outcomes = join_all(probes).await;

    let mut reachable = Vec::with_capacity(servers.len());
    let mut unreachable = Vec::new();
    for (ns, ok) in servers.iter().zip(outcomes) {
        if ok {
            reachable.push(*ns);
        } else {
            unreachable.push(*ns);
        }
    }
    (reachable, unreachable)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{spawn_fake_nameserver, spawn_silent_nameserver};
    use super::*;

    #[test]
    fn parses_nameserver_csv_with_default_port() {
        let servers = parse_nameservers_csv("8.8.8.8, 1.1.1.1,8.8.8.8").unwrap();
        assert_eq!(
            servers,
            vec![
                "8.8.8.8:53".parse::<SocketAddr>().unwrap(),
                "1.1.1.1:53".parse::<SocketAddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn rejects_hostnames_and_empty_lists() {
        assert!(parse_nameservers_csv("dns.google").is_err());
        assert!(parse_nameservers_csv(" , ").is_err());
    }

    #[test]
    fn default_list_is_fully_parsed() {
        assert_eq!(default_nameservers().len(), DEFAULT_NAMESERVERS.len());
    }

    #[test]
    fn pick_stays_inside_pool() {
        let pool = NameserverPool::defaults();
        for _ in 0..50 {
            let ns = pool.pick().unwrap();
            assert!(pool.servers().contains(&ns));
        }
        assert!(NameserverPool::new(Vec::new()).pick().is_none());
    }

    #[tokio::test]
    async fn prune_separates_silent_nameservers() {
        let live = spawn_fake_nameserver().await;
        let dead = spawn_silent_nameserver().await;
        let (reachable, unreachable) =
            prune_unreachable(&[dead, live], Duration::from_millis(100)).await;
        assert_eq!(reachable, vec![live]);
        assert_eq!(unreachable, vec![dead]);
    }
}
