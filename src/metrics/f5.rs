//! F5 BIG-IP current connection counts via iControl REST

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;

use super::StatsdClient;
use crate::config::F5Config;
use crate::error::{Error, Result};

const CLIENT_CONNS: &str = "clientside.curConns";

#[derive(Debug, Default, Deserialize)]
struct VirtualStats {
    #[serde(default = "HashMap::new")]
    entries: HashMap<String, VirtualEntry>,
}

#[derive(Debug, Deserialize)]
struct VirtualEntry {
    #[serde(rename = "nestedStats")]
    nested_stats: NestedStats,
}

#[derive(Debug, Deserialize)]
struct NestedStats {
    #[serde(default = "HashMap::new")]
    entries: HashMap<String, StatValue>,
}

#[derive(Debug, Deserialize)]
struct StatValue {
    value: Option<f64>,
    description: Option<String>,
}

impl VirtualEntry {
    fn client_connections(&self) -> f64 {
        self.nested_stats
            .entries
            .get(CLIENT_CONNS)
            .and_then(|stat| stat.value)
            .unwrap_or(0.0)
    }

    /// Full path of the virtual server, e.g. "/Common/vpn_ssl_tcp"
    fn tm_name(&self) -> Option<&str> {
        self.nested_stats
            .entries
            .get("tmName")
            .and_then(|stat| stat.description.as_deref())
    }
}

#[derive(Debug, PartialEq)]
pub struct ConnectionCounts {
    /// Client-side connections across every virtual server
    pub total: f64,
    /// metric suffix -> connections on the configured virtual server
    pub per_server: BTreeMap<String, f64>,
}

fn count_connections(
    stats: &VirtualStats,
    virtual_servers: &BTreeMap<String, String>,
) -> Result<ConnectionCounts> {
    let total = stats.entries.values().map(VirtualEntry::client_connections).sum();
    let mut per_server = BTreeMap::new();
    for (metric, server) in virtual_servers {
        let entry = stats
            .entries
            .iter()
            .find(|(key, entry)| *key == server || entry.tm_name() == Some(server.as_str()))
            .map(|(_, entry)| entry)
            .ok_or_else(|| Error::read("virtual/stats", format!("No stats for virtual server '{}'", server)))?;
        per_server.insert(metric.clone(), entry.client_connections());
    }
    Ok(ConnectionCounts { total, per_server })
}

/// Read virtual server stats and emit connection gauges
pub async fn collect(
    config: &F5Config,
    statsd: &StatsdClient,
    timeout: Duration,
) -> Result<ConnectionCounts> {
    let client = Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(config.insecure)
        .build()?;
    let url = format!("https://{}/mgmt/tm/ltm/virtual/stats", config.host);
    debug!("GET {}", url);
    let response = client
        .get(&url)
        .basic_auth(&config.username, Some(&config.password))
        .send()
        .await
        .map_err(|err| Error::read(&url, err))?;
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Auth(format!("{}: {}", url, status)));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::read(&url, format!("{} {}", status, body)));
    }
    let stats: VirtualStats = response.json().await.map_err(|err| Error::read(&url, err))?;
    info!("Got stats for {} virtual servers from {}", stats.entries.len(), config.host);

    let counts = count_connections(&stats, &config.virtual_servers)?;
    statsd
        .gauge(
            &format!("{}.sys.connections.count", config.metric_prefix),
            counts.total,
            &[],
        )
        .await?;
    for (metric, conns) in &counts.per_server {
        statsd
            .gauge(&format!("{}.{}", config.metric_prefix, metric), *conns, &[])
            .await?;
    }
    info!(
        "Sent {} connection gauges for {} (total {})",
        counts.per_server.len() + 1,
        config.host,
        counts.total
    );
    Ok(counts)
}
