use std::fmt;

use log::debug;
use tokio::net::UdpSocket;

use crate::config::StatsdConfig;
use crate::error::{Error, Result};

/// DogStatsD service check status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl CheckStatus {
    pub fn from_ok(ok: bool) -> Self {
        if ok {
            CheckStatus::Ok
        } else {
            CheckStatus::Critical
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Fire-and-forget DogStatsD client over UDP
pub struct StatsdClient {
    socket: UdpSocket,
    tags: Vec<String>,
}

impl StatsdClient {
    pub async fn connect(config: &StatsdConfig) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await.map_err(|err| {
            Error::config(format!("Invalid statsd address '{}': {}", config.addr, err))
        })?;
        Ok(Self {
            socket,
            tags: config.tags.clone(),
        })
    }

    fn all_tags(&self, tags: &[String]) -> Vec<String> {
        self.tags.iter().chain(tags.iter()).cloned().collect()
    }

    async fn send(&self, line: String) -> Result<()> {
        debug!("statsd: {}", line);
        self.socket.send(line.as_bytes()).await.map_err(|err| Error::Write {
            target: "statsd".to_string(),
            status: "send failed".to_string(),
            reason: err.to_string(),
        })?;
        Ok(())
    }

    pub async fn gauge(&self, name: &str, value: f64, tags: &[String]) -> Result<()> {
        self.send(format_gauge(name, value, &self.all_tags(tags))).await
    }

    pub async fn service_check(
        &self,
        name: &str,
        status: CheckStatus,
        hostname: &str,
        message: &str,
        tags: &[String],
    ) -> Result<()> {
        self.send(format_service_check(
            name,
            status,
            hostname,
            message,
            &self.all_tags(tags),
        ))
        .await
    }
}

/// `name:value|g|#tag1,tag2`
pub fn format_gauge(name: &str, value: f64, tags: &[String]) -> String {
    let mut line = format!("{}:{}|g", name, value);
    if !tags.is_empty() {
        line.push_str("|#");
        line.push_str(&tags.join(","));
    }
    line
}

/// `_sc|name|status|h:hostname|#tags|m:message`
pub fn format_service_check(
    name: &str,
    status: CheckStatus,
    hostname: &str,
    message: &str,
    tags: &[String],
) -> String {
    let mut line = format!("_sc|{}|{}", name, status);
    if !hostname.is_empty() {
        line.push_str(&format!("|h:{}", hostname));
    }
    if !tags.is_empty() {
        line.push_str(&format!("|#{}", tags.join(",")));
    }
    if !message.is_empty() {
        // The message must be the last field and cannot span lines
        line.push_str(&format!("|m:{}", message.replace('\n', "\\n")));
    }
    line
}
