//! iperf3 bandwidth test results as gauges

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::Deserialize;
use tokio::process::Command;

use super::StatsdClient;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Upload,
    /// Server sends, client receives (iperf3 reverse mode)
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let display = match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        };
        write!(f, "{}", display)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upload" | "egress" => Ok(Direction::Upload),
            "download" | "ingress" | "reverse" => Ok(Direction::Download),
            _ => Err(format!("Unsupported direction: '{}'", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IperfOptions {
    /// Path to the iperf3 binary
    pub binary: String,
    /// Label for the far end used in metric names, e.g. "gcpuseast1"
    pub dest_name: String,
    pub host: String,
    pub port: u16,
    pub direction: Direction,
    pub streams: u32,
    pub duration: u32,
    /// Target bits/sec
    pub bandwidth: u64,
    pub zerocopy: bool,
}

impl IperfOptions {
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            self.host.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "-P".to_string(),
            self.streams.to_string(),
            "-t".to_string(),
            self.duration.to_string(),
            "-b".to_string(),
            self.bandwidth.to_string(),
            "-J".to_string(),
        ];
        if self.direction == Direction::Download {
            args.push("-R".to_string());
        }
        if self.zerocopy {
            args.push("-Z".to_string());
        }
        args
    }

    fn metric(&self, name: &str) -> String {
        format!(
            "iperf3.{}.{}.{}.{}",
            self.dest_name, self.direction, self.port, name
        )
    }
}

#[derive(Debug, Deserialize)]
struct Report {
    error: Option<String>,
    end: Option<ReportEnd>,
}

#[derive(Debug, Deserialize)]
struct ReportEnd {
    sum_sent: Option<Sum>,
    sum_received: Option<Sum>,
}

#[derive(Debug, Deserialize)]
struct Sum {
    bits_per_second: f64,
    #[serde(default)]
    retransmits: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IperfResult {
    pub sent_mbps: u64,
    pub received_mbps: u64,
    pub retransmits: u64,
}

/// Pull the summary out of `iperf3 -J` output
fn parse_report(output: &str) -> Result<IperfResult> {
    let report: Report = serde_json::from_str(output)?;
    if let Some(error) = report.error {
        return Err(Error::read("iperf3", error));
    }
    let end = report
        .end
        .ok_or_else(|| Error::read("iperf3", "report has no summary"))?;
    let (sent, received) = match (end.sum_sent, end.sum_received) {
        (Some(sent), Some(received)) => (sent, received),
        _ => return Err(Error::read("iperf3", "report is missing sent/received totals")),
    };
    // Whole Mbps, truncated
    Ok(IperfResult {
        sent_mbps: (sent.bits_per_second / 1_000_000.0) as u64,
        received_mbps: (received.bits_per_second / 1_000_000.0) as u64,
        retransmits: sent.retransmits,
    })
}

/// Run one iperf3 client test and emit its gauges
pub async fn collect(options: &IperfOptions, statsd: &StatsdClient) -> Result<IperfResult> {
    let args = options.args();
    info!(
        "Running iperf3 to {} ({}:{}) for {}s",
        options.dest_name, options.host, options.port, options.duration
    );
    debug!("{} {}", options.binary, args.join(" "));
    let output = Command::new(&options.binary).args(&args).output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    // iperf3 still writes a JSON report carrying `error` when it fails
    let result = match parse_report(&stdout) {
        Ok(result) => result,
        Err(err) if output.status.success() => return Err(err),
        Err(err) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::read(
                "iperf3",
                format!("exited with {}: {} {}", output.status, err, stderr.trim()),
            ));
        }
    };
    info!(
        "iperf3 result: sent {} Mbps, received {} Mbps, {} retransmits",
        result.sent_mbps, result.received_mbps, result.retransmits
    );

    let tags = vec![
        format!("iperf_dest:{}", options.dest_name),
        format!("direction:{}", options.direction),
    ];
    statsd
        .gauge(&options.metric("speedtest"), result.received_mbps as f64, &tags)
        .await?;
    statsd
        .gauge(&options.metric("retransmits"), result.retransmits as f64, &tags)
        .await?;
    statsd
        .gauge("iperf3.test.mbps.egress", result.sent_mbps as f64, &tags)
        .await?;
    statsd
        .gauge("iperf3.test.mbps.ingress", result.received_mbps as f64, &tags)
        .await?;
    Ok(result)
}
