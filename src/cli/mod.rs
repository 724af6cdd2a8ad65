//! # netops CLI
//!
//! ## Prefix list sync
//! Reconcile the prefix lists on a Megaport Cloud Router with the subnets
//! held in local JSON files. Each prefix list (matched by its description on
//! the MCR) is built from one or more subnet files:
//!
//! ```sh
//! $ netops --params params.toml prefix-sync --dry-run true
//!  Prefix List  ID   Current  Desired  Add  Remove  Result
//! -----------------------------------------------------------------------
//!  aws          101  12       13       1    0       Planned (dry run)
//!  azure        102  4        4        0    0       Unchanged
//!  gcp          103  6        5        0    1       Planned (dry run)
//! ```
//!
//! Every parameter can also come from the environment (`MCR_ID`, `DRY_RUN`,
//! `PREFIX_LISTS`, `MEGAPORT_CLIENT_ID`, ...), which is how the sync is run
//! from CI:
//! ```sh
//! $ PREFIX_LISTS='{"aws": ["aws-subnets.json"]}' DRY_RUN=false netops prefix-sync
//! ```
//!
//! ## Metrics
//! ```sh
//! $ netops metrics mcr-bandwidth --window-mins 30
//! $ netops metrics mcr-status
//! $ netops metrics f5-connections --host bigip.example.net --credentials-file ~/.f5
//! $ netops metrics iperf --dest-name gcpuseast1 --dest-ip 10.60.0.10 --direction upload
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
#[cfg(feature = "cli")]
use colored::*;
use log::{debug, info, warn};

use crate::config::{F5Overrides, MegaportConfig, MegaportOverrides, Params, SyncOverrides};
use crate::megaport::{MegaportClient, MegaportSession};
use crate::metrics::iperf::{Direction, IperfOptions};
use crate::metrics::{bandwidth, f5, iperf, status, CheckStatus, SeriesClient, StatsdClient};
use crate::reconcile::{DesiredState, Reconciler, RunReport};

#[cfg(feature = "cli")]
mod display;
#[cfg(feature = "cli")]
mod table;

/// Timeout for collector requests outside the Megaport API
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[clap(name = "netops", rename_all = "kebab-case")]
/// Network operations: MCR prefix list sync and metric collectors
pub struct Args {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Path to a params.toml supplying defaults for any option
    #[clap(long, env = "NETOPS_PARAMS", global = true)]
    pub params: Option<PathBuf>,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences), global = true)]
    pub verbose: u8,
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Reconcile MCR prefix lists with local subnet files
    #[clap(alias = "sync")]
    PrefixSync(PrefixSyncOptions),
    /// Collect and send metrics
    #[clap(subcommand)]
    Metrics(Metrics),
}

#[derive(Parser, Debug, Clone, Default)]
#[clap(rename_all = "kebab-case")]
pub struct MegaportArgs {
    /// OAuth2 token endpoint
    #[clap(long, env = "MEGAPORT_TOKEN_URL")]
    pub token_url: Option<String>,
    /// Megaport API v2 base URL
    #[clap(long, env = "MEGAPORT_API_URL")]
    pub api_url: Option<String>,
    #[clap(long, env = "MEGAPORT_CLIENT_ID")]
    pub client_id: Option<String>,
    #[clap(long, env = "MEGAPORT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
}

impl From<&MegaportArgs> for MegaportOverrides {
    fn from(args: &MegaportArgs) -> Self {
        Self {
            token_url: args.token_url.clone(),
            api_url: args.api_url.clone(),
            client_id: args.client_id.clone(),
            client_secret: args.client_secret.clone(),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(rename_all = "kebab-case")]
pub struct PrefixSyncOptions {
    /// UID of the MCR holding the prefix lists
    #[clap(long, env = "MCR_ID")]
    pub mcr_id: Option<String>,
    /// "true" to only report changes, "false" to apply them
    #[clap(long, env = "DRY_RUN")]
    pub dry_run: Option<String>,
    /// JSON object of prefix list name -> subnet files,
    /// e.g. '{"aws": ["aws-subnets.json"]}'
    #[clap(long, env = "PREFIX_LISTS")]
    pub prefix_list_map: Option<String>,
    /// Directory holding the subnet files
    #[clap(long, env = "SUBNETS_DIR")]
    pub subnets_dir: Option<PathBuf>,
    #[clap(flatten)]
    pub megaport: MegaportArgs,
}

#[derive(Parser, Debug, Clone, Default)]
#[clap(rename_all = "kebab-case")]
pub struct StatsdArgs {
    /// DogStatsD agent address [default: 127.0.0.1:8125]
    #[clap(long, env = "STATSD_ADDR")]
    pub statsd_addr: Option<String>,
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub enum Metrics {
    /// Send MCR bandwidth telemetry to the Datadog series API
    #[clap(alias = "bw")]
    McrBandwidth(BandwidthOptions),
    /// Send a service check per live MCR, VXC and BGP peer
    McrStatus(StatusOptions),
    /// Send F5 virtual server connection counts
    F5Connections(F5Options),
    /// Run an iperf3 test and send the results
    Iperf(IperfArgs),
}

#[derive(Parser, Debug, Clone)]
#[clap(rename_all = "kebab-case")]
pub struct BandwidthOptions {
    /// Datadog metric prefix
    #[clap(short, long, default_value = "megaport")]
    pub metric: String,
    /// Minutes of telemetry to fetch (at most one week)
    #[clap(long, default_value_t = 30)]
    pub window_mins: u32,
    #[clap(long, env = "DD_API_KEY", hide_env_values = true)]
    pub dd_api_key: Option<String>,
    #[clap(flatten)]
    pub megaport: MegaportArgs,
}

#[derive(Parser, Debug, Clone)]
#[clap(rename_all = "kebab-case")]
pub struct StatusOptions {
    #[clap(flatten)]
    pub statsd: StatsdArgs,
    #[clap(flatten)]
    pub megaport: MegaportArgs,
}

#[derive(Parser, Debug, Clone)]
#[clap(rename_all = "kebab-case")]
pub struct F5Options {
    /// BIG-IP management host
    #[clap(long, env = "F5_HOST")]
    pub host: Option<String>,
    #[clap(long, env = "F5_USERNAME")]
    pub username: Option<String>,
    #[clap(long, env = "F5_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// File with the username on line 1 and the password on line 2
    #[clap(long)]
    pub credentials_file: Option<PathBuf>,
    /// Accept invalid TLS certificates
    #[clap(long)]
    pub insecure: bool,
    /// Metric prefix [default: f5metrics.<host>]
    #[clap(long)]
    pub metric_prefix: Option<String>,
    #[clap(flatten)]
    pub statsd: StatsdArgs,
}

#[derive(Parser, Debug, Clone)]
#[clap(rename_all = "kebab-case")]
pub struct IperfArgs {
    /// Name of the remote site, used in metric names
    #[clap(long)]
    pub dest_name: String,
    /// iperf3 server address
    #[clap(long, env = "REMOTE_SITE_IP")]
    pub dest_ip: String,
    #[clap(long, default_value_t = 5201)]
    pub dest_port: u16,
    /// upload, or download (iperf3 reverse mode)
    #[clap(long, default_value = "upload")]
    pub direction: Direction,
    #[clap(long, default_value_t = 1)]
    pub streams: u32,
    /// Test duration in seconds
    #[clap(long, default_value_t = 10)]
    pub duration: u32,
    /// Target bandwidth in bits/sec
    #[clap(long, default_value_t = 1_000_000_000)]
    pub bandwidth: u64,
    /// Disable zero-copy sends
    #[clap(long)]
    pub no_zerocopy: bool,
    /// Path to the iperf3 binary
    #[clap(long, default_value = "iperf3")]
    pub iperf3: String,
    #[clap(flatten)]
    pub statsd: StatsdArgs,
}

impl From<&IperfArgs> for IperfOptions {
    fn from(args: &IperfArgs) -> Self {
        Self {
            binary: args.iperf3.clone(),
            dest_name: args.dest_name.clone(),
            host: args.dest_ip.clone(),
            port: args.dest_port,
            direction: args.direction,
            streams: args.streams,
            duration: args.duration,
            bandwidth: args.bandwidth,
            zerocopy: !args.no_zerocopy,
        }
    }
}

async fn login(config: &MegaportConfig) -> crate::error::Result<MegaportSession> {
    debug!("Megaport API at {}", config.api_url);
    MegaportClient::new(&config.api_url, config.timeout)?
        .login(&config.token_url, &config.credentials)
        .await
}

async fn prefix_sync(params: &Params, options: &PrefixSyncOptions) -> Result<(), Box<dyn Error>> {
    let config = params.sync_config(SyncOverrides {
        mcr_id: options.mcr_id.clone(),
        dry_run: options.dry_run.clone(),
        prefix_list_map: options.prefix_list_map.clone(),
        subnets_dir: options.subnets_dir.clone(),
        megaport: (&options.megaport).into(),
    })?;
    info!(
        "Syncing {} prefix lists on MCR {} (dry run: {})",
        config.prefix_lists.len(),
        config.mcr_id,
        config.dry_run
    );
    let desired = DesiredState::load(&config.subnets_dir, &config.prefix_lists)?;
    let session = login(&config.megaport).await?;

    let reconciler = Reconciler::new(desired, config.dry_run);
    let report = reconciler.run(&session.mcr(&config.mcr_id)).await?;
    print_report(&report);

    let failures = report.failures();
    if failures > 0 {
        return Err(format!("{} of {} prefix lists failed to sync", failures, report.lists.len()).into());
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn print_report(report: &RunReport) {
    use display::{PlanSummaryRow, PrefixChangeRow};

    let mut summary = table::OutputTable::new();
    for list in &report.lists {
        summary.add_row(&PlanSummaryRow(list));
    }
    summary.print();

    let changes: Vec<_> = report.lists.iter().flat_map(PrefixChangeRow::for_report).collect();
    if !changes.is_empty() {
        println!();
        let mut table = table::OutputTable::new();
        for row in &changes {
            table.add_row(row);
        }
        table.print();
    }
}

#[cfg(not(feature = "cli"))]
fn print_report(report: &RunReport) {
    for list in &report.lists {
        info!("{}: {:?}", list.name, list.outcome);
    }
}

async fn run_metrics(params: &Params, metrics: &Metrics) -> Result<(), Box<dyn Error>> {
    match metrics {
        Metrics::McrBandwidth(options) => {
            let window = bandwidth::telemetry_window(options.window_mins)?;
            let datadog = params.datadog_config(options.dd_api_key.clone())?;
            let series = SeriesClient::new(&datadog, HTTP_TIMEOUT)?;
            let session = login(&params.megaport_config((&options.megaport).into())?).await?;
            let sent = bandwidth::collect(&session, &series, &options.metric, window).await?;
            info!("Sent bandwidth for {} MCRs", sent);
        }
        Metrics::McrStatus(options) => {
            let statsd = StatsdClient::connect(&params.statsd_config(options.statsd.statsd_addr.clone())).await?;
            let session = login(&params.megaport_config((&options.megaport).into())?).await?;
            let resources = status::collect(&session, &statsd).await?;
            let failing = resources.iter().filter(|r| r.status != CheckStatus::Ok).count();
            if failing > 0 {
                warn!("{} of {} Megaport resources are not healthy", failing, resources.len());
            }
        }
        Metrics::F5Connections(options) => {
            let config = params.f5_config(F5Overrides {
                host: options.host.clone(),
                username: options.username.clone(),
                password: options.password.clone(),
                credentials_file: options.credentials_file.clone(),
                insecure: options.insecure,
                metric_prefix: options.metric_prefix.clone(),
            })?;
            let statsd = StatsdClient::connect(&params.statsd_config(options.statsd.statsd_addr.clone())).await?;
            f5::collect(&config, &statsd, HTTP_TIMEOUT).await?;
        }
        Metrics::Iperf(args) => {
            let statsd = StatsdClient::connect(&params.statsd_config(args.statsd.statsd_addr.clone())).await?;
            iperf::collect(&IperfOptions::from(args), &statsd).await?;
        }
    }
    Ok(())
}

async fn run_cmd(args: &Args) -> Result<(), Box<dyn Error>> {
    let params = Params::load(args.params.as_deref())?;
    match &args.cmd {
        Command::PrefixSync(options) => prefix_sync(&params, options).await,
        Command::Metrics(metrics) => run_metrics(&params, metrics).await,
    }
}

/// Run the parsed command, returning the process exit code
pub async fn run(args: &Args) -> i32 {
    match run_cmd(args).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(err.as_ref());
            1
        }
    }
}

#[cfg(feature = "cli")]
fn report_error(err: &dyn Error) {
    eprintln!("{}", err.to_string().red());
}

#[cfg(not(feature = "cli"))]
fn report_error(err: &dyn Error) {
    eprintln!("{}", err);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix_sync() {
        let args = Args::try_parse_from(&[
            "netops",
            "-vv",
            "prefix-sync",
            "--mcr-id",
            "mcr-1",
            "--dry-run",
            "false",
            "--prefix-list-map",
            r#"{"aws": ["aws-subnets.json"]}"#,
            "--client-id",
            "abc",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        match args.cmd {
            Command::PrefixSync(options) => {
                assert_eq!(options.mcr_id.as_deref(), Some("mcr-1"));
                assert_eq!(options.dry_run.as_deref(), Some("false"));
                assert_eq!(options.megaport.client_id.as_deref(), Some("abc"));
            }
            cmd => panic!("Unexpected command {:?}", cmd),
        }
    }

    #[test]
    fn test_parse_iperf() {
        let args = Args::try_parse_from(&[
            "netops",
            "metrics",
            "iperf",
            "--dest-name",
            "gcpuseast1",
            "--dest-ip",
            "10.60.0.10",
            "--direction",
            "download",
            "--no-zerocopy",
        ])
        .unwrap();
        match args.cmd {
            Command::Metrics(Metrics::Iperf(iperf)) => {
                let options = IperfOptions::from(&iperf);
                assert_eq!(options.direction, Direction::Download);
                assert_eq!(options.port, 5201);
                assert_eq!(options.streams, 1);
                assert!(!options.zerocopy);
            }
            cmd => panic!("Unexpected command {:?}", cmd),
        }
    }

    #[test]
    fn test_bandwidth_defaults() {
        let args = Args::try_parse_from(&["netops", "metrics", "mcr-bandwidth"]).unwrap();
        match args.cmd {
            Command::Metrics(Metrics::McrBandwidth(options)) => {
                assert_eq!(options.metric, "megaport");
                assert_eq!(options.window_mins, 30);
            }
            cmd => panic!("Unexpected command {:?}", cmd),
        }
    }

    #[test]
    fn test_negative_window_rejected() {
        assert!(Args::try_parse_from(&["netops", "metrics", "mcr-bandwidth", "--window-mins", "-5"]).is_err());
    }

    #[tokio::test]
    async fn test_oversized_window_fails_before_login() {
        let args = Args::try_parse_from(&[
            "netops",
            "metrics",
            "mcr-bandwidth",
            "--window-mins",
            "4000000000",
            "--dd-api-key",
            "key",
        ])
        .unwrap();
        let err = run_cmd(&args).await.unwrap_err();
        assert!(err.to_string().contains("Telemetry window"));
    }

    #[tokio::test]
    async fn test_invalid_dry_run_fails_before_login() {
        let args = Args::try_parse_from(&[
            "netops",
            "prefix-sync",
            "--mcr-id",
            "mcr-1",
            "--dry-run",
            "maybe",
            "--prefix-list-map",
            r#"{"aws": ["aws-subnets.json"]}"#,
            "--client-id",
            "abc",
            "--client-secret",
            "xyz",
        ])
        .unwrap();
        let err = run_cmd(&args).await.unwrap_err();
        assert!(err.to_string().contains("dry_run"));
    }
}
