//! Metric collectors and the sinks they report to
//!
//! Each collector reads one source and pushes to either DogStatsD
//! ([`StatsdClient`], fire-and-forget UDP) or the Datadog series API
//! ([`SeriesClient`], timestamped points).

pub mod bandwidth;
pub mod f5;
pub mod iperf;
pub mod series;
pub mod statsd;
pub mod status;

pub use series::{Series, SeriesClient};
pub use statsd::{format_gauge, format_service_check, CheckStatus, StatsdClient};
