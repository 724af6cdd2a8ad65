use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde::Serialize;

use crate::config::DatadogConfig;
use crate::error::{Error, Result};

/// A gauge with explicit `(epoch_seconds, value)` points
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub metric: String,
    pub points: Vec<(i64, f64)>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tags: Vec<String>,
}

impl Series {
    pub fn gauge(metric: String, points: Vec<(i64, f64)>, tags: Vec<String>) -> Self {
        Self {
            metric,
            points,
            kind: "gauge",
            tags,
        }
    }
}

#[derive(Debug, Serialize)]
struct SeriesPayload<'a> {
    series: &'a [Series],
}

/// Datadog HTTP API client for timestamped series
pub struct SeriesClient {
    client: Client,
    url: String,
    api_key: String,
}

impl SeriesClient {
    pub fn new(config: &DatadogConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: format!("{}/api/v1/series", config.api_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn submit(&self, series: &[Series]) -> Result<()> {
        let points: usize = series.iter().map(|s| s.points.len()).sum();
        if points == 0 {
            debug!("No points to submit");
            return Ok(());
        }
        let response = self
            .client
            .post(&self.url)
            .header("DD-API-KEY", &self.api_key)
            .json(&SeriesPayload { series })
            .send()
            .await
            .map_err(|err| Error::Write {
                target: self.url.clone(),
                status: "no response".to_string(),
                reason: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Write {
                target: self.url.clone(),
                status: status.to_string(),
                reason: body,
            });
        }
        info!("Submitted {} series ({} points)", series.len(), points);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_payload() {
        let series = vec![Series::gauge(
            "megaport.bandwidth.mbps_in".to_string(),
            vec![(1700000000, 12.5)],
            vec!["product_uid:abc".to_string()],
        )];
        let value = serde_json::to_value(&SeriesPayload { series: &series }).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"series": [{
                "metric": "megaport.bandwidth.mbps_in",
                "points": [[1700000000, 12.5]],
                "type": "gauge",
                "tags": ["product_uid:abc"]
            }]})
        );
    }
}
