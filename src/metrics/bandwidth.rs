//! Megaport MCR bandwidth telemetry forwarded as Datadog series

use chrono::{Duration, Utc};
use log::{info, warn};

use super::{Series, SeriesClient};
use crate::error::{Error, Result};
use crate::megaport::{MegaportSession, Product, TelemetrySeries};

/// Longest telemetry window accepted (one week)
pub const MAX_WINDOW_MINS: u32 = 7 * 24 * 60;

/// Telemetry lookback for `mins` minutes, between 1 and [`MAX_WINDOW_MINS`]
pub fn telemetry_window(mins: u32) -> Result<Duration> {
    if mins == 0 || mins > MAX_WINDOW_MINS {
        return Err(Error::config(format!(
            "Telemetry window must be between 1 and {} minutes, got {}",
            MAX_WINDOW_MINS, mins
        )));
    }
    Ok(Duration::minutes(i64::from(mins)))
}

/// Turn raw telemetry into mbps_in / mbps_out series for one product
///
/// Samples arrive as `[epoch_ms, value]`; Datadog wants epoch seconds.
/// Subtypes other than In and Out are skipped.
pub fn telemetry_series(prefix: &str, product: &Product, telemetry: &[TelemetrySeries]) -> Vec<Series> {
    let tags = vec![
        "source:netops".to_string(),
        format!("product_name:{}", product.product_name),
        format!("product_uid:{}", product.product_uid),
    ];
    let mut mbps_in = Vec::new();
    let mut mbps_out = Vec::new();
    for series in telemetry {
        let points = match series.subtype.as_str() {
            "In" => &mut mbps_in,
            "Out" => &mut mbps_out,
            _ => continue,
        };
        points.extend(
            series
                .samples
                .iter()
                .map(|(ms, value)| ((*ms / 1000.0) as i64, *value)),
        );
    }
    vec![
        Series::gauge(format!("{}.bandwidth.mbps_in", prefix), mbps_in, tags.clone()),
        Series::gauge(format!("{}.bandwidth.mbps_out", prefix), mbps_out, tags),
    ]
}

/// Fetch the last `window` of telemetry for every MCR and submit it
///
/// A product whose telemetry cannot be read is skipped.
pub async fn collect(
    session: &MegaportSession,
    series: &SeriesClient,
    prefix: &str,
    window: Duration,
) -> Result<usize> {
    let to = Utc::now();
    let from = to - window;
    let products = session.products(false).await?;
    let mut submitted = 0;
    for product in products.iter().filter(|p| p.is_mcr()) {
        let telemetry = match session.telemetry(&product.product_uid, from, to).await {
            Ok(telemetry) => telemetry,
            Err(err) => {
                warn!("Skipping telemetry for {}: {}", product.product_name, err);
                continue;
            }
        };
        let batch = telemetry_series(prefix, product, &telemetry);
        series.submit(&batch).await?;
        submitted += 1;
        info!("Sent bandwidth series for {}", product.product_name);
    }
    Ok(submitted)
}
