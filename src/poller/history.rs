use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::aggregate::{self, SeriesPoint};
use crate::app::AppContext;
use crate::state::HistoricalPoint;
use crate::upstream::{self, Field};

/// One history cycle: for every sensor in the latest refresh, fetch the
/// lookback window in chunks, reduce each tracked metric to a dense
/// daily series, and publish the merged map wholesale.
#[instrument(skip_all)]
pub async fn run(ctx: &AppContext) -> Result<()> {
    let now = Utc::now();
    let lookback_days = ctx.config.history.lookback_days;
    let windows = upstream::plan(lookback_days, ctx.config.history.chunk_days, now)?;

    let sensors = ctx.state.get_snapshots().await.sensors;
    let mut historical = HashMap::with_capacity(sensors.len());

    for sensor in &sensors {
        let (pm25_chunks, temperature_chunks, humidity_chunks) = tokio::join!(
            ctx.upstream.fetch_all(&sensor.id, Field::Pm25, &windows),
            ctx.upstream.fetch_all(&sensor.id, Field::Temperature, &windows),
            ctx.upstream.fetch_all(&sensor.id, Field::Humidity, &windows),
        );

        let points = merge_daily(
            aggregate::reduce_daily(&pm25_chunks, lookback_days, now),
            aggregate::reduce_daily(&temperature_chunks, lookback_days, now),
            aggregate::reduce_daily(&humidity_chunks, lookback_days, now),
        );

        debug!(
            sensor = %sensor.id,
            days = points.len(),
            "historical series rebuilt"
        );
        historical.insert(sensor.id.clone(), points);
    }

    ctx.state.update_historical(historical).await;
    Ok(())
}

/// Zip per-metric daily series into one point per calendar day. The
/// inputs share length and timestamps because they come from the same
/// reduction span.
fn merge_daily(
    pm25: Vec<SeriesPoint>,
    temperature: Vec<SeriesPoint>,
    humidity: Vec<SeriesPoint>,
) -> Vec<HistoricalPoint> {
    pm25.into_iter()
        .zip(temperature)
        .zip(humidity)
        .map(|((pm25, temperature), humidity)| HistoricalPoint {
            timestamp: pm25.timestamp,
            pm25: pm25.value,
            temperature: temperature.value,
            humidity: humidity.value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn merge_keeps_per_metric_absence_independent() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let point = |value| SeriesPoint {
            timestamp: ts,
            value,
        };

        let merged = merge_daily(
            vec![point(Some(12.5))],
            vec![point(None)],
            vec![point(Some(48.0))],
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pm25, Some(12.5));
        assert_eq!(merged[0].temperature, None);
        assert_eq!(merged[0].humidity, Some(48.0));
    }
}
