use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::aggregate;
use crate::alerts::{self, AlertBatch};
use crate::app::AppContext;
use crate::aqi::{aqi_category, calculate_aqi};
use crate::state::{HourlyPoint, Location, SensorSnapshot, Statistics};
use crate::upstream::{Field, FetchWindow, RegistryEntry, WindowData};

/// One refresh cycle: registry, per-sensor snapshots, the hourly
/// overview, statistics, and the safe -> unhealthy alert delta. The
/// results replace the previous cycle's wholesale.
#[instrument(skip_all)]
pub async fn run(ctx: &AppContext) -> Result<()> {
    let registry = ctx.upstream.list_sensors().await?;

    let mut snapshots: Vec<SensorSnapshot> = join_all(
        registry
            .iter()
            .map(|(id, entry)| build_snapshot(ctx, id, entry)),
    )
    .await
    .into_iter()
    .flatten()
    .collect();
    snapshots.sort_by(|a, b| a.id.cmp(&b.id));

    let hourly = hourly_overview(ctx, &snapshots).await;
    let statistics = compute_statistics(&snapshots);

    let triggered = ctx.health.lock().await.observe(&snapshots);
    if !triggered.is_empty() {
        info!(count = triggered.len(), "sensors flipped safe -> unhealthy");
        ctx.metrics.inc_alerts(triggered.len());
        if let Some(url) = &ctx.config.notifiers.alert_webhook {
            let batch = AlertBatch { sensors: triggered };
            if let Err(err) = alerts::notify_webhook(ctx.upstream.http(), url, &batch).await {
                warn!(error = %err, "failed to deliver alert batch");
            }
        }
    }

    ctx.metrics.set_sensor_metrics(&snapshots);
    ctx.state.update_refresh(snapshots, statistics, hourly).await;
    Ok(())
}

async fn build_snapshot(
    ctx: &AppContext,
    id: &str,
    entry: &RegistryEntry,
) -> Option<SensorSnapshot> {
    match snapshot_for(ctx, id, entry).await {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(sensor = id, name = %entry.name, error = %err, "skipping sensor this cycle");
            None
        }
    }
}

async fn snapshot_for(ctx: &AppContext, id: &str, entry: &RegistryEntry) -> Result<SensorSnapshot> {
    let lat: f64 = entry.latitude.parse().context("bad latitude")?;
    let lng: f64 = entry.longitude.parse().context("bad longitude")?;
    let last_updated = DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    let window = FetchWindow {
        end: last_updated,
        duration_hours: 1,
    };

    let (pm25_data, pressure_data, temperature_data, humidity_data) = tokio::join!(
        ctx.upstream.fetch_window(id, Field::Pm25, window),
        ctx.upstream.fetch_window(id, Field::Pressure, window),
        ctx.upstream.fetch_window(id, Field::Temperature, window),
        ctx.upstream.fetch_window(id, Field::Humidity, window),
    );

    // PM2.5 falls back to the registry's last-known reading; the other
    // metrics fall back to zero when their fetch yields nothing.
    let pm25 = match latest_value(&pm25_data) {
        Some(value) => value,
        None => entry
            .value
            .parse()
            .context("no PM2.5 data and unparsable registry value")?,
    };

    Ok(SensorSnapshot {
        id: id.to_string(),
        name: entry.name.clone(),
        location: Location { lat, lng },
        pm25,
        temperature: latest_value(&temperature_data).unwrap_or(0.0),
        humidity: latest_value(&humidity_data).unwrap_or(0.0),
        pressure: latest_value(&pressure_data).unwrap_or(0.0),
        last_updated,
        aqi: calculate_aqi(pm25),
        aqi_category: aqi_category(pm25),
    })
}

/// Most recent parsable reading in a window, if any.
fn latest_value(data: &WindowData) -> Option<f64> {
    data.value
        .iter()
        .rev()
        .find_map(|raw| raw.parse::<f64>().ok().filter(|v| v.is_finite()))
}

/// Last-24h PM2.5 chart across all sensors: one 24h window per sensor,
/// reduced together into sparse hourly averages.
async fn hourly_overview(ctx: &AppContext, snapshots: &[SensorSnapshot]) -> Vec<HourlyPoint> {
    let window = FetchWindow {
        end: Utc::now(),
        duration_hours: 24,
    };

    let chunks: Vec<WindowData> = join_all(
        snapshots
            .iter()
            .map(|snapshot| ctx.upstream.fetch_window(&snapshot.id, Field::Pm25, window)),
    )
    .await;

    aggregate::reduce_hourly(&chunks)
        .into_iter()
        .filter_map(|point| {
            let pm25 = point.value?;
            Some(HourlyPoint {
                time: point.timestamp,
                pm25,
                aqi: calculate_aqi(pm25),
            })
        })
        .collect()
}

fn compute_statistics(snapshots: &[SensorSnapshot]) -> Statistics {
    if snapshots.is_empty() {
        return Statistics::default();
    }

    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut distribution: HashMap<String, u32> = HashMap::new();

    for snapshot in snapshots {
        sum += snapshot.pm25;
        max = max.max(snapshot.pm25);
        min = min.min(snapshot.pm25);
        *distribution
            .entry(snapshot.aqi_category.category.clone())
            .or_insert(0) += 1;
    }

    Statistics {
        average_pm25: Some(sum / snapshots.len() as f64),
        max_pm25: Some(max),
        min_pm25: Some(min),
        aqi_distribution: distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, pm25: f64) -> SensorSnapshot {
        SensorSnapshot {
            id: id.to_string(),
            name: id.to_string(),
            location: Location { lat: 0.0, lng: 0.0 },
            pm25,
            temperature: 20.0,
            humidity: 50.0,
            pressure: 1013.0,
            last_updated: Utc::now(),
            aqi: calculate_aqi(pm25),
            aqi_category: aqi_category(pm25),
        }
    }

    #[test]
    fn latest_value_skips_unparsable_tail() {
        let data = WindowData {
            time: vec![
                "2025-03-10T08:00:00.000Z".into(),
                "2025-03-10T08:10:00.000Z".into(),
            ],
            value: vec!["12.5".into(), "garbage".into()],
        };
        assert_eq!(latest_value(&data), Some(12.5));
        assert_eq!(latest_value(&WindowData::default()), None);
    }

    #[test]
    fn statistics_cover_range_and_distribution() {
        let stats = compute_statistics(&[
            snapshot("a", 10.0),
            snapshot("b", 20.0),
            snapshot("c", 60.0),
        ]);

        assert_eq!(stats.average_pm25, Some(30.0));
        assert_eq!(stats.max_pm25, Some(60.0));
        assert_eq!(stats.min_pm25, Some(10.0));
        assert_eq!(stats.aqi_distribution.get("Good"), Some(&1));
        assert_eq!(stats.aqi_distribution.get("Moderate"), Some(&1));
        assert_eq!(stats.aqi_distribution.get("Unhealthy"), Some(&1));
    }

    #[test]
    fn empty_registry_yields_empty_statistics() {
        let stats = compute_statistics(&[]);
        assert_eq!(stats.average_pm25, None);
        assert!(stats.aqi_distribution.is_empty());
    }
}
