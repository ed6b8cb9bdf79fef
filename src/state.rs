use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::aqi::AqiCategory;

/// Aggregated snapshots that back the REST API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppSnapshots {
    pub sensors: Vec<SensorSnapshot>,
    pub historical: HashMap<String, Vec<HistoricalPoint>>,
    pub hourly: Vec<HourlyPoint>,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Current state of one sensor, fully replaced on each refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SensorSnapshot {
    pub id: String,
    pub name: String,
    pub location: Location,
    pub pm25: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    pub aqi: i64,
    #[serde(rename = "aqiCategory")]
    pub aqi_category: AqiCategory,
}

/// One calendar day of a sensor's historical series. A `null` metric
/// means no data was observed for that day; it is never reported as zero.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalPoint {
    pub timestamp: DateTime<Utc>,
    pub pm25: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// One hour of the last-24h overview chart. Sparse: hours without data
/// are simply not present.
#[derive(Debug, Clone, Serialize)]
pub struct HourlyPoint {
    pub time: DateTime<Utc>,
    pub pm25: f64,
    pub aqi: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    #[serde(rename = "averagePM25")]
    pub average_pm25: Option<f64>,
    #[serde(rename = "maxPM25")]
    pub max_pm25: Option<f64>,
    #[serde(rename = "minPM25")]
    pub min_pm25: Option<f64>,
    #[serde(rename = "aqiDistribution")]
    pub aqi_distribution: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopHealth {
    pub name: String,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl LoopHealth {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            last_success_at: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

#[derive(Default)]
struct SharedStateInner {
    snapshots: RwLock<AppSnapshots>,
    loop_health: RwLock<HashMap<String, LoopHealth>>,
}

/// Shared state container for the HTTP layer and poller loops.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SharedStateInner::default()),
        }
    }

    pub async fn get_snapshots(&self) -> AppSnapshots {
        self.inner.snapshots.read().await.clone()
    }

    /// Replace the published refresh-cycle output in one write so readers
    /// never observe a half-updated cycle.
    pub async fn update_refresh(
        &self,
        sensors: Vec<SensorSnapshot>,
        statistics: Statistics,
        hourly: Vec<HourlyPoint>,
    ) {
        let mut guard = self.inner.snapshots.write().await;
        guard.sensors = sensors;
        guard.statistics = statistics;
        guard.hourly = hourly;
    }

    pub async fn update_historical(&self, historical: HashMap<String, Vec<HistoricalPoint>>) {
        let mut guard = self.inner.snapshots.write().await;
        guard.historical = historical;
    }

    pub async fn record_loop_success(&self, loop_name: &str) {
        let mut guard = self.inner.loop_health.write().await;
        let entry = guard
            .entry(loop_name.to_string())
            .or_insert_with(|| LoopHealth::new(loop_name));
        entry.last_success_at = Some(Utc::now());
        entry.consecutive_failures = 0;
        entry.last_error = None;
    }

    pub async fn record_loop_failure(&self, loop_name: &str, error: String) {
        let mut guard = self.inner.loop_health.write().await;
        let entry = guard
            .entry(loop_name.to_string())
            .or_insert_with(|| LoopHealth::new(loop_name));
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.last_error = Some(error);
    }

    pub async fn loop_health(&self) -> Vec<LoopHealth> {
        self.inner
            .loop_health
            .read()
            .await
            .values()
            .cloned()
            .collect()
    }

    pub async fn is_ready(&self, loop_names: &[&str], max_staleness: Duration) -> bool {
        let health = self.inner.loop_health.read().await;
        let now = Utc::now();
        let staleness = chrono::Duration::from_std(max_staleness)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));

        loop_names.iter().all(|name| {
            if let Some(entry) = health.get(*name) {
                if entry.consecutive_failures > 0 {
                    return false;
                }
                if let Some(last) = entry.last_success_at {
                    return now.signed_duration_since(last) <= staleness;
                }
                false
            } else {
                false
            }
        })
    }
}
