use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::state::SensorSnapshot;

/// Categories that count as unhealthy for alerting. Current policy
/// includes Moderate; Good and Unhealthy for Sensitive Groups are safe.
pub fn is_unhealthy_category(category: &str) -> bool {
    matches!(
        category,
        "Moderate" | "Unhealthy" | "Very Unhealthy" | "Hazardous"
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSensor {
    pub name: String,
    pub aqi: i64,
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct AlertBatch {
    pub sensors: Vec<AlertSensor>,
}

/// Tracks which sensors were safe as of the previous refresh cycle and
/// turns the safe -> unhealthy transitions of the current cycle into an
/// alert batch.
///
/// The safe-set starts empty, so the very first cycle can never alert: a
/// sensor only triggers once it has been observed safe and then flips.
/// Repeat-unhealthy sensors and sensors never seen before stay silent.
#[derive(Default)]
pub struct HealthTracker {
    safe: HashSet<String>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one refresh cycle's snapshots, returning the sensors that
    /// flipped from safe to unhealthy. The tracked safe-set is replaced
    /// with this cycle's, unconditionally, even when nothing fired.
    pub fn observe(&mut self, snapshots: &[SensorSnapshot]) -> Vec<AlertSensor> {
        let mut current_safe = HashSet::with_capacity(snapshots.len());
        let mut triggered = Vec::new();

        for snapshot in snapshots {
            if is_unhealthy_category(&snapshot.aqi_category.category) {
                if self.safe.contains(&snapshot.id) {
                    triggered.push(AlertSensor {
                        name: snapshot.name.clone(),
                        aqi: snapshot.aqi,
                        category: snapshot.aqi_category.category.clone(),
                    });
                }
            } else {
                current_safe.insert(snapshot.id.clone());
            }
        }

        self.safe = current_safe;
        triggered
    }
}

/// POST an alert batch to the configured webhook. Delivery is best
/// effort; a failure is logged and never fails the refresh cycle.
pub async fn notify_webhook(
    client: &reqwest::Client,
    url: &str,
    batch: &AlertBatch,
) -> Result<()> {
    let response = client
        .post(url)
        .json(batch)
        .send()
        .await
        .context("alert webhook request failed")?;

    if !response.status().is_success() {
        warn!(status = %response.status(), "alert webhook rejected the batch");
    } else {
        info!(sensors = batch.sensors.len(), "alert batch delivered");
    }
    Ok(())
}
