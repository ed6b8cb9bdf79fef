use std::collections::HashMap;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{RetryConfig, UpstreamConfig};
use crate::metrics::AppMetrics;

use super::fields::Field;
use super::window::FetchWindow;

/// Parallel time/value arrays for one fetched window. The upstream
/// response also carries a `sensor` member; deserializing into this
/// struct discards it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowData {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub value: Vec<String>,
}

/// One entry of the upstream sensor registry.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
    pub timestamp: String,
    pub value: String,
}

/// HTTP client for the sensor-data service, with per-window retry.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
    metrics: AppMetrics,
}

impl UpstreamClient {
    pub fn new(
        upstream: &UpstreamConfig,
        retry: RetryConfig,
        metrics: AppMetrics,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(upstream.connect_timeout)
            .timeout(upstream.read_timeout)
            .build()
            .context("failed to build upstream HTTP client")?;

        Ok(Self {
            http,
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
            retry,
            metrics,
        })
    }

    /// Bare HTTP client, shared with the webhook notifier.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// List the live sensor registry. Unlike window fetches this is not
    /// retried; a failure fails the refresh iteration, which the poller
    /// harness records and retries on its next tick.
    pub async fn list_sensors(&self) -> Result<HashMap<String, RegistryEntry>> {
        let url = format!("{}/api/getdata", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("field", "pm2.5"),
                ("min_lat", "-90"),
                ("max_lat", "90"),
                ("min_lon", "-180"),
                ("max_lon", "180"),
                ("utc_epoch", &Utc::now().timestamp_millis().to_string()),
            ])
            .send()
            .await
            .context("sensor registry request failed")?;

        if !response.status().is_success() {
            bail!("sensor registry returned {}", response.status());
        }

        response
            .json()
            .await
            .context("failed to decode sensor registry")
    }

    /// Fetch one window for one sensor/field, retrying transient
    /// failures with exponential backoff (doubling from
    /// `initial_backoff`, capped at `max_backoff`, bounded by
    /// `max_elapsed` total).
    ///
    /// A window whose retry budget runs out degrades to an empty result;
    /// downstream aggregation treats "no data for this window" as a
    /// valid, silent outcome.
    pub async fn fetch_window(
        &self,
        sensor_id: &str,
        field: Field,
        window: FetchWindow,
    ) -> WindowData {
        let started = Instant::now();
        let mut delay = self.retry.initial_backoff;

        loop {
            match self.fetch_window_once(sensor_id, field, window).await {
                Ok(data) => {
                    self.metrics.record_fetch(true);
                    debug!(
                        sensor = sensor_id,
                        field = field.upstream_name(),
                        samples = data.time.len(),
                        "window fetched"
                    );
                    return data;
                }
                Err(err) => {
                    self.metrics.record_fetch(false);
                    if started.elapsed() + delay > self.retry.max_elapsed {
                        self.metrics.inc_fetch_exhausted();
                        warn!(
                            sensor = sensor_id,
                            field = field.upstream_name(),
                            error = %err,
                            "retry budget exhausted; treating window as empty"
                        );
                        return WindowData::default();
                    }

                    self.metrics.inc_fetch_retry();
                    warn!(
                        sensor = sensor_id,
                        field = field.upstream_name(),
                        error = %err,
                        delay = ?delay,
                        "window fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.retry.max_backoff);
                }
            }
        }
    }

    async fn fetch_window_once(
        &self,
        sensor_id: &str,
        field: Field,
        window: FetchWindow,
    ) -> Result<WindowData> {
        let url = format!("{}/api/getgraphdata", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("id", sensor_id),
                ("field", field.upstream_name()),
                ("rangehours", &window.duration_hours.to_string()),
                ("time", &format_end_time(window.end)),
            ])
            .send()
            .await
            .context("graph-data request failed")?;

        if !response.status().is_success() {
            bail!("graph-data endpoint returned {}", response.status());
        }

        response
            .json()
            .await
            .context("failed to decode graph-data response")
    }

    /// Fetch all windows concurrently, one task per window.
    ///
    /// Results align positionally with `windows`. A window that degraded
    /// to empty never cancels or fails its siblings, and no additional
    /// deadline applies beyond each fetch's own timeout and retry bound.
    pub async fn fetch_all(
        &self,
        sensor_id: &str,
        field: Field,
        windows: &[FetchWindow],
    ) -> Vec<WindowData> {
        join_all(
            windows
                .iter()
                .map(|window| self.fetch_window(sensor_id, field, *window)),
        )
        .await
    }
}

/// Window end times travel as ISO-8601 UTC with millisecond precision
/// and a trailing `Z`.
fn format_end_time(end: DateTime<Utc>) -> String {
    end.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn end_time_has_millisecond_precision_and_z_suffix() {
        let end = Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 5).unwrap();
        assert_eq!(format_end_time(end), "2025-03-10T08:30:05.000Z");
    }
}
