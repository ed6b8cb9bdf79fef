use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::state::SensorSnapshot;

/// Metrics registry for the agent scraped by Prometheus.
#[derive(Clone)]
pub struct AppMetrics {
    registry: Arc<Registry>,
    loops: LoopMetrics,
    fetch: FetchMetrics,
    sensors: SensorMetrics,
    alerts: AlertMetrics,
}

impl AppMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new_custom(Some("aqmon".into()), None)?);

        let loops = LoopMetrics::register(&registry)?;
        let fetch = FetchMetrics::register(&registry)?;
        let sensors = SensorMetrics::register(&registry)?;
        let alerts = AlertMetrics::register(&registry)?;

        Ok(Self {
            registry,
            loops,
            fetch,
            sensors,
            alerts,
        })
    }

    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn observe_duration(&self, loop_name: &str, elapsed: Duration) {
        self.loops
            .duration_seconds
            .with_label_values(&[loop_name])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_success(&self, loop_name: &str, success: bool) {
        self.loops
            .last_success
            .with_label_values(&[loop_name])
            .set(if success { 1 } else { 0 });
    }

    pub fn inc_error(&self, loop_name: &str) {
        self.loops.errors.with_label_values(&[loop_name]).inc();
    }

    pub fn record_fetch(&self, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.fetch.requests.with_label_values(&[outcome]).inc();
    }

    pub fn inc_fetch_retry(&self) {
        self.fetch.retries.inc();
    }

    pub fn inc_fetch_exhausted(&self) {
        self.fetch.exhausted_windows.inc();
    }

    pub fn inc_alerts(&self, count: usize) {
        self.alerts.emitted.inc_by(count as u64);
    }

    pub fn set_sensor_metrics(&self, snapshots: &[SensorSnapshot]) {
        self.sensors.pm25.reset();
        self.sensors.aqi.reset();
        self.sensors.tracked.set(snapshots.len() as i64);

        for snapshot in snapshots {
            self.sensors
                .pm25
                .with_label_values(&[&snapshot.id])
                .set(snapshot.pm25);
            self.sensors
                .aqi
                .with_label_values(&[&snapshot.id])
                .set(snapshot.aqi);
        }
    }
}

#[derive(Clone)]
struct LoopMetrics {
    duration_seconds: HistogramVec,
    last_success: IntGaugeVec,
    errors: IntCounterVec,
}

impl LoopMetrics {
    fn register(registry: &Registry) -> Result<Self> {
        let duration_seconds = HistogramVec::new(
            HistogramOpts::new("loop_duration_seconds", "Poller loop iteration duration"),
            &["loop"],
        )?;
        let last_success = IntGaugeVec::new(
            Opts::new("loop_last_success", "Whether the last loop iteration succeeded"),
            &["loop"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("loop_errors_total", "Failed poller loop iterations"),
            &["loop"],
        )?;

        registry.register(Box::new(duration_seconds.clone()))?;
        registry.register(Box::new(last_success.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            duration_seconds,
            last_success,
            errors,
        })
    }
}

#[derive(Clone)]
struct FetchMetrics {
    requests: IntCounterVec,
    retries: IntCounter,
    exhausted_windows: IntCounter,
}

impl FetchMetrics {
    fn register(registry: &Registry) -> Result<Self> {
        let requests = IntCounterVec::new(
            Opts::new("fetch_requests_total", "Upstream fetch attempts by outcome"),
            &["outcome"],
        )?;
        let retries = IntCounter::new("fetch_retries_total", "Upstream fetch retries")?;
        let exhausted_windows = IntCounter::new(
            "fetch_exhausted_windows_total",
            "Windows that returned empty after exhausting the retry budget",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(retries.clone()))?;
        registry.register(Box::new(exhausted_windows.clone()))?;

        Ok(Self {
            requests,
            retries,
            exhausted_windows,
        })
    }
}

#[derive(Clone)]
struct SensorMetrics {
    pm25: GaugeVec,
    aqi: IntGaugeVec,
    tracked: IntGauge,
}

impl SensorMetrics {
    fn register(registry: &Registry) -> Result<Self> {
        let pm25 = GaugeVec::new(
            Opts::new("sensor_pm25_ug_m3", "Latest PM2.5 reading per sensor"),
            &["sensor"],
        )?;
        let aqi = IntGaugeVec::new(
            Opts::new("sensor_aqi", "Latest AQI per sensor"),
            &["sensor"],
        )?;
        let tracked = IntGauge::new("sensors_tracked", "Sensors in the latest refresh cycle")?;

        registry.register(Box::new(pm25.clone()))?;
        registry.register(Box::new(aqi.clone()))?;
        registry.register(Box::new(tracked.clone()))?;

        Ok(Self { pm25, aqi, tracked })
    }
}

#[derive(Clone)]
struct AlertMetrics {
    emitted: IntCounter,
}

impl AlertMetrics {
    fn register(registry: &Registry) -> Result<Self> {
        let emitted = IntCounter::new(
            "alerts_emitted_total",
            "Sensors that transitioned from safe to unhealthy",
        )?;
        registry.register(Box::new(emitted.clone()))?;
        Ok(Self { emitted })
    }
}
