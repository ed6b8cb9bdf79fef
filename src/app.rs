use std::sync::Arc;

use tokio::sync::Mutex;

use crate::alerts::HealthTracker;
use crate::config::AppConfig;
use crate::metrics::AppMetrics;
use crate::state::SharedState;
use crate::upstream::UpstreamClient;

/// Shared application context passed to HTTP handlers and pollers.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub upstream: UpstreamClient,
    pub metrics: AppMetrics,
    pub state: SharedState,
    /// Safe-set tracker; the only state carried across refresh cycles.
    /// Locked once per cycle so the set swap is atomic.
    pub health: Arc<Mutex<HealthTracker>>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        upstream: UpstreamClient,
        metrics: AppMetrics,
        state: SharedState,
    ) -> Self {
        Self {
            config: Arc::new(config),
            upstream,
            metrics,
            state,
            health: Arc::new(Mutex::new(HealthTracker::new())),
        }
    }
}
