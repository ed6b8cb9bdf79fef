use std::collections::HashMap;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::app::AppContext;
use crate::poller::{HISTORY_LOOP, REFRESH_LOOP};
use crate::state::{HistoricalPoint, HourlyPoint, SensorSnapshot, Statistics};

const LOOP_NAMES: &[&str] = &[REFRESH_LOOP, HISTORY_LOOP];

pub fn create_router(ctx: AppContext) -> Router {
    let api = Router::new()
        .route("/sensors", get(get_sensors))
        .route("/historical", get(get_historical))
        .route("/hourly", get(get_hourly))
        .route("/statistics", get(get_statistics));

    Router::new()
        .route("/healthz", get(get_healthz))
        .route("/metrics", get(get_metrics))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        // The dashboard is served from another origin.
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn get_healthz(State(ctx): State<AppContext>) -> StatusCode {
    let max_staleness = ctx.config.sample_intervals.refresh * 3;
    let is_ready = ctx.state.is_ready(LOOP_NAMES, max_staleness).await;

    if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn get_metrics(State(ctx): State<AppContext>) -> Response {
    match ctx.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(error = ?err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn get_sensors(State(ctx): State<AppContext>) -> Json<Vec<SensorSnapshot>> {
    let snapshots = ctx.state.get_snapshots().await;
    Json(snapshots.sensors)
}

async fn get_historical(
    State(ctx): State<AppContext>,
) -> Json<HashMap<String, Vec<HistoricalPoint>>> {
    let snapshots = ctx.state.get_snapshots().await;
    Json(snapshots.historical)
}

async fn get_hourly(State(ctx): State<AppContext>) -> Json<Vec<HourlyPoint>> {
    let snapshots = ctx.state.get_snapshots().await;
    Json(snapshots.hourly)
}

async fn get_statistics(State(ctx): State<AppContext>) -> Json<Statistics> {
    let snapshots = ctx.state.get_snapshots().await;
    Json(snapshots.statistics)
}
