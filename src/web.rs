//! Axum-based HTTP API
//!
//! Exposes the latest poll snapshot and the force-update command. The state
//! holds the receiver side of the poller's watch channel plus the command
//! sender, so handlers never touch the poller directly. Off-peak booleans are
//! evaluated against the clock at request time, not at poll time.

use crate::poller::{PollerCommand, PollerSnapshot};
use crate::sensors::{SensorState, SensorValue};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub snapshot_rx: watch::Receiver<Arc<PollerSnapshot>>,
    pub commands_tx: mpsc::UnboundedSender<PollerCommand>,
    pub timezone: chrono_tz::Tz,
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(serde_json::json!({
        "account_number": snapshot.account_number,
        "timestamp": snapshot.timestamp,
        "last_success": snapshot.last_success,
        "consecutive_failures": snapshot.consecutive_failures,
        "total_polls": snapshot.total_polls,
        "poll_interval_minutes": snapshot.poll_interval_minutes,
        "off_peak_active": off_peak_active(&snapshot, state.timezone),
        "sensor_count": snapshot.sensors.len(),
    }))
}

async fn sensors(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    let values = evaluated_sensors(&snapshot, state.timezone);
    Json(serde_json::to_value(&values).unwrap_or_default())
}

async fn force_update(State(state): State<AppState>) -> impl IntoResponse {
    if state.commands_tx.send(PollerCommand::ForceUpdate).is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error":"poller unavailable"})),
        );
    }
    (StatusCode::OK, Json(serde_json::json!({"ok":true})))
}

/// Sensor values with the off-peak booleans refreshed against "now"
fn evaluated_sensors(snapshot: &PollerSnapshot, tz: chrono_tz::Tz) -> Vec<SensorValue> {
    snapshot
        .sensors
        .iter()
        .cloned()
        .map(|mut sensor| {
            if sensor.unique_id.ends_with("_hc_active")
                && let Some(schedule) = snapshot.off_peak_schedules.get(&sensor.device_id)
            {
                sensor.state = SensorState::Bool(schedule.is_active_now(tz));
            }
            sensor
        })
        .collect()
}

/// Whether any meter is currently in its off-peak window; None when no meter
/// carries a schedule
fn off_peak_active(snapshot: &PollerSnapshot, tz: chrono_tz::Tz) -> Option<bool> {
    (!snapshot.off_peak_schedules.is_empty()).then(|| {
        snapshot
            .off_peak_schedules
            .values()
            .any(|schedule| schedule.is_active_now(tz))
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/sensors", get(sensors))
        .route("/api/force_update", post(force_update))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(
    snapshot_rx: watch::Receiver<Arc<PollerSnapshot>>,
    commands_tx: mpsc::UnboundedSender<PollerCommand>,
    host: &str,
    port: u16,
    timezone: chrono_tz::Tz,
) -> anyhow::Result<()> {
    let state = AppState {
        snapshot_rx,
        commands_tx,
        timezone,
    };
    let router = build_router(state);

    let logger = crate::logging::get_logger("web");
    let (addr, parsed_ok): (SocketAddr, bool) = match host.parse::<IpAddr>() {
        Ok(ip) => (SocketAddr::new(ip, port), true),
        Err(_) => (([127, 0, 0, 1], port).into(), false),
    };
    if !parsed_ok {
        logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{}",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}
