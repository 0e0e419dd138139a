// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Vehicle-event webhook.
//!
//! # Endpoints
//!
//! - `/vehicles` - vehicle detector record (JSON), any method, always answered `200 OK`
//! - `/heartbeat` - liveness probe, any method

use crate::stats::GatewayStats;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::any,
    Router,
};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// One detector record. Missing fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VehicleData {
    pub id: i64,
    pub device_id: String,
    pub lane: i64,
    pub date_time: String,
    pub direction: i64,
    pub veh_speed: i64,
    pub veh_length: i64,
    pub veh_type: i64,
    pub veh_gap: i64,
    pub occupancy: i64,
    #[serde(rename = "errorCode_A")]
    pub error_code_a: String,
    #[serde(rename = "errorCode_B")]
    pub error_code_b: String,
}

impl VehicleData {
    /// True when either error code contains anything other than `'0'`.
    pub fn has_error_code(&self) -> bool {
        [&self.error_code_a, &self.error_code_b]
            .iter()
            .any(|code| code.chars().any(|c| c != '0'))
    }
}

/// Build the HTTP router.
pub fn router(stats: Arc<GatewayStats>) -> Router {
    Router::new()
        .route("/vehicles", any(vehicles))
        .route("/heartbeat", any(heartbeat))
        .layer(TraceLayer::new_for_http())
        .with_state(stats)
}

/// Serve on `listener` until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    stats: Arc<GatewayStats>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    info!("HTTP sink listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(stats))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}

/// /vehicles
async fn vehicles(State(stats): State<Arc<GatewayStats>>, body: Bytes) -> StatusCode {
    debug!("vehicle event: {}", String::from_utf8_lossy(&body));
    GatewayStats::incr(&stats.vehicle_events);

    match serde_json::from_slice::<VehicleData>(&body) {
        Ok(event) if event.has_error_code() => {
            warn!(
                "Device {} lane {} reports error codes A={:?} B={:?}",
                event.device_id, event.lane, event.error_code_a, event.error_code_b
            );
        }
        Ok(event) => {
            debug!("Device {} lane {}: no error", event.device_id, event.lane);
        }
        Err(e) => {
            warn!("Malformed vehicle event: {}", e);
        }
    }

    StatusCode::OK
}

/// /heartbeat
async fn heartbeat() -> StatusCode {
    StatusCode::OK
}
