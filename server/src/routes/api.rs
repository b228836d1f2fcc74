use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use gw2map_shared::{MapContext, PlayerSummary};
use serde::Deserialize;
use tracing::warn;

use crate::services::reconciler::{ReconcilerCommand, WorldRect};
use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const MAX_ACCOUNT_NAME_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    pub context: MapContext,
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (players, context) = {
        let snapshot = state.live_snapshot.read().await;
        (snapshot.players.len(), snapshot.context)
    };
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "players": players,
        "context": context,
        "connection": state.connection_state(),
        "topic": state.current_topic(),
        "observability": {
            "payloads_received_total": observability.payloads_received_total,
            "payloads_rejected_total": observability.payloads_rejected_total,
            "markers_created_total": observability.markers_created_total,
            "markers_deleted_total": observability.markers_deleted_total,
            "markers_expired_total": observability.markers_expired_total,
            "context_switches_total": observability.context_switches_total,
            "transport_reconnects_total": observability.transport_reconnects_total,
            "live_requests_total": observability.live_requests_total,
        }
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let (players, skipped_moves) = {
        let snapshot = state.live_snapshot.read().await;
        (snapshot.players.len(), snapshot.skipped_moves)
    };
    let connected = state.connection_state() == gw2map_shared::ConnectionState::Connected;
    let observability = state.observability.snapshot();

    let body = render_prometheus_metrics(players, connected, skipped_moves, observability);

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(
    players: usize,
    connected: bool,
    skipped_moves: u64,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    write_gauge(
        &mut body,
        "gw2map_live_players",
        "Characters currently tracked on the live map.",
        players as u64,
    );
    write_gauge(
        &mut body,
        "gw2map_relay_connected",
        "Whether the live broker connection is up (1 or 0).",
        u64::from(connected),
    );
    write_gauge(
        &mut body,
        "gw2map_offscreen_moves_skipped",
        "Moves skipped because tracked markers stayed off screen.",
        skipped_moves,
    );

    let counters = [
        (
            "gw2map_payloads_received_total",
            "Total relay payloads handed to the reconciler.",
            observability.payloads_received_total,
        ),
        (
            "gw2map_payloads_rejected_total",
            "Total relay payloads dropped as malformed or unknown.",
            observability.payloads_rejected_total,
        ),
        (
            "gw2map_markers_created_total",
            "Total live markers created.",
            observability.markers_created_total,
        ),
        (
            "gw2map_markers_deleted_total",
            "Total live markers removed by delete messages.",
            observability.markers_deleted_total,
        ),
        (
            "gw2map_markers_expired_total",
            "Total live markers removed by the expiry sweep.",
            observability.markers_expired_total,
        ),
        (
            "gw2map_context_switches_total",
            "Total map context switches.",
            observability.context_switches_total,
        ),
        (
            "gw2map_transport_reconnects_total",
            "Total relay reconnect attempts.",
            observability.transport_reconnects_total,
        ),
        (
            "gw2map_live_requests_total",
            "Total requests for the live player listing.",
            observability.live_requests_total,
        ),
    ];
    for (name, help, value) in counters {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} counter");
        let _ = writeln!(body, "{name} {value}");
    }

    body
}

fn write_gauge(body: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(body, "# HELP {name} {help}");
    let _ = writeln!(body, "# TYPE {name} gauge");
    let _ = writeln!(body, "{name} {value}");
}

/// Serve the pre-serialized player listing.
pub async fn get_players(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    state.observability.record_live_request();
    let (etag, json): (String, Arc<Bytes>) = {
        let snapshot = state.live_snapshot.read().await;
        (players_etag(snapshot.seq), Arc::clone(&snapshot.players_json))
    };

    if if_none_match_matches(&headers, &etag) {
        return not_modified_response("no-cache", Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), "no-cache", Some(etag.as_str()))
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<PlayerSummary>, StatusCode> {
    let account = normalize_account_name(&account)?;
    let snapshot = state.live_snapshot.read().await;
    snapshot
        .players
        .iter()
        .find(|player| player.account_name == account)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Rendered primitives change every frame, so this is never cached.
pub async fn get_markers(State(state): State<AppState>) -> impl IntoResponse {
    let json = Arc::clone(&state.live_snapshot.read().await.markers_json);
    json_bytes_response((*json).clone(), "no-store", None)
}

pub async fn get_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (seq, context, players) = {
        let snapshot = state.live_snapshot.read().await;
        (snapshot.seq, snapshot.context, snapshot.players.len())
    };
    Json(serde_json::json!({
        "seq": seq,
        "context": context,
        "connection": state.connection_state(),
        "topic": state.current_topic(),
        "players": players,
    }))
}

pub async fn switch_context(
    State(state): State<AppState>,
    Json(request): Json<ContextRequest>,
) -> Result<StatusCode, StatusCode> {
    send_command(&state, ReconcilerCommand::SwitchContext(request.context)).await
}

pub async fn set_viewport(
    State(state): State<AppState>,
    Json(rect): Json<Option<WorldRect>>,
) -> Result<StatusCode, StatusCode> {
    if let Some(rect) = rect
        && !(rect.min.is_finite() && rect.max.is_finite())
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    send_command(&state, ReconcilerCommand::SetViewport(rect)).await
}

async fn send_command(
    state: &AppState,
    command: ReconcilerCommand,
) -> Result<StatusCode, StatusCode> {
    match state.command_tx.send(command).await {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(e) => {
            warn!(error = %e, "live reconciler is not accepting commands");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

fn normalize_account_name(name: &str) -> Result<&str, StatusCode> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_ACCOUNT_NAME_LEN
        || trimmed.chars().any(|c| c.is_control() || matches!(c, '/' | '?' | '#' | '\\'))
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(trimmed)
}

fn players_etag(seq: u64) -> String {
    format!("\"players-{seq}\"")
}

fn json_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
