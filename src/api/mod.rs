// HTTP surface for the demo page: one route per step plus status and session views

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::app_state::{AppState, WeatherReport};
use crate::devnet;
use crate::payout::PayoutOutcome;
use crate::policy::{PolicyReceipt, PolicyRequest};
use crate::session::{Session, SessionError};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error_struct(status: StatusCode, code: &str, message: &str) -> ApiError {
    let body = serde_json::json!({ "error": { "code": code, "message": message } });
    (status, Json(body))
}

fn session_error(e: SessionError) -> ApiError {
    let status = match e {
        SessionError::Policy(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::CONFLICT,
    };
    api_error_struct(status, e.code(), &e.to_string())
}

/// Bodies axum cannot read as a policy form still answer in the error envelope.
fn body_error(rejection: JsonRejection) -> ApiError {
    let status = match &rejection {
        JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::BAD_REQUEST,
    };
    api_error_struct(status, "invalid_body", &rejection.body_text())
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub block: u64,
    pub block_label: String,
    pub wallet: String,
    pub wallet_badge: String,
    pub stage: String,
    pub weather_unlocked: bool,
    pub payout_unlocked: bool,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let session = state.snapshot();
    let block = state.blocks.current();
    Json(StatusResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        block,
        block_label: devnet::format_thousands(block),
        wallet_badge: devnet::wallet_badge(&session.wallet),
        wallet: session.wallet,
        stage: session.stage.to_string(),
        weather_unlocked: session.stage.weather_unlocked(),
        payout_unlocked: session.stage.payout_unlocked(),
    })
}

async fn get_session(State(state): State<Arc<AppState>>) -> Json<Session> {
    Json(state.snapshot())
}

async fn reset_session(State(state): State<Arc<AppState>>) -> Json<Session> {
    Json(state.reset())
}

async fn create_policy(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PolicyRequest>, JsonRejection>,
) -> Result<Json<PolicyReceipt>, ApiError> {
    let Json(req) = payload.map_err(body_error)?;
    state.setup_policy(req).await.map(Json).map_err(session_error)
}

async fn check_weather(State(state): State<Arc<AppState>>) -> Result<Json<WeatherReport>, ApiError> {
    state.check_weather().await.map(Json).map_err(session_error)
}

async fn simulate_payout(State(state): State<Arc<AppState>>) -> Result<Json<PayoutOutcome>, ApiError> {
    state.simulate_payout().await.map(Json).map_err(session_error)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/session", get(get_session))
        .route("/session/reset", post(reset_session))
        .route("/policy", post(create_policy))
        .route("/weather/check", post(check_weather))
        .route("/payout/simulate", post(simulate_payout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
