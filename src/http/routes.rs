//! HTTP route definitions for the local renderer bridge

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::app::{AppState, SessionError};
use crate::game::snapshot::SyncStats;
use crate::game::{ActionInput, GameVariant, HeldInput, PlayerAction, Snapshot};
use crate::util::time::uptime_secs;
use crate::ws::ChannelStatus;

use super::render::render_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Renderer origins come comma-separated from CLIENT_ORIGIN
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origins()
        .iter()
        .filter_map(|s| s.parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/render", get(render_handler))
        .route("/game/switch", post(switch_handler))
        .route("/game/action", post(action_handler))
        .route("/game/input", post(input_handler))
        .route("/game/reset", post(reset_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Health & snapshot
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    session_id: Uuid,
    active: GameVariant,
    channel: ChannelStatus,
    version: u64,
    tick: u64,
    stats: SyncStats,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.session.snapshot();
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        session_id: state.session.session_id(),
        active: snapshot.active,
        channel: snapshot.channel,
        version: snapshot.version,
        tick: snapshot.tick,
        stats: snapshot.stats,
    })
}

async fn snapshot_handler(State(state): State<AppState>) -> Json<Snapshot> {
    Json(Snapshot::clone(&state.session.snapshot()))
}

// ============================================================================
// Game control
// ============================================================================

#[derive(Deserialize)]
struct SwitchRequest {
    game: GameVariant,
}

#[derive(Serialize)]
struct SwitchResponse {
    active: GameVariant,
}

async fn switch_handler(
    State(state): State<AppState>,
    Json(req): Json<SwitchRequest>,
) -> Result<Json<SwitchResponse>, AppError> {
    state.session.switch_variant(req.game).await?;
    Ok(Json(SwitchResponse { active: req.game }))
}

async fn action_handler(
    State(state): State<AppState>,
    Json(input): Json<ActionInput>,
) -> Result<Json<PlayerAction>, AppError> {
    let action = state.session.submit_player_action(input).await?;
    Ok(Json(action))
}

async fn input_handler(
    State(state): State<AppState>,
    Json(input): Json<HeldInput>,
) -> Result<StatusCode, AppError> {
    if state.input_limiter.check().is_err() {
        return Err(AppError::RateLimited);
    }
    state.session.set_input(input).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_handler(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.session.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Session unavailable")]
    Unavailable,
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Closed => AppError::Unavailable,
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}
