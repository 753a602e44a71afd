//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::debug;
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameConfig, MatchSummary, PublicState};
use crate::http::middleware::{capture_payment, PaymentProof, PAYMENT_HEADER};
use crate::http::sse::events_handler;
use crate::matchmaking::{ArenaError, MoveReceipt, MoveSubmission, Registration, RegistrationStatus};
use crate::store::PlayerStats;
use crate::util::time::uptime_secs;

/// Upper bound for a plain API request; the event stream is exempt
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(PAYMENT_HEADER),
        ])
        .allow_credentials(true);

    let api_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/games", get(games_handler))
        .route("/register", post(register_handler))
        .route("/move", post(move_handler))
        .route("/matches", get(matches_handler))
        .route("/matches/:id", get(match_handler))
        .route("/stats", get(stats_handler))
        .layer(middleware::from_fn(capture_payment))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    // Long-lived stream, kept out of compression and timeout
    let stream_routes = Router::new().route("/events", get(events_handler));

    Router::new()
        .merge(api_routes.layer(CompressionLayer::new()))
        .merge(stream_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    active_players: usize,
    waiting_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let matches = state.arena.matches();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: matches.active_matches(),
        active_players: matches.total_players(),
        waiting_players: state.arena.waiting_players(),
    })
}

// ============================================================================
// Games and registration
// ============================================================================

async fn games_handler(State(state): State<AppState>) -> Json<Vec<GameConfig>> {
    Json(state.arena.games().configs().into_iter().cloned().collect())
}

async fn register_handler(
    State(state): State<AppState>,
    proof: Option<Extension<PaymentProof>>,
    body: Result<Json<Registration>, JsonRejection>,
) -> Result<Json<RegistrationStatus>, AppError> {
    let Json(req) = body.map_err(|rejection| {
        AppError::BadRequest(format!("malformed registration: {}", rejection.body_text()))
    })?;
    let proof = proof.map(|Extension(PaymentProof(raw))| raw);
    let status = state.arena.register(req, proof).await?;
    Ok(Json(status))
}

// ============================================================================
// Moves
// ============================================================================

/// Always 200: a refused move is an answer, not a transport failure
async fn move_handler(
    State(state): State<AppState>,
    proof: Option<Extension<PaymentProof>>,
    body: Result<Json<MoveSubmission>, JsonRejection>,
) -> Json<MoveReceipt> {
    let submission = match body {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Malformed move submission");
            return Json(MoveReceipt::rejected(format!(
                "malformed move submission: {}",
                rejection.body_text()
            )));
        }
    };

    let proof = proof.map(|Extension(PaymentProof(raw))| raw);
    Json(state.arena.submit_move(submission, proof).await)
}

// ============================================================================
// Matches and stats
// ============================================================================

async fn matches_handler(State(state): State<AppState>) -> Json<Vec<MatchSummary>> {
    Json(state.arena.match_summaries())
}

async fn match_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicState>, AppError> {
    state
        .arena
        .match_state(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("match {id}")))
}

async fn stats_handler(State(state): State<AppState>) -> Json<Vec<PlayerStats>> {
    Json(state.arena.stats().leaderboard())
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<ArenaError> for AppError {
    fn from(err: ArenaError) -> Self {
        let message = err.to_string();
        match err {
            ArenaError::Registry(_) | ArenaError::InvalidRegistration(_) => {
                AppError::BadRequest(message)
            }
            ArenaError::EntryDenied(_) => AppError::PaymentRequired(message),
            ArenaError::AlreadyRegistered(_) => AppError::Conflict(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
