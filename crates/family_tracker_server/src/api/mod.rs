//! JSON HTTP API over the dispatcher.
//!
//! Every response uses the same envelope: `{"success": true, "data": ...}`
//! or `{"success": false, "error": {"kind": ..., "reason": ...}}`.

mod handlers;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use family_tracker::{ActionError, Dispatcher, ErrorKind};
use serde::Serialize;
use tracing::{info, instrument};

use handlers::{
    handle_action, handle_get_tracker, handle_health, handle_list_trackers, handle_not_found,
    handle_put_tracker,
};

/// Header carrying the caller's login name.
pub const ACTOR_HEADER: &str = "x-actor";

/// Error payload of a failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    kind: ErrorKind,
    reason: String,
}

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidAction | ErrorKind::EmptyParticipants | ErrorKind::ParticipantNotFound => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_success<T: Serialize>(data: T) -> Response {
    let body = Envelope {
        success: true,
        data: Some(data),
        error: None,
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn error_response(kind: ErrorKind, reason: String) -> Response {
    let body = Envelope::<()> {
        success: false,
        data: None,
        error: Some(ErrorBody { kind, reason }),
    };
    (status_for(kind), Json(body)).into_response()
}

fn json_error(err: &ActionError) -> Response {
    error_response(err.kind(), err.reason())
}

fn respond<T: Serialize>(result: Result<T, ActionError>) -> Response {
    match result {
        Ok(data) => json_success(data),
        Err(err) => json_error(&err),
    }
}

/// Builds the API router.
#[instrument(skip(dispatcher))]
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/actions/{action_kind}", post(handle_action))
        .route("/trackers", get(handle_list_trackers))
        .route(
            "/trackers/{id}",
            get(handle_get_tracker).put(handle_put_tracker),
        )
        .fallback(handle_not_found)
        .with_state(dispatcher)
}

/// Binds `host:port` and serves the API until the process exits.
///
/// # Errors
///
/// Returns an I/O error if the address cannot be bound.
#[instrument(skip(dispatcher))]
pub async fn serve(dispatcher: Dispatcher, host: &str, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(host, port, "Family tracker API listening");
    axum::serve(listener, router(dispatcher)).await
}
