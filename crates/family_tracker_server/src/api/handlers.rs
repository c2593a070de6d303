//! Route handlers. Dispatcher calls run on the blocking pool.

use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use family_tracker::{
    ActionError, ActionKind, ActionRequest, Actor, Dispatcher, ErrorKind, TrackerConfig, TrackerId,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{ACTOR_HEADER, error_response, json_error, json_success, respond};

async fn blocking<T, F>(work: F) -> Result<T, ActionError>
where
    F: FnOnce() -> Result<T, ActionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ActionError::Storage {
            message: format!("worker failed: {}", e),
        })?
}

fn parse_tracker_id(raw: &str) -> Result<TrackerId, ActionError> {
    let id = raw
        .parse::<i64>()
        .map_err(|_| ActionError::invalid_input(format!("tracker id '{}' is not a number", raw)))?;
    TrackerId::new(id)
}

fn actor_from(headers: &HeaderMap) -> Actor {
    Actor::from_optional(headers.get(ACTOR_HEADER).and_then(|v| v.to_str().ok()))
}

fn parse_action(kind: &str, body: &[u8]) -> Result<ActionRequest, ActionError> {
    let kind = ActionKind::from_str(kind)
        .map_err(|_| ActionError::invalid_input(format!("unknown action '{}'", kind)))?;
    let mut value: Value = serde_json::from_slice(body)
        .map_err(|e| ActionError::invalid_input(format!("malformed body: {}", e)))?;
    let fields = value
        .as_object_mut()
        .ok_or_else(|| ActionError::invalid_input("body must be a JSON object"))?;
    fields.insert("action".to_string(), Value::String(kind.to_string()));
    serde_json::from_value(value)
        .map_err(|e| ActionError::invalid_input(format!("invalid parameters: {}", e)))
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> Response {
    error_response(ErrorKind::NotFound, "no such route".to_string())
}

/// GET /health
pub(crate) async fn handle_health() -> Response {
    json_success(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /actions/{action_kind}
#[instrument(skip(dispatcher, headers, body))]
pub(crate) async fn handle_action(
    State(dispatcher): State<Dispatcher>,
    Path(action_kind): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match parse_action(&action_kind, &body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "Rejected action request");
            return json_error(&err);
        }
    };
    let actor = actor_from(&headers);
    let (id, action) = request.into_parts();
    debug!(tracker_id = %id, actor = %actor, "Dispatching action");

    respond(blocking(move || dispatcher.dispatch(id, &action, &actor)).await)
}

/// GET /trackers
#[instrument(skip(dispatcher))]
pub(crate) async fn handle_list_trackers(State(dispatcher): State<Dispatcher>) -> Response {
    respond(blocking(move || dispatcher.list()).await)
}

/// GET /trackers/{id}
#[instrument(skip(dispatcher))]
pub(crate) async fn handle_get_tracker(
    State(dispatcher): State<Dispatcher>,
    Path(raw_id): Path<String>,
) -> Response {
    let id = match parse_tracker_id(&raw_id) {
        Ok(id) => id,
        Err(err) => return json_error(&err),
    };
    respond(blocking(move || dispatcher.view(id)).await)
}

/// PUT /trackers/{id}
#[instrument(skip(dispatcher, body))]
pub(crate) async fn handle_put_tracker(
    State(dispatcher): State<Dispatcher>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Response {
    let parsed = parse_tracker_id(&raw_id).and_then(|id| {
        serde_json::from_slice::<TrackerConfig>(&body)
            .map(|config| (id, config))
            .map_err(|e| ActionError::invalid_input(format!("invalid tracker config: {}", e)))
    });
    let (id, config) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "Rejected tracker config");
            return json_error(&err);
        }
    };
    respond(blocking(move || dispatcher.configure(id, config)).await)
}
