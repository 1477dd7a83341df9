//! Transfer routes

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use super::{commands, queries};
use crate::api::{
    response::{ApiResponse, ResponseMeta},
    AppState,
};
use crate::error::AppResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Submitted {
    operation_id: String,
}

#[derive(Debug, Serialize)]
struct Cleared {
    removed: usize,
}

/// Create transfer routes
pub fn transfers_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_transfer).get(list_transfers).delete(clear_transfers))
        .route("/:operation_id", get(get_transfer))
        .route("/:operation_id/cancel", post(cancel_transfer))
}

/// Submit a transfer
///
/// POST /transfers
async fn submit_transfer(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    let request = commands::prepare_request(body, state.default_batch_size)?;
    let operation_id = commands::submit(&state.service, request)?;

    Ok(ApiResponse::accepted(Submitted { operation_id }).into_response())
}

/// List all transfers
///
/// GET /transfers
async fn list_transfers(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::listing(queries::list(&state.service))
}

/// Get one transfer
///
/// GET /transfers/:operation_id
async fn get_transfer(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> AppResult<Response> {
    let operation = queries::get(&state.service, &operation_id)?;
    Ok(ApiResponse::ok(operation).into_response())
}

/// Request cancellation of a running transfer
///
/// POST /transfers/:operation_id/cancel
async fn cancel_transfer(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> AppResult<Response> {
    let (operation, accepted) = commands::cancel(&state.service, &operation_id)?;
    let meta = ResponseMeta {
        cancel_accepted: Some(accepted),
        ..ResponseMeta::default()
    };
    Ok(ApiResponse::ok(operation).with_meta(meta).into_response())
}

/// Remove finished transfers
///
/// DELETE /transfers
async fn clear_transfers(State(state): State<AppState>) -> impl IntoResponse {
    let removed = commands::clear_finished(&state.service);
    ApiResponse::ok(Cleared { removed })
}
