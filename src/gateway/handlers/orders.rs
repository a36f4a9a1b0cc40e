//! Order submission and listing.

use crate::gateway::middleware::Principal;
use crate::gateway::state::AppState;
use crate::service::{OrderServiceError, SubmitOutcome};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::{debug, error};

/// POST /api/user/orders — the body is the bare order number.
pub async fn submit_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: String,
) -> Response {
    let Some(user) = principal.user() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let number = body.trim();
    if number.is_empty() {
        return StatusCode::UNPROCESSABLE_ENTITY.into_response();
    }

    match state.orders.submit_order(number, user.id).await {
        Ok(SubmitOutcome::Accepted) => {
            debug!(user_id = user.id, order = number, "order accepted for accrual");
            StatusCode::ACCEPTED.into_response()
        }
        Ok(SubmitOutcome::AlreadyUploaded) => StatusCode::OK.into_response(),
        Ok(SubmitOutcome::OwnedByOther) => StatusCode::CONFLICT.into_response(),
        Err(OrderServiceError::InvalidNumber) => StatusCode::UNPROCESSABLE_ENTITY.into_response(),
        Err(err) => {
            error!(error = %err, user_id = user.id, order = number, "order submission failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /api/user/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Response {
    let Some(user) = principal.user() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match state.orders.orders_for_user(user.id).await {
        Ok(orders) if orders.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(err) => {
            error!(error = %err, user_id = user.id, "listing orders failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
