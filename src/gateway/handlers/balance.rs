//! Balance queries, withdrawal requests and the withdrawal history.

use crate::gateway::middleware::Principal;
use crate::gateway::state::AppState;
use crate::service::WithdrawError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Decimal,
}

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Response {
    let Some(user) = principal.user() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match state.balances.balance(user.id).await {
        Ok(balance) => (StatusCode::OK, Json(balance)).into_response(),
        Err(err) => {
            error!(error = %err, user_id = user.id, "balance lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Response {
    let Some(user) = principal.user() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let Ok(Json(req)) = body else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.balances.withdraw(user.id, &req.order, req.sum).await {
        Ok(balance) => {
            debug!(
                user_id = user.id,
                order = %req.order,
                sum = %req.sum,
                current = %balance.current,
                "points withdrawn"
            );
            StatusCode::OK.into_response()
        }
        Err(WithdrawError::UnknownOrder) => StatusCode::UNPROCESSABLE_ENTITY.into_response(),
        Err(WithdrawError::NotEnough) => StatusCode::PAYMENT_REQUIRED.into_response(),
        Err(err) => {
            error!(error = %err, user_id = user.id, order = %req.order, "withdrawal failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /api/user/withdrawals
pub async fn withdrawals(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Response {
    let Some(user) = principal.user() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match state.balances.withdrawals(user.id).await {
        Ok(history) if history.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(err) => {
            error!(error = %err, user_id = user.id, "withdrawal history failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
