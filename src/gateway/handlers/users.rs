//! Registration and login.

use crate::gateway::middleware::{Principal, TOKEN_COOKIE};
use crate::gateway::state::AppState;
use crate::service::{LoginError, RegisterError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use tracing::{debug, error, warn};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// 200 with the session cookie set.
fn ok_with_session(token: &str) -> Response {
    (
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            format!("{TOKEN_COOKIE}={token}; Path=/; HttpOnly"),
        )],
    )
        .into_response()
}

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    if principal.user().is_some() {
        return StatusCode::CONFLICT.into_response();
    }

    let Ok(Json(creds)) = body else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if creds.login.is_empty() || creds.password.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match state.users.register(&creds.login, &creds.password).await {
        Ok((user, token)) => {
            debug!(user_id = user.id, login = %user.login, "user registered");
            ok_with_session(&token)
        }
        Err(RegisterError::LoginTaken) => {
            warn!(login = %creds.login, "registration for taken login");
            StatusCode::CONFLICT.into_response()
        }
        Err(err) => {
            error!(error = %err, "registration failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    // An already-authenticated caller keeps its session.
    if principal.user().is_some() {
        return StatusCode::OK.into_response();
    }

    let Ok(Json(creds)) = body else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if creds.login.is_empty() || creds.password.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match state.users.login(&creds.login, &creds.password).await {
        Ok((user, token)) => {
            debug!(user_id = user.id, "user logged in");
            ok_with_session(&token)
        }
        Err(LoginError::BadCredentials) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!(error = %err, "login failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
