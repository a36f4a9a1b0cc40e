//! Session-cookie authentication resolved into a typed request principal.

use super::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

pub const TOKEN_COOKIE: &str = "Token";

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub login: String,
}

/// The request principal. Anonymous rather than an early 401, because
/// `/register` and `/login` serve unauthenticated callers; protected
/// handlers map Anonymous to 401 themselves.
#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    User(CurrentUser),
}

impl Principal {
    pub fn user(&self) -> Option<&CurrentUser> {
        match self {
            Principal::User(user) => Some(user),
            Principal::Anonymous => None,
        }
    }
}

pub(crate) fn token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == TOKEN_COOKIE).then(|| value.to_string())
        })
}

/// Resolve the `Token` cookie into a `Principal` extension. Lookup failures
/// degrade to Anonymous; the route decides whether that is fatal.
pub async fn session_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match token_from_cookies(request.headers()) {
        Some(token) => match state.users.user_by_token(&token).await {
            Ok(Some(user)) => {
                debug!(user_id = user.id, "user authenticated");
                Principal::User(CurrentUser {
                    id: user.id,
                    login: user.login,
                })
            }
            Ok(None) => Principal::Anonymous,
            Err(err) => {
                tracing::error!(error = %err, "session lookup failed");
                Principal::Anonymous
            }
        },
        None => Principal::Anonymous,
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        map
    }

    #[test]
    fn finds_the_token_cookie() {
        assert_eq!(
            token_from_cookies(&headers("Token=abc.def.ghi")),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            token_from_cookies(&headers("theme=dark; Token=t0ken; lang=en")),
            Some("t0ken".to_string())
        );
    }

    #[test]
    fn missing_or_foreign_cookies_yield_none() {
        assert_eq!(token_from_cookies(&HeaderMap::new()), None);
        assert_eq!(token_from_cookies(&headers("session=xyz")), None);
        assert_eq!(token_from_cookies(&headers("TokenX=abc")), None);
    }
}
