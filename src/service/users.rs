//! Registration, login and session resolution.

use crate::auth::{self, AuthError, SessionTokens};
use crate::models::User;
use crate::store::{Store, StoreError, UserCreation};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("login already taken")]
    LoginTaken,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("wrong login or password")]
    BadCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<Store>,
    tokens: Arc<SessionTokens>,
}

impl UserService {
    pub fn new(store: Arc<Store>, tokens: Arc<SessionTokens>) -> Self {
        Self { store, tokens }
    }

    /// Create the user together with its balance row, then mint a session
    /// token so registration doubles as login.
    pub async fn register(&self, login: &str, password: &str) -> Result<(User, String), RegisterError> {
        let hash = auth::hash_password(password)?;

        match self.store.add_user(login, &hash).await? {
            UserCreation::Created(user) => {
                let token = self.tokens.issue(user.id)?;
                Ok((user, token))
            }
            UserCreation::LoginTaken => Err(RegisterError::LoginTaken),
        }
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<(User, String), LoginError> {
        let Some(user) = self.store.user_by_login(login).await? else {
            return Err(LoginError::BadCredentials);
        };

        if !auth::verify_password(password, &user.password_hash) {
            return Err(LoginError::BadCredentials);
        }

        let token = self.tokens.issue(user.id)?;
        Ok((user, token))
    }

    /// Resolve a session token into its user, if the token still verifies
    /// and the user still exists.
    pub async fn user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let Ok(user_id) = self.tokens.verify(token) else {
            return Ok(None);
        };
        self.store.user_by_id(user_id).await
    }
}
