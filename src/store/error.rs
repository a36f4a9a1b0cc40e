use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store call exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("unexpected status value in storage: {0}")]
    BadStatus(String),
}
