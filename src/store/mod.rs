//! Persistent state: users, orders, the polling watch-list, balances and the
//! withdrawal ledger.
//!
//! Every operation runs under a per-call deadline; writes that span multiple
//! rows go through a single transaction. Row-level locking in Postgres is the
//! only serialization the store relies on.

mod balances;
mod error;
mod orders;
mod users;

pub use balances::WithdrawOutcome;
pub use error::StoreError;
pub use orders::OrderPlacement;
pub use users::UserCreation;

use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

pub struct Store {
    pool: PgPool,
    deadline: Duration,
}

impl Store {
    pub fn new(pool: PgPool, deadline: Duration) -> Self {
        Self { pool, deadline }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Bound a store call by the configured deadline. A miss surfaces as
    /// `StoreError::Timeout`, which callers treat as transient.
    pub(crate) async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.deadline))?
    }
}

/// Postgres SQLSTATE 23505, the unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
