//! Order submission and the pipeline-facing order operations.

use crate::luhn;
use crate::models::{Order, WatchedOrder};
use crate::store::{OrderPlacement, Store, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The number failed the Luhn check (or was not a digit string at all).
    #[error("order number failed validation")]
    InvalidNumber,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful submission call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    AlreadyUploaded,
    OwnedByOther,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<Store>,
}

impl OrderService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Validate and register an order number for a user. The store is not
    /// touched unless the number passes the Luhn check.
    pub async fn submit_order(
        &self,
        number: &str,
        user_id: i64,
    ) -> Result<SubmitOutcome, OrderServiceError> {
        if !luhn::is_valid(number) {
            return Err(OrderServiceError::InvalidNumber);
        }

        match self.store.create_order(number, user_id).await? {
            OrderPlacement::Created => Ok(SubmitOutcome::Accepted),
            OrderPlacement::AlreadyOwnedByCaller => Ok(SubmitOutcome::AlreadyUploaded),
            OrderPlacement::OwnedByOther => Ok(SubmitOutcome::OwnedByOther),
        }
    }

    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderServiceError> {
        Ok(self.store.orders_by_user(user_id).await?)
    }

    pub async fn order_by_number(&self, number: &str) -> Result<Option<Order>, OrderServiceError> {
        Ok(self.store.order_by_number(number).await?)
    }

    pub async fn trackable_orders(&self) -> Result<Vec<WatchedOrder>, OrderServiceError> {
        Ok(self.store.trackable_orders().await?)
    }

    pub async fn apply_updates(&self, updates: &[WatchedOrder]) -> Result<(), OrderServiceError> {
        Ok(self.store.apply_updates(updates).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;

    fn service() -> OrderService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        OrderService::new(Arc::new(Store::new(pool, Duration::from_secs(1))))
    }

    #[tokio::test]
    async fn luhn_failure_never_reaches_the_store() {
        // The lazy pool would error on any query; an immediate InvalidNumber
        // proves validation happens first.
        let svc = service();
        assert!(matches!(
            svc.submit_order("12345678900", 1).await,
            Err(OrderServiceError::InvalidNumber)
        ));
        assert!(matches!(
            svc.submit_order("not-a-number", 1).await,
            Err(OrderServiceError::InvalidNumber)
        ));
        assert!(matches!(
            svc.submit_order("", 1).await,
            Err(OrderServiceError::InvalidNumber)
        ));
    }
}
