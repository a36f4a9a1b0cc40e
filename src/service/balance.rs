//! Balance queries, withdrawals and the withdrawal history.

use crate::models::{Balance, WithdrawalEntry};
use crate::store::{Store, StoreError, WithdrawOutcome};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WithdrawError {
    /// The target order number is not registered.
    #[error("unknown order number")]
    UnknownOrder,

    #[error("current balance is not enough")]
    NotEnough,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct BalanceService {
    store: Arc<Store>,
}

impl BalanceService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// A missing balance row reads as zero.
    pub async fn balance(&self, user_id: i64) -> Result<Balance, StoreError> {
        Ok(self.store.balance(user_id).await?.unwrap_or(Balance {
            current: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
        }))
    }

    /// Debit points against a registered order. The sufficiency check runs
    /// inside the store transaction.
    pub async fn withdraw(
        &self,
        user_id: i64,
        order_number: &str,
        sum: Decimal,
    ) -> Result<Balance, WithdrawError> {
        if self.store.order_by_number(order_number).await?.is_none() {
            return Err(WithdrawError::UnknownOrder);
        }

        match self.store.withdraw(user_id, order_number, sum).await? {
            WithdrawOutcome::Done(balance) => Ok(balance),
            WithdrawOutcome::NotEnough => Err(WithdrawError::NotEnough),
        }
    }

    pub async fn withdrawals(&self, user_id: i64) -> Result<Vec<WithdrawalEntry>, StoreError> {
        self.store.withdrawals(user_id).await
    }
}
