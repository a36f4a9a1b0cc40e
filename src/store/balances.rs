//! Balance pairs and the append-only withdrawal ledger.

use super::{Store, StoreError};
use crate::models::{Balance, WithdrawalEntry};
use rust_decimal::Decimal;
use sqlx::Row;

/// Result of an attempted withdrawal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WithdrawOutcome {
    Done(Balance),
    NotEnough,
}

impl Store {
    pub async fn balance(&self, user_id: i64) -> Result<Option<Balance>, StoreError> {
        self.with_deadline(async {
            let row = sqlx::query("SELECT current, withdrawn FROM balance WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;

            Ok(row.map(|r| Balance {
                current: r.get("current"),
                withdrawn: r.get("withdrawn"),
            }))
        })
        .await
    }

    /// Debit `sum` points against `order_number`.
    ///
    /// The read-and-check runs inside the transaction under `FOR UPDATE`, so
    /// two racing withdrawals cannot both pass the sufficiency check.
    pub async fn withdraw(
        &self,
        user_id: i64,
        order_number: &str,
        sum: Decimal,
    ) -> Result<WithdrawOutcome, StoreError> {
        self.with_deadline(async {
            let mut tx = self.pool().begin().await?;

            let row = sqlx::query(
                "SELECT current, withdrawn FROM balance WHERE user_id = $1 FOR UPDATE",
            )
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                return Ok(WithdrawOutcome::NotEnough);
            };
            let current: Decimal = row.get("current");
            let withdrawn: Decimal = row.get("withdrawn");

            if current < sum {
                return Ok(WithdrawOutcome::NotEnough);
            }

            sqlx::query(
                "UPDATE balance SET current = current - $1, withdrawn = withdrawn + $1
                 WHERE user_id = $2",
            )
            .bind(sum)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO withdraw_history (order_number, sum, user_id) VALUES ($1, $2, $3)",
            )
            .bind(order_number)
            .bind(sum)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            Ok(WithdrawOutcome::Done(Balance {
                current: current - sum,
                withdrawn: withdrawn + sum,
            }))
        })
        .await
    }

    /// Ledger rows for a user, oldest first.
    pub async fn withdrawals(&self, user_id: i64) -> Result<Vec<WithdrawalEntry>, StoreError> {
        self.with_deadline(async {
            let rows = sqlx::query(
                "SELECT order_number, sum, processed_at FROM withdraw_history
                 WHERE user_id = $1 ORDER BY processed_at",
            )
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

            Ok(rows
                .into_iter()
                .map(|r| WithdrawalEntry {
                    order_number: r.get("order_number"),
                    sum: r.get("sum"),
                    processed_at: r.get("processed_at"),
                    user_id,
                })
                .collect())
        })
        .await
    }
}
