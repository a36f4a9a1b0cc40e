//! Order rows and their polling watch-list projection.

use super::{is_unique_violation, Store, StoreError};
use crate::models::{AccrualStatus, Order, OrderStatus, WatchedOrder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Result of an order submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPlacement {
    Created,
    AlreadyOwnedByCaller,
    OwnedByOther,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    number: String,
    status: String,
    accrual: Option<Decimal>,
    uploaded_at: DateTime<Utc>,
    user_id: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, StoreError> {
        let status =
            OrderStatus::parse(&row.status).ok_or_else(|| StoreError::BadStatus(row.status))?;
        Ok(Order {
            id: row.id,
            number: row.number,
            status,
            accrual: row.accrual,
            uploaded_at: row.uploaded_at,
            user_id: row.user_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WatchRow {
    id: i64,
    order_number: String,
    user_id: i64,
    last_status: String,
    last_accrual: Option<Decimal>,
}

impl TryFrom<WatchRow> for WatchedOrder {
    type Error = StoreError;

    fn try_from(row: WatchRow) -> Result<Self, StoreError> {
        let last_status = AccrualStatus::parse(&row.last_status)
            .ok_or_else(|| StoreError::BadStatus(row.last_status))?;
        Ok(WatchedOrder {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            last_status,
            last_accrual: row.last_accrual,
        })
    }
}

impl Store {
    /// Insert the order and its watch row atomically. A number conflict is
    /// resolved into either "already yours" or "someone else's" by looking up
    /// the existing owner.
    pub async fn create_order(
        &self,
        number: &str,
        user_id: i64,
    ) -> Result<OrderPlacement, StoreError> {
        self.with_deadline(async {
            let mut tx = self.pool().begin().await?;

            let inserted = sqlx::query(r#"INSERT INTO "order" (number, user_id) VALUES ($1, $2)"#)
                .bind(number)
                .bind(user_id)
                .execute(&mut *tx)
                .await;

            if let Err(err) = inserted {
                if is_unique_violation(&err) {
                    drop(tx);
                    return match self.fetch_order(number).await? {
                        Some(existing) if existing.user_id == user_id => {
                            Ok(OrderPlacement::AlreadyOwnedByCaller)
                        }
                        Some(_) => Ok(OrderPlacement::OwnedByOther),
                        None => Err(err.into()),
                    };
                }
                return Err(err.into());
            }

            sqlx::query("INSERT INTO watched_order (order_number, user_id) VALUES ($1, $2)")
                .bind(number)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(OrderPlacement::Created)
        })
        .await
    }

    pub async fn order_by_number(&self, number: &str) -> Result<Option<Order>, StoreError> {
        self.with_deadline(self.fetch_order(number)).await
    }

    async fn fetch_order(&self, number: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"SELECT id, number, status, accrual, uploaded_at, user_id
               FROM "order" WHERE number = $1"#,
        )
        .bind(number)
        .fetch_optional(self.pool())
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// All orders a user has submitted, oldest first.
    pub async fn orders_by_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        self.with_deadline(async {
            let rows = sqlx::query_as::<_, OrderRow>(
                r#"SELECT id, number, status, accrual, uploaded_at, user_id
                   FROM "order" WHERE user_id = $1 ORDER BY uploaded_at"#,
            )
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

            rows.into_iter().map(Order::try_from).collect()
        })
        .await
    }

    /// Watch rows still awaiting a terminal status, in insertion order.
    pub async fn trackable_orders(&self) -> Result<Vec<WatchedOrder>, StoreError> {
        self.with_deadline(async {
            let rows = sqlx::query_as::<_, WatchRow>(
                r#"SELECT id, order_number, user_id, last_status, last_accrual
                   FROM watched_order WHERE trackable = TRUE ORDER BY id"#,
            )
            .fetch_all(self.pool())
            .await?;

            rows.into_iter().map(WatchedOrder::try_from).collect()
        })
        .await
    }

    /// Commit a batch of status updates in one transaction.
    ///
    /// Per entry: flip the order status (accrual is written only on the
    /// transition to PROCESSED), refresh the watch row and recompute
    /// `trackable`, and credit the owner's balance for a processed accrual.
    /// The `status NOT IN (...)` guard makes redelivery of a terminal order
    /// a no-op, balance included.
    pub async fn apply_updates(&self, updates: &[WatchedOrder]) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }

        self.with_deadline(async {
            let mut tx = self.pool().begin().await?;

            for update in updates {
                let status = update.last_status.as_order_status();

                let changed = if status == OrderStatus::Processed {
                    sqlx::query(
                        r#"UPDATE "order" SET status = $1, accrual = $2
                           WHERE number = $3 AND status NOT IN ('INVALID', 'PROCESSED')"#,
                    )
                    .bind(status.as_str())
                    .bind(update.last_accrual)
                    .bind(&update.order_number)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                } else {
                    sqlx::query(
                        r#"UPDATE "order" SET status = $1
                           WHERE number = $2 AND status NOT IN ('INVALID', 'PROCESSED')"#,
                    )
                    .bind(status.as_str())
                    .bind(&update.order_number)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                };

                if changed == 0 {
                    // Already terminal: redelivered update, nothing to do.
                    continue;
                }

                sqlx::query(
                    r#"UPDATE watched_order
                       SET last_status = $1, last_accrual = $2, trackable = $3
                       WHERE order_number = $4"#,
                )
                .bind(update.last_status.as_str())
                .bind(update.last_accrual)
                .bind(!update.last_status.is_terminal())
                .bind(&update.order_number)
                .execute(&mut *tx)
                .await?;

                if update.last_status == AccrualStatus::Processed {
                    if let Some(accrual) = update.last_accrual {
                        if accrual > Decimal::ZERO {
                            sqlx::query(
                                "UPDATE balance SET current = current + $1 WHERE user_id = $2",
                            )
                            .bind(accrual)
                            .bind(update.user_id)
                            .execute(&mut *tx)
                            .await?;
                        }
                    }
                }
            }

            tx.commit().await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_row_conversion_rejects_unknown_status() {
        let row = OrderRow {
            id: 1,
            number: "12345678903".into(),
            status: "SHIPPED".into(),
            accrual: None,
            uploaded_at: Utc::now(),
            user_id: 2,
        };
        assert!(matches!(
            Order::try_from(row),
            Err(StoreError::BadStatus(s)) if s == "SHIPPED"
        ));
    }

    #[test]
    fn watch_row_defaults_to_registered() {
        let row = WatchRow {
            id: 1,
            order_number: "12345678903".into(),
            user_id: 2,
            last_status: "NEW".into(),
            last_accrual: None,
        };
        let watched = WatchedOrder::try_from(row).unwrap();
        assert_eq!(watched.last_status, AccrualStatus::Registered);
    }
}
