//! User rows and their one-to-one balance rows.

use super::{is_unique_violation, Store, StoreError};
use crate::models::User;
use sqlx::Row;

/// Result of an attempted registration.
#[derive(Debug)]
pub enum UserCreation {
    Created(User),
    LoginTaken,
}

impl Store {
    /// Insert a user and its zeroed balance row in one transaction.
    pub async fn add_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<UserCreation, StoreError> {
        self.with_deadline(async {
            let mut tx = self.pool().begin().await?;

            let inserted = sqlx::query(
                r#"INSERT INTO "user" (login, password) VALUES ($1, $2) RETURNING id"#,
            )
            .bind(login)
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .await;

            let row = match inserted {
                Ok(row) => row,
                Err(err) if is_unique_violation(&err) => return Ok(UserCreation::LoginTaken),
                Err(err) => return Err(err.into()),
            };
            let id: i64 = row.get("id");

            sqlx::query("INSERT INTO balance (user_id) VALUES ($1)")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            Ok(UserCreation::Created(User {
                id,
                login: login.to_string(),
                password_hash: password_hash.to_string(),
            }))
        })
        .await
    }

    pub async fn user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        self.with_deadline(async {
            let row = sqlx::query(r#"SELECT id, login, password FROM "user" WHERE login = $1"#)
                .bind(login)
                .fetch_optional(self.pool())
                .await?;

            Ok(row.map(|r| User {
                id: r.get("id"),
                login: r.get("login"),
                password_hash: r.get("password"),
            }))
        })
        .await
    }

    pub async fn user_by_id(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        self.with_deadline(async {
            let row = sqlx::query(r#"SELECT id, login, password FROM "user" WHERE id = $1"#)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;

            Ok(row.map(|r| User {
                id: r.get("id"),
                login: r.get("login"),
                password_hash: r.get("password"),
            }))
        })
        .await
    }
}
