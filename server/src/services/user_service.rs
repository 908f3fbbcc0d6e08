// server/src/services/user_service.rs

//! Account storage: registration, profile updates, deletion and password changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{OrderStatus, Role, User};

const USER_COLUMNS: &str =
  "id, email, password_hash, first_name, last_name, address, city, country, role, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewUser {
  pub email: String,
  pub password_hash: String,
  pub first_name: String,
  pub last_name: String,
  pub address: Option<String>,
  pub city: Option<String>,
  pub country: Option<String>,
  pub role: Role,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
  pub email: Option<String>,
  pub password_hash: Option<String>,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub address: Option<String>,
  pub city: Option<String>,
  pub country: Option<String>,
  pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
  pub id: Uuid,
  pub total_cents: i64,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithOrders {
  #[serde(flatten)]
  pub user: User,
  pub orders: Vec<OrderSummary>,
}

fn email_taken(err: sqlx::Error) -> AppError {
  match &err {
    sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
      AppError::Validation("User with this email already exists".to_string())
    }
    _ => AppError::Sqlx(err),
  }
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> AppResult<Option<User>> {
  let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
  Ok(sqlx::query_as::<_, User>(&sql).bind(user_id).fetch_optional(pool).await?)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> AppResult<Option<User>> {
  let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER($1)", USER_COLUMNS);
  Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(pool).await?)
}

#[instrument(name = "user_service::list", skip(pool))]
pub async fn list(pool: &PgPool) -> AppResult<Vec<User>> {
  let sql = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
  Ok(sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?)
}

#[instrument(name = "user_service::create", skip(pool, new_user), fields(email = %new_user.email, role = ?new_user.role))]
pub async fn create(pool: &PgPool, new_user: NewUser) -> AppResult<User> {
  if find_by_email(pool, &new_user.email).await?.is_some() {
    return Err(AppError::Validation("User with this email already exists".to_string()));
  }

  let sql = format!(
    "INSERT INTO users (id, email, password_hash, first_name, last_name, address, city, country, role) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
    USER_COLUMNS
  );
  let user = sqlx::query_as::<_, User>(&sql)
    .bind(Uuid::new_v4())
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(&new_user.address)
    .bind(&new_user.city)
    .bind(&new_user.country)
    .bind(new_user.role)
    .fetch_one(pool)
    .await
    .map_err(email_taken)?;

  info!(user_id = %user.id, "User created.");
  Ok(user)
}

pub async fn get_with_orders(pool: &PgPool, user_id: Uuid) -> AppResult<Option<UserWithOrders>> {
  let Some(user) = find_by_id(pool, user_id).await? else {
    return Ok(None);
  };
  let orders = sqlx::query_as::<_, OrderSummary>(
    "SELECT id, total_cents, status, created_at FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;
  Ok(Some(UserWithOrders { user, orders }))
}

#[instrument(name = "user_service::update", skip(pool, changes))]
pub async fn update(pool: &PgPool, user_id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
  let sql = format!(
    "UPDATE users SET \
       email = COALESCE($2, email), \
       password_hash = COALESCE($3, password_hash), \
       first_name = COALESCE($4, first_name), \
       last_name = COALESCE($5, last_name), \
       address = COALESCE($6, address), \
       city = COALESCE($7, city), \
       country = COALESCE($8, country), \
       role = COALESCE($9, role), \
       updated_at = NOW() \
     WHERE id = $1 RETURNING {}",
    USER_COLUMNS
  );
  let updated = sqlx::query_as::<_, User>(&sql)
    .bind(user_id)
    .bind(changes.email)
    .bind(changes.password_hash)
    .bind(changes.first_name)
    .bind(changes.last_name)
    .bind(changes.address)
    .bind(changes.city)
    .bind(changes.country)
    .bind(changes.role)
    .fetch_optional(pool)
    .await
    .map_err(email_taken)?;
  Ok(updated)
}

/// Deletes the account; carts, ratings and orders go with it.
#[instrument(name = "user_service::delete", skip(pool))]
pub async fn delete(pool: &PgPool, user_id: Uuid) -> AppResult<bool> {
  let result = sqlx::query("DELETE FROM users WHERE id = $1")
    .bind(user_id)
    .execute(pool)
    .await?;
  Ok(result.rows_affected() == 1)
}

pub async fn set_password_hash(pool: &PgPool, user_id: Uuid, password_hash: &str) -> AppResult<()> {
  sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
    .bind(user_id)
    .bind(password_hash)
    .execute(pool)
    .await?;
  Ok(())
}
