// server/src/models/rating.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
  pub id: Uuid,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub value: i16,
  pub created_at: DateTime<Utc>,
}
