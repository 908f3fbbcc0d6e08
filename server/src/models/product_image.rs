// server/src/models/product_image.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
  pub id: Uuid,
  pub product_id: Uuid,
  pub url: String,
  /// CDN handle used to destroy the asset; `None` for externally hosted URLs.
  #[serde(skip_serializing)]
  pub public_id: Option<String>,
  pub is_main: bool,
  pub created_at: DateTime<Utc>,
}
