// server/src/services/cart_service.rs

//! Per-user shopping cart.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{CartItem, Product, ProductImage};
use crate::services::catalog_service::{self, PRODUCT_COLUMNS};

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, created_at, updated_at";
const UNAVAILABLE: &str = "This product is no longer available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
  Discontinued,
  InStock,
  LimitedStock,
  OutOfStock,
}

/// Availability of a cart line against the product's current stock.
pub fn line_status(is_active: bool, inventory: i32, quantity: i32) -> LineStatus {
  if !is_active {
    LineStatus::Discontinued
  } else if inventory >= quantity {
    LineStatus::InStock
  } else if inventory > 0 {
    LineStatus::LimitedStock
  } else {
    LineStatus::OutOfStock
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
  #[serde(flatten)]
  pub product: Product,
  /// Main image only.
  pub images: Vec<ProductImage>,
  pub status: LineStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  #[serde(flatten)]
  pub item: CartItem,
  pub product: CartProduct,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
  pub items: Vec<CartLine>,
  pub item_count: usize,
  pub subtotal_cents: i64,
}

pub fn subtotal_cents(lines: &[CartLine]) -> i64 {
  lines
    .iter()
    .map(|line| line.product.product.price_cents * i64::from(line.item.quantity))
    .sum()
}

/// Quantity of an existing line after adding `added` more, bounded by stock.
pub fn topped_up_quantity(current: i32, added: i32, inventory: i32) -> AppResult<i32> {
  match current.checked_add(added) {
    Some(combined) if combined <= inventory => Ok(combined),
    _ => Err(AppError::Validation(format!(
      "Cannot add {} more units. Only {} more units available.",
      added,
      inventory.saturating_sub(current).max(0)
    ))),
  }
}

async fn product_for_update(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Option<Product>> {
  let sql = format!("SELECT {} FROM products p WHERE p.id = $1 FOR UPDATE", PRODUCT_COLUMNS);
  Ok(sqlx::query_as::<_, Product>(&sql).bind(product_id).fetch_optional(conn).await?)
}

#[instrument(name = "cart_service::get_cart", skip(pool))]
pub async fn get_cart(pool: &PgPool, user_id: Uuid) -> AppResult<CartView> {
  let sql = format!(
    "SELECT {} FROM cart_items WHERE user_id = $1 ORDER BY created_at ASC",
    CART_COLUMNS
  );
  let items = sqlx::query_as::<_, CartItem>(&sql).bind(user_id).fetch_all(pool).await?;

  let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
  let products_sql = format!("SELECT {} FROM products p WHERE p.id = ANY($1)", PRODUCT_COLUMNS);
  let mut products: HashMap<Uuid, Product> = sqlx::query_as::<_, Product>(&products_sql)
    .bind(&product_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();
  let mut images = catalog_service::images_for(pool, &product_ids).await?;

  let mut lines = Vec::with_capacity(items.len());
  for item in items {
    let Some(product) = products.remove(&item.product_id) else {
      warn!(cart_item_id = %item.id, "Cart line refers to a missing product.");
      continue;
    };
    let main_image = images
      .remove(&product.id)
      .unwrap_or_default()
      .into_iter()
      .filter(|img| img.is_main)
      .take(1)
      .collect();
    let status = line_status(product.is_active, product.inventory, item.quantity);
    lines.push(CartLine {
      product: CartProduct {
        product,
        images: main_image,
        status,
        message: (status == LineStatus::Discontinued).then(|| UNAVAILABLE.to_string()),
      },
      item,
    });
  }

  let subtotal_cents = subtotal_cents(&lines);
  Ok(CartView {
    item_count: lines.len(),
    subtotal_cents,
    items: lines,
  })
}

/// Adds `quantity` of a product. Returns the line and whether it was newly created.
#[instrument(name = "cart_service::add_item", skip(pool))]
pub async fn add_item(pool: &PgPool, user_id: Uuid, product_id: Uuid, quantity: i32) -> AppResult<(CartItem, bool)> {
  if quantity < 1 {
    return Err(AppError::Validation("Quantity must be a positive number".to_string()));
  }

  let mut tx = pool.begin().await?;
  let product = product_for_update(&mut *tx, product_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
  if !product.is_active {
    return Err(AppError::Validation(UNAVAILABLE.to_string()));
  }
  if product.inventory < quantity {
    return Err(AppError::Validation(format!(
      "Insufficient inventory. Only {} items available.",
      product.inventory
    )));
  }

  let existing_sql = format!(
    "SELECT {} FROM cart_items WHERE user_id = $1 AND product_id = $2 FOR UPDATE",
    CART_COLUMNS
  );
  let existing = sqlx::query_as::<_, CartItem>(&existing_sql)
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(&mut *tx)
    .await?;

  let (item, created) = match existing {
    Some(line) => {
      let combined = topped_up_quantity(line.quantity, quantity, product.inventory)?;
      let sql = format!(
        "UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        CART_COLUMNS
      );
      let item = sqlx::query_as::<_, CartItem>(&sql)
        .bind(line.id)
        .bind(combined)
        .fetch_one(&mut *tx)
        .await?;
      (item, false)
    }
    None => {
      let sql = format!(
        "INSERT INTO cart_items (id, user_id, product_id, quantity) VALUES ($1, $2, $3, $4) RETURNING {}",
        CART_COLUMNS
      );
      let item = sqlx::query_as::<_, CartItem>(&sql)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;
      (item, true)
    }
  };
  tx.commit().await?;

  info!(cart_item_id = %item.id, quantity = item.quantity, created, "Cart line saved.");
  Ok((item, created))
}

#[instrument(name = "cart_service::update_quantity", skip(pool))]
pub async fn update_quantity(pool: &PgPool, user_id: Uuid, item_id: Uuid, quantity: i32) -> AppResult<CartItem> {
  if quantity < 1 {
    return Err(AppError::Validation("Quantity must be a positive number".to_string()));
  }

  let mut tx = pool.begin().await?;
  let line_sql = format!(
    "SELECT {} FROM cart_items WHERE id = $1 AND user_id = $2 FOR UPDATE",
    CART_COLUMNS
  );
  let line = sqlx::query_as::<_, CartItem>(&line_sql)
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

  let product = product_for_update(&mut *tx, line.product_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
  if product.inventory < quantity {
    return Err(AppError::Validation(format!(
      "Insufficient inventory. Only {} items available.",
      product.inventory
    )));
  }

  let sql = format!(
    "UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
    CART_COLUMNS
  );
  let item = sqlx::query_as::<_, CartItem>(&sql)
    .bind(item_id)
    .bind(quantity)
    .fetch_one(&mut *tx)
    .await?;
  tx.commit().await?;
  Ok(item)
}

#[instrument(name = "cart_service::remove_item", skip(pool))]
pub async fn remove_item(pool: &PgPool, user_id: Uuid, item_id: Uuid) -> AppResult<()> {
  let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
    .bind(item_id)
    .bind(user_id)
    .execute(pool)
    .await?;
  if result.rows_affected() == 0 {
    return Err(AppError::NotFound("Cart item not found".to_string()));
  }
  Ok(())
}

#[instrument(name = "cart_service::clear", skip(pool))]
pub async fn clear(pool: &PgPool, user_id: Uuid) -> AppResult<u64> {
  let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
    .bind(user_id)
    .execute(pool)
    .await?;
  Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Category;
  use chrono::Utc;

  fn line(price_cents: i64, quantity: i32, inventory: i32, is_active: bool) -> CartLine {
    let now = Utc::now();
    let product = Product {
      id: Uuid::new_v4(),
      name: "Linen Shirt".into(),
      description: "Breathable summer linen".into(),
      price_cents,
      category: Category::Mens,
      inventory,
      is_active,
      created_at: now,
      updated_at: now,
    };
    CartLine {
      item: CartItem {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        product_id: product.id,
        quantity,
        created_at: now,
        updated_at: now,
      },
      product: CartProduct {
        status: line_status(is_active, inventory, quantity),
        product,
        images: Vec::new(),
        message: None,
      },
    }
  }

  #[test]
  fn lines_are_classified_against_stock() {
    assert_eq!(line_status(false, 50, 1), LineStatus::Discontinued);
    assert_eq!(line_status(true, 5, 5), LineStatus::InStock);
    assert_eq!(line_status(true, 3, 5), LineStatus::LimitedStock);
    assert_eq!(line_status(true, 0, 1), LineStatus::OutOfStock);
  }

  #[test]
  fn subtotal_sums_price_times_quantity() {
    let lines = vec![line(2_999, 2, 10, true), line(4_550, 1, 0, true), line(1_000, 3, 9, false)];
    assert_eq!(subtotal_cents(&lines), 2_999 * 2 + 4_550 + 3_000);
    assert_eq!(subtotal_cents(&[]), 0);
  }

  #[test]
  fn top_up_is_bounded_by_stock_and_never_overflows() {
    assert_eq!(topped_up_quantity(2, 3, 5).unwrap(), 5);

    match topped_up_quantity(2, 2, 3) {
      Err(AppError::Validation(m)) => assert_eq!(m, "Cannot add 2 more units. Only 1 more units available."),
      other => panic!("expected a validation error, got {:?}", other),
    }
    assert!(matches!(
      topped_up_quantity(i32::MAX - 1, i32::MAX, i32::MAX),
      Err(AppError::Validation(_))
    ));
  }

  #[test]
  fn status_serializes_in_snake_case() {
    let json = serde_json::to_value(LineStatus::LimitedStock).unwrap();
    assert_eq!(json, serde_json::json!("limited_stock"));
  }
}
