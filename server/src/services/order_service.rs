// server/src/services/order_service.rs

//! Checkout and order lifecycle.
//!
//! Checkout runs as one transaction of named steps: lock the cart's product
//! rows, validate them, write the order and its lines, take the stock and
//! empty the cart. Any failing step drops the transaction, which rolls back.

use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::order::InventoryAdjustment;
use crate::models::{Order, OrderItem, OrderStatus, ProductImage};
use crate::services::catalog_service;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

const ORDER_COLUMNS: &str = "id, user_id, total_cents, status, created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedProduct {
  pub id: Uuid,
  pub name: String,
  pub price_cents: i64,
  /// Main image only.
  pub images: Vec<ProductImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  #[serde(flatten)]
  pub item: OrderItem,
  pub product: OrderedProduct,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
  pub id: Uuid,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
  #[serde(flatten)]
  pub order: Order,
  pub order_items: Vec<OrderLine>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user: Option<Customer>,
}

/// A cart line joined with the product it refers to, as read at checkout.
#[derive(Debug, Clone, FromRow)]
pub struct CheckoutLine {
  pub product_id: Uuid,
  pub quantity: i32,
  pub name: String,
  pub price_cents: i64,
  pub inventory: i32,
  pub is_active: bool,
}

/// Checks every line can be fulfilled and returns the order total in cents.
pub fn validate_checkout(lines: &[CheckoutLine]) -> AppResult<i64> {
  if lines.is_empty() {
    return Err(AppError::Validation("Cart is empty".to_string()));
  }
  for line in lines {
    if !line.is_active {
      return Err(AppError::Validation(format!(
        "Product \"{}\" is no longer available",
        line.name
      )));
    }
    if line.inventory < line.quantity {
      return Err(AppError::Validation(format!(
        "Insufficient inventory for \"{}\". Only {} available.",
        line.name, line.inventory
      )));
    }
  }
  Ok(lines.iter().map(|l| l.price_cents * i64::from(l.quantity)).sum())
}

/// The status change a customer asked for, or a 400 naming what is allowed.
pub fn check_customer_transition(current: OrderStatus, next: OrderStatus) -> AppResult<()> {
  if current.customer_can_move_to(next) {
    return Ok(());
  }
  let allowed = current
    .customer_transitions()
    .iter()
    .map(|s| s.as_str())
    .collect::<Vec<_>>()
    .join(", ");
  Err(AppError::Validation(format!(
    "Cannot change order status from {} to {}. Allowed statuses: {}",
    current, next, allowed
  )))
}

#[derive(Debug, FromRow)]
struct OrderLineRow {
  id: Uuid,
  order_id: Uuid,
  product_id: Uuid,
  quantity: i32,
  price_cents: i64,
  product_name: String,
  product_price_cents: i64,
}

async fn attach_lines(pool: &PgPool, orders: Vec<Order>) -> AppResult<Vec<OrderView>> {
  let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
  let rows = sqlx::query_as::<_, OrderLineRow>(
    "SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.price_cents, \
       p.name AS product_name, p.price_cents AS product_price_cents \
     FROM order_items oi JOIN products p ON p.id = oi.product_id \
     WHERE oi.order_id = ANY($1) ORDER BY oi.id",
  )
  .bind(&order_ids)
  .fetch_all(pool)
  .await?;

  let product_ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
  let images = catalog_service::images_for(pool, &product_ids).await?;

  let mut lines_by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
  for row in rows {
    let main_image = images
      .get(&row.product_id)
      .and_then(|imgs| imgs.iter().find(|img| img.is_main))
      .cloned()
      .into_iter()
      .collect();
    lines_by_order.entry(row.order_id).or_default().push(OrderLine {
      item: OrderItem {
        id: row.id,
        order_id: row.order_id,
        product_id: row.product_id,
        quantity: row.quantity,
        price_cents: row.price_cents,
      },
      product: OrderedProduct {
        id: row.product_id,
        name: row.product_name,
        price_cents: row.product_price_cents,
        images: main_image,
      },
    });
  }

  Ok(
    orders
      .into_iter()
      .map(|order| OrderView {
        order_items: lines_by_order.remove(&order.id).unwrap_or_default(),
        order,
        user: None,
      })
      .collect(),
  )
}

#[instrument(name = "order_service::list_for_user", skip(pool))]
pub async fn list_for_user(pool: &PgPool, user_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<OrderView>, i64)> {
  let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
    .bind(user_id)
    .fetch_one(pool)
    .await?;

  let sql = format!(
    "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    ORDER_COLUMNS
  );
  let orders = sqlx::query_as::<_, Order>(&sql)
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
  Ok((attach_lines(pool, orders).await?, total))
}

/// Every order, newest first, with the customer attached.
#[instrument(name = "order_service::list_all", skip(pool))]
pub async fn list_all(
  pool: &PgPool,
  status: Option<OrderStatus>,
  limit: i64,
  offset: i64,
) -> AppResult<(Vec<OrderView>, i64)> {
  let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)")
    .bind(status)
    .fetch_one(pool)
    .await?;

  let sql = format!(
    "SELECT {} FROM orders WHERE ($1::order_status IS NULL OR status = $1) \
     ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    ORDER_COLUMNS
  );
  let orders = sqlx::query_as::<_, Order>(&sql)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

  let user_ids: Vec<Uuid> = orders.iter().map(|o| o.user_id).collect();
  let customers: HashMap<Uuid, Customer> =
    sqlx::query_as::<_, Customer>("SELECT id, first_name, last_name, email FROM users WHERE id = ANY($1)")
      .bind(&user_ids)
      .fetch_all(pool)
      .await?
      .into_iter()
      .map(|c| (c.id, c))
      .collect();

  let mut views = attach_lines(pool, orders).await?;
  for view in &mut views {
    view.user = customers.get(&view.order.user_id).cloned();
  }
  Ok((views, total))
}

pub async fn get(pool: &PgPool, order_id: Uuid) -> AppResult<Option<OrderView>> {
  let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
  let Some(order) = sqlx::query_as::<_, Order>(&sql).bind(order_id).fetch_optional(pool).await? else {
    return Ok(None);
  };
  Ok(attach_lines(pool, vec![order]).await?.pop())
}

/// Reads the caller's cart and locks the referenced product rows.
/// Rows are locked in id order so concurrent checkouts cannot deadlock.
async fn lock_cart_lines(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<CheckoutLine>> {
  Ok(
    sqlx::query_as::<_, CheckoutLine>(
      "SELECT ci.product_id, ci.quantity, p.name, p.price_cents, p.inventory, p.is_active \
       FROM cart_items ci JOIN products p ON p.id = ci.product_id \
       WHERE ci.user_id = $1 ORDER BY p.id FOR UPDATE OF p",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?,
  )
}

async fn insert_order(conn: &mut PgConnection, user_id: Uuid, total_cents: i64, lines: &[CheckoutLine]) -> AppResult<Order> {
  let sql = format!(
    "INSERT INTO orders (id, user_id, total_cents, status) VALUES ($1, $2, $3, 'PENDING') RETURNING {}",
    ORDER_COLUMNS
  );
  let order = sqlx::query_as::<_, Order>(&sql)
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(total_cents)
    .fetch_one(&mut *conn)
    .await?;

  for line in lines {
    sqlx::query(
      "INSERT INTO order_items (id, order_id, product_id, quantity, price_cents) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(order.id)
    .bind(line.product_id)
    .bind(line.quantity)
    .bind(line.price_cents)
    .execute(&mut *conn)
    .await?;
  }
  Ok(order)
}

/// Takes `quantity` off a product's stock, refusing to go below zero.
async fn take_stock(conn: &mut PgConnection, product_id: Uuid, quantity: i32) -> AppResult<()> {
  let result = sqlx::query(
    "UPDATE products SET inventory = inventory - $2, updated_at = NOW() WHERE id = $1 AND inventory >= $2",
  )
  .bind(product_id)
  .bind(quantity)
  .execute(&mut *conn)
  .await?;
  if result.rows_affected() == 1 {
    return Ok(());
  }

  let (name, inventory): (String, i32) = sqlx::query_as("SELECT name, inventory FROM products WHERE id = $1")
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;
  Err(AppError::Validation(format!(
    "Insufficient inventory for \"{}\". Only {} available.",
    name, inventory
  )))
}

async fn return_stock(conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
  sqlx::query(
    "UPDATE products p SET inventory = p.inventory + oi.quantity, updated_at = NOW() \
     FROM order_items oi WHERE oi.order_id = $1 AND oi.product_id = p.id",
  )
  .bind(order_id)
  .execute(&mut *conn)
  .await?;
  Ok(())
}

/// Creates an order from the caller's cart.
#[instrument(name = "order_service::place_order", skip(pool), err(Display))]
pub async fn place_order(pool: &PgPool, user_id: Uuid) -> AppResult<OrderView> {
  let mut tx = pool.begin().await?;

  let lines = lock_cart_lines(&mut *tx, user_id).await?;
  let total_cents = validate_checkout(&lines)?;
  let order = insert_order(&mut *tx, user_id, total_cents, &lines).await?;
  for line in &lines {
    take_stock(&mut *tx, line.product_id, line.quantity).await?;
  }
  sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

  tx.commit().await?;
  info!(order_id = %order.id, total_cents, lines = lines.len(), "Order placed.");

  get(pool, order.id)
    .await?
    .ok_or_else(|| AppError::Internal("Order vanished after commit".to_string()))
}

async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Order> {
  let sql = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
  sqlx::query_as::<_, Order>(&sql)
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// Moves `order` to `next`, returning or re-taking stock across the cancelled boundary.
async fn apply_status(conn: &mut PgConnection, order: &Order, next: OrderStatus) -> AppResult<Order> {
  match order.status.inventory_adjustment(next) {
    InventoryAdjustment::Restore => return_stock(&mut *conn, order.id).await?,
    InventoryAdjustment::Deduct => {
      let items: Vec<(Uuid, i32)> =
        sqlx::query_as("SELECT product_id, quantity FROM order_items WHERE order_id = $1 ORDER BY product_id")
          .bind(order.id)
          .fetch_all(&mut *conn)
          .await?;
      for (product_id, quantity) in items {
        take_stock(&mut *conn, product_id, quantity).await?;
      }
    }
    InventoryAdjustment::None => {}
  }

  let sql = format!(
    "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
    ORDER_COLUMNS
  );
  Ok(
    sqlx::query_as::<_, Order>(&sql)
      .bind(order.id)
      .bind(next)
      .fetch_one(&mut *conn)
      .await?,
  )
}

fn require_owner(order: &Order, user_id: Uuid, action: &str) -> AppResult<()> {
  if order.user_id == user_id {
    Ok(())
  } else {
    warn!(order_id = %order.id, %user_id, "Order access by non-owner refused.");
    Err(AppError::Forbidden(format!("Not authorized to {} this order", action)))
  }
}

/// Cancels a pending order and puts its stock back.
#[instrument(name = "order_service::cancel", skip(pool))]
pub async fn cancel(pool: &PgPool, user_id: Uuid, order_id: Uuid) -> AppResult<Order> {
  let mut tx = pool.begin().await?;
  let order = lock_order(&mut *tx, order_id).await?;
  require_owner(&order, user_id, "cancel")?;
  if order.status != OrderStatus::Pending {
    return Err(AppError::Validation(format!(
      "Cannot cancel order with status \"{}\"",
      order.status
    )));
  }

  let cancelled = apply_status(&mut *tx, &order, OrderStatus::Cancelled).await?;
  tx.commit().await?;
  info!(%order_id, "Order cancelled; inventory restored.");
  Ok(cancelled)
}

/// Customer confirms receipt of a shipped order.
#[instrument(name = "order_service::fulfill", skip(pool))]
pub async fn fulfill(pool: &PgPool, user_id: Uuid, order_id: Uuid) -> AppResult<Order> {
  let mut tx = pool.begin().await?;
  let order = lock_order(&mut *tx, order_id).await?;
  require_owner(&order, user_id, "update")?;
  check_customer_transition(order.status, OrderStatus::Delivered)?;

  let delivered = apply_status(&mut *tx, &order, OrderStatus::Delivered).await?;
  tx.commit().await?;
  Ok(delivered)
}

#[instrument(name = "order_service::update_status_as_owner", skip(pool))]
pub async fn update_status_as_owner(
  pool: &PgPool,
  user_id: Uuid,
  order_id: Uuid,
  next: OrderStatus,
) -> AppResult<Order> {
  let mut tx = pool.begin().await?;
  let order = lock_order(&mut *tx, order_id).await?;
  require_owner(&order, user_id, "update")?;
  check_customer_transition(order.status, next)?;

  let updated = apply_status(&mut *tx, &order, next).await?;
  tx.commit().await?;
  info!(%order_id, from = %order.status, to = %next, "Order status changed by owner.");
  Ok(updated)
}

/// Admin override: any status, with stock kept consistent across cancellation.
#[instrument(name = "order_service::set_status", skip(pool))]
pub async fn set_status(pool: &PgPool, order_id: Uuid, next: OrderStatus) -> AppResult<Order> {
  let mut tx = pool.begin().await?;
  let order = lock_order(&mut *tx, order_id).await?;
  let updated = apply_status(&mut *tx, &order, next).await?;
  tx.commit().await?;
  info!(%order_id, from = %order.status, to = %next, "Order status changed by admin.");
  Ok(updated)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn checkout_line(name: &str, price_cents: i64, quantity: i32, inventory: i32, is_active: bool) -> CheckoutLine {
    CheckoutLine {
      product_id: Uuid::new_v4(),
      quantity,
      name: name.into(),
      price_cents,
      inventory,
      is_active,
    }
  }

  fn rejection(err: AppError) -> String {
    match err {
      AppError::Validation(message) => message,
      other => panic!("expected a validation error, got {:?}", other),
    }
  }

  #[test]
  fn empty_cart_cannot_be_checked_out() {
    assert_eq!(rejection(validate_checkout(&[]).unwrap_err()), "Cart is empty");
  }

  #[test]
  fn checkout_total_is_sum_of_lines() {
    let lines = vec![
      checkout_line("Denim Jacket", 8_999, 1, 3, true),
      checkout_line("Wool Beanie", 1_950, 2, 2, true),
    ];
    assert_eq!(validate_checkout(&lines).unwrap(), 8_999 + 3_900);
  }

  #[test]
  fn discontinued_or_short_lines_are_rejected_by_name() {
    let inactive = vec![checkout_line("Silk Scarf", 2_500, 1, 10, false)];
    assert_eq!(
      rejection(validate_checkout(&inactive).unwrap_err()),
      "Product \"Silk Scarf\" is no longer available"
    );

    let short = vec![checkout_line("Leather Belt", 3_000, 4, 3, true)];
    assert_eq!(
      rejection(validate_checkout(&short).unwrap_err()),
      "Insufficient inventory for \"Leather Belt\". Only 3 available."
    );
  }

  #[test]
  fn customer_transition_errors_name_allowed_statuses() {
    assert!(check_customer_transition(OrderStatus::Pending, OrderStatus::Cancelled).is_ok());
    assert!(check_customer_transition(OrderStatus::Shipped, OrderStatus::Delivered).is_ok());

    let err = check_customer_transition(OrderStatus::Pending, OrderStatus::Shipped).unwrap_err();
    assert_eq!(
      rejection(err),
      "Cannot change order status from PENDING to SHIPPED. Allowed statuses: CANCELLED"
    );
    let err = check_customer_transition(OrderStatus::Delivered, OrderStatus::Cancelled).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
  }
}
