// server/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
  Pending,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

/// What a status change does to product inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryAdjustment {
  /// Put the ordered quantities back on the shelf.
  Restore,
  /// Take the ordered quantities off the shelf again.
  Deduct,
  None,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "PENDING",
      OrderStatus::Processing => "PROCESSING",
      OrderStatus::Shipped => "SHIPPED",
      OrderStatus::Delivered => "DELIVERED",
      OrderStatus::Cancelled => "CANCELLED",
    }
  }

  /// Statuses a customer may move their own order to from `self`.
  pub fn customer_transitions(&self) -> &'static [OrderStatus] {
    match self {
      OrderStatus::Pending => &[OrderStatus::Cancelled],
      OrderStatus::Shipped => &[OrderStatus::Delivered],
      _ => &[],
    }
  }

  pub fn customer_can_move_to(&self, next: OrderStatus) -> bool {
    self.customer_transitions().contains(&next)
  }

  /// Inventory effect of moving from `self` to `next`.
  pub fn inventory_adjustment(&self, next: OrderStatus) -> InventoryAdjustment {
    match (*self == OrderStatus::Cancelled, next == OrderStatus::Cancelled) {
      (true, false) => InventoryAdjustment::Deduct,
      (false, true) => InventoryAdjustment::Restore,
      _ => InventoryAdjustment::None,
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|st| st.as_str() == s)
      .ok_or_else(|| "Invalid order status".to_string())
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub total_cents: i64,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn customers_may_only_cancel_pending_or_receive_shipped() {
    assert!(OrderStatus::Pending.customer_can_move_to(OrderStatus::Cancelled));
    assert!(OrderStatus::Shipped.customer_can_move_to(OrderStatus::Delivered));

    assert!(!OrderStatus::Pending.customer_can_move_to(OrderStatus::Delivered));
    assert!(!OrderStatus::Processing.customer_can_move_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Shipped.customer_can_move_to(OrderStatus::Cancelled));
    assert!(OrderStatus::Cancelled.customer_transitions().is_empty());
    assert!(OrderStatus::Delivered.customer_transitions().is_empty());
  }

  #[test]
  fn inventory_moves_only_across_the_cancelled_boundary() {
    use InventoryAdjustment::*;
    assert_eq!(OrderStatus::Pending.inventory_adjustment(OrderStatus::Cancelled), Restore);
    assert_eq!(OrderStatus::Shipped.inventory_adjustment(OrderStatus::Cancelled), Restore);
    assert_eq!(OrderStatus::Cancelled.inventory_adjustment(OrderStatus::Processing), Deduct);
    assert_eq!(OrderStatus::Cancelled.inventory_adjustment(OrderStatus::Cancelled), None);
    assert_eq!(OrderStatus::Pending.inventory_adjustment(OrderStatus::Shipped), None);
  }

  #[test]
  fn status_parsing_is_exact() {
    assert_eq!("SHIPPED".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
    assert!("shipped".parse::<OrderStatus>().is_err());
    assert!("LOST".parse::<OrderStatus>().is_err());
  }
}
