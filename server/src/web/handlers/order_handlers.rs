// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::OrderStatus;
use crate::services::order_service::{self, DEFAULT_PAGE_SIZE};
use crate::state::AppState;
use crate::web::pagination::Pagination;
use crate::web::response;
use crate::web::session::{AdminUser, AuthUser};

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
  pub page: Option<String>,
  pub limit: Option<String>,
  pub status: Option<String>,
}

impl OrderListQuery {
  fn pagination(&self) -> Pagination {
    Pagination::from_query(self.page.as_deref(), self.limit.as_deref(), DEFAULT_PAGE_SIZE)
  }
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
  #[serde(default)]
  pub status: Option<String>,
}

impl StatusPayload {
  fn status(&self) -> Result<OrderStatus, AppError> {
    self
      .status
      .as_deref()
      .ok_or_else(|| AppError::Validation("Invalid order status".to_string()))?
      .parse()
      .map_err(AppError::Validation)
  }
}

#[instrument(name = "handler::list_orders", skip(app_state, auth, query), fields(user_id = %auth.id()))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  query: web::Query<OrderListQuery>,
) -> Result<HttpResponse, AppError> {
  let pagination = query.pagination();
  let (orders, total) =
    order_service::list_for_user(&app_state.db_pool, auth.id(), pagination.limit, pagination.offset()).await?;
  let meta = pagination.meta(orders.len(), total);
  Ok(response::ok_with_meta(orders, meta))
}

#[instrument(name = "handler::create_order", skip(app_state, auth), fields(user_id = %auth.id()))]
pub async fn create_order_handler(app_state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, AppError> {
  let order = order_service::place_order(&app_state.db_pool, auth.id()).await?;
  Ok(response::created(json!({
    "message": "Order created successfully",
    "order": order,
  })))
}

#[instrument(name = "handler::list_all_orders", skip(app_state, _admin, query))]
pub async fn list_all_orders_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  query: web::Query<OrderListQuery>,
) -> Result<HttpResponse, AppError> {
  let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
    Some(raw) => Some(raw.parse::<OrderStatus>().map_err(AppError::Validation)?),
    None => None,
  };
  let pagination = query.pagination();
  let (orders, total) =
    order_service::list_all(&app_state.db_pool, status, pagination.limit, pagination.offset()).await?;
  let meta = pagination.meta(orders.len(), total);
  Ok(response::ok_with_meta(orders, meta))
}

/// Owners see their own orders; admins see any.
#[instrument(name = "handler::get_order", skip(app_state, auth), fields(user_id = %auth.id(), order_id = %path))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = order_service::get(&app_state.db_pool, path.into_inner())
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
  if order.order.user_id != auth.id() && !auth.is_admin() {
    warn!("Refused to show another customer's order.");
    return Err(AppError::Forbidden("Not authorized to view this order".to_string()));
  }
  Ok(response::ok(order))
}

#[instrument(name = "handler::cancel_order", skip(app_state, auth), fields(user_id = %auth.id(), order_id = %path))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = order_service::cancel(&app_state.db_pool, auth.id(), path.into_inner()).await?;
  Ok(response::ok(json!({
    "message": "Order cancelled successfully",
    "order": order,
  })))
}

#[instrument(name = "handler::fulfill_order", skip(app_state, auth), fields(user_id = %auth.id(), order_id = %path))]
pub async fn fulfill_order_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = order_service::fulfill(&app_state.db_pool, auth.id(), path.into_inner()).await?;
  Ok(response::ok(json!({
    "message": "Order marked as delivered successfully",
    "order": order,
  })))
}

#[instrument(name = "handler::update_order_status", skip(app_state, auth, payload), fields(user_id = %auth.id(), order_id = %path))]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
  payload: web::Json<StatusPayload>,
) -> Result<HttpResponse, AppError> {
  let next = payload.status()?;
  let order = order_service::update_status_as_owner(&app_state.db_pool, auth.id(), path.into_inner(), next).await?;

  let message = if next == OrderStatus::Cancelled {
    "Order cancelled successfully".to_string()
  } else {
    format!("Order marked as {} successfully", next.as_str().to_lowercase())
  };
  Ok(response::ok(json!({ "message": message, "order": order })))
}

#[instrument(name = "handler::set_order_status", skip(app_state, admin, payload), fields(admin_id = %admin.0.id(), order_id = %path))]
pub async fn set_order_status_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  path: web::Path<Uuid>,
  payload: web::Json<StatusPayload>,
) -> Result<HttpResponse, AppError> {
  let next = payload.status()?;
  let order = order_service::set_status(&app_state.db_pool, path.into_inner(), next).await?;
  info!(status = %order.status, "Order status set by admin.");
  Ok(response::ok(json!({
    "message": "Order status updated successfully",
    "order": order,
  })))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_payload_requires_a_known_status() {
    let missing = StatusPayload { status: None };
    assert!(matches!(missing.status(), Err(AppError::Validation(ref m)) if m == "Invalid order status"));

    let lowercase = StatusPayload {
      status: Some("shipped".into()),
    };
    assert!(lowercase.status().is_err());

    let shipped = StatusPayload {
      status: Some("SHIPPED".into()),
    };
    assert_eq!(shipped.status().unwrap(), OrderStatus::Shipped);
  }

  #[test]
  fn order_lists_default_to_ten_per_page() {
    let query = OrderListQuery::default();
    assert_eq!(query.pagination(), Pagination { page: 1, limit: 10 });
  }
}
