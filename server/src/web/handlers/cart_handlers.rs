// server/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::services::cart_service;
use crate::state::AppState;
use crate::web::response;
use crate::web::session::AuthUser;

fn default_quantity() -> i32 {
  1
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartPayload {
  pub product_id: Uuid,
  #[serde(default = "default_quantity")]
  #[validate(range(min = 1, message = "Quantity must be a positive number"))]
  pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemPayload {
  #[validate(range(min = 1, message = "Quantity must be a positive number"))]
  pub quantity: i32,
}

#[instrument(name = "handler::get_cart", skip(app_state, auth), fields(user_id = %auth.id()))]
pub async fn get_cart_handler(app_state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, AppError> {
  let cart = cart_service::get_cart(&app_state.db_pool, auth.id()).await?;
  Ok(response::ok(cart))
}

/// New lines answer 201; topping up an existing line answers 200.
#[instrument(
  name = "handler::add_to_cart",
  skip(app_state, auth, payload),
  fields(user_id = %auth.id(), product_id = %payload.product_id, quantity = payload.quantity)
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  payload: web::Json<AddToCartPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;

  let (cart_item, created) =
    cart_service::add_item(&app_state.db_pool, auth.id(), payload.product_id, payload.quantity).await?;
  if created {
    Ok(response::created(json!({
      "message": "Item added to cart",
      "cartItem": cart_item,
    })))
  } else {
    Ok(response::ok(json!({
      "message": "Cart updated successfully",
      "cartItem": cart_item,
    })))
  }
}

#[instrument(name = "handler::update_cart_item", skip(app_state, auth, payload), fields(user_id = %auth.id(), cart_item_id = %path))]
pub async fn update_cart_item_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
  payload: web::Json<UpdateCartItemPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;
  let cart_item =
    cart_service::update_quantity(&app_state.db_pool, auth.id(), path.into_inner(), payload.quantity).await?;
  Ok(response::ok(json!({
    "message": "Cart updated successfully",
    "cartItem": cart_item,
  })))
}

#[instrument(name = "handler::remove_cart_item", skip(app_state, auth), fields(user_id = %auth.id(), cart_item_id = %path))]
pub async fn remove_cart_item_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  cart_service::remove_item(&app_state.db_pool, auth.id(), path.into_inner()).await?;
  Ok(response::ok(response::message("Item removed from cart")))
}

#[instrument(name = "handler::clear_cart", skip(app_state, auth), fields(user_id = %auth.id()))]
pub async fn clear_cart_handler(app_state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, AppError> {
  let removed = cart_service::clear(&app_state.db_pool, auth.id()).await?;
  info!(removed, "Cart cleared.");
  Ok(response::ok(response::message("Cart cleared successfully")))
}
