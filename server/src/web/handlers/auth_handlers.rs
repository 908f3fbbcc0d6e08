// server/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::errors::AppError;
use crate::services::{auth_service, user_service};
use crate::state::AppState;
use crate::web::response;
use crate::web::session::{self, AuthUser};

// --- Request DTOs ---

#[derive(Debug, Deserialize, Validate)]
pub struct LoginPayload {
  #[validate(email(message = "Please enter a valid email address"))]
  pub email: String,
  #[validate(length(min = 1, message = "Password is required"))]
  pub password: String,
}

// --- Handlers ---

#[instrument(name = "handler::login", skip(app_state, payload), fields(req_email = %payload.email))]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<LoginPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;
  let invalid = || AppError::Auth("Invalid credentials".to_string());

  let user = match user_service::find_by_email(&app_state.db_pool, &payload.email).await? {
    Some(user) => user,
    None => {
      warn!("Login attempt for unknown email.");
      return Err(invalid());
    }
  };
  if !auth_service::verify_password(&user.password_hash, &payload.password)? {
    warn!(user_id = %user.id, "Login attempt with wrong password.");
    return Err(invalid());
  }

  let token = app_state.tokens.issue(user.id, &user.email, user.role)?;
  info!(user_id = %user.id, "User logged in.");

  let mut resp = response::ok(json!({ "user": user, "token": token }));
  resp.add_cookie(&session::session_cookie(&app_state.config, token))
    .map_err(|e| AppError::Internal(format!("Could not set session cookie: {}", e)))?;
  Ok(resp)
}

#[instrument(name = "handler::logout", skip(app_state))]
pub async fn logout_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let mut resp = response::ok(response::message("Logged out successfully"));
  resp.add_cookie(&session::removal_cookie(&app_state.config))
    .map_err(|e| AppError::Internal(format!("Could not clear session cookie: {}", e)))?;
  Ok(resp)
}

#[instrument(name = "handler::me", skip(auth), fields(user_id = %auth.id()))]
pub async fn me_handler(auth: AuthUser) -> Result<HttpResponse, AppError> {
  Ok(response::ok(auth.user))
}
