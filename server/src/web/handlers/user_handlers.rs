// server/src/web/handlers/user_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::Role;
use crate::services::user_service::{self, NewUser, UserChanges};
use crate::services::auth_service;
use crate::state::AppState;
use crate::web::response::{self, PageMeta};
use crate::web::session::{self, AdminUser, AuthUser};

// --- Request DTOs ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
  #[validate(email(message = "Please provide a valid email address"))]
  pub email: String,
  #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
  pub password: String,
  #[validate(length(min = 1, message = "First name is required"))]
  pub first_name: String,
  #[validate(length(min = 1, message = "Last name is required"))]
  pub last_name: String,
  pub address: Option<String>,
  pub city: Option<String>,
  pub country: Option<String>,
  pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
  #[validate(email(message = "Please provide a valid email address"))]
  pub email: Option<String>,
  #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
  pub password: Option<String>,
  #[validate(length(min = 1, message = "First name is required"))]
  pub first_name: Option<String>,
  #[validate(length(min = 1, message = "Last name is required"))]
  pub last_name: Option<String>,
  pub address: Option<String>,
  pub city: Option<String>,
  pub country: Option<String>,
  pub role: Option<Role>,
}

impl UpdateUserPayload {
  fn is_empty(&self) -> bool {
    self.email.is_none()
      && self.password.is_none()
      && self.first_name.is_none()
      && self.last_name.is_none()
      && self.address.is_none()
      && self.city.is_none()
      && self.country.is_none()
      && self.role.is_none()
  }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
  #[serde(default)]
  #[validate(length(min = 1, message = "Current password is required"))]
  pub current_password: String,
  #[serde(default)]
  #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
  pub new_password: String,
}

/// Self-service or admin; anyone else is refused with `action` in the message.
fn require_self_or_admin(auth: &AuthUser, target: Uuid, action: &str) -> Result<(), AppError> {
  if auth.id() == target || auth.is_admin() {
    Ok(())
  } else {
    warn!(caller = %auth.id(), %target, "Refused access to another user's account.");
    Err(AppError::Forbidden(format!("Not authorized to {} this user", action)))
  }
}

// --- Handlers ---

/// Public registration. A `role` is only honoured when an admin is calling.
#[instrument(name = "handler::register", skip(app_state, caller, payload), fields(req_email = %payload.email))]
pub async fn register_handler(
  app_state: web::Data<AppState>,
  caller: Option<AuthUser>,
  payload: web::Json<RegisterPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;
  let payload = payload.into_inner();

  let caller_is_admin = caller.as_ref().is_some_and(AuthUser::is_admin);
  let role = match payload.role {
    Some(role) if caller_is_admin => role,
    Some(Role::Admin) => {
      warn!("Non-admin registration asked for the ADMIN role; using USER.");
      Role::User
    }
    _ => Role::User,
  };

  let password_hash = auth_service::hash_password(&payload.password)?;
  let user = user_service::create(
    &app_state.db_pool,
    NewUser {
      email: payload.email,
      password_hash,
      first_name: payload.first_name,
      last_name: payload.last_name,
      address: payload.address,
      city: payload.city,
      country: payload.country,
      role,
    },
  )
  .await?;

  Ok(response::created(json!({
    "message": "User created successfully",
    "user": user,
  })))
}

#[instrument(name = "handler::list_users", skip(app_state, _admin))]
pub async fn list_users_handler(app_state: web::Data<AppState>, _admin: AdminUser) -> Result<HttpResponse, AppError> {
  let users = user_service::list(&app_state.db_pool).await?;
  let meta = PageMeta {
    count: Some(users.len() as i64),
    ..Default::default()
  };
  Ok(response::ok_with_meta(users, meta))
}

#[instrument(name = "handler::get_user", skip(app_state, _admin), fields(user_id = %path))]
pub async fn get_user_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let user = user_service::get_with_orders(&app_state.db_pool, path.into_inner())
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
  Ok(response::ok(user))
}

#[instrument(name = "handler::update_user", skip(app_state, auth, payload), fields(user_id = %path))]
pub async fn update_user_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
  payload: web::Json<UpdateUserPayload>,
) -> Result<HttpResponse, AppError> {
  let target = path.into_inner();
  require_self_or_admin(&auth, target, "update")?;

  payload.validate()?;
  if payload.is_empty() {
    return Err(AppError::Validation(
      "At least one field must be provided for update".to_string(),
    ));
  }
  let payload = payload.into_inner();
  if payload.role.is_some() && !auth.is_admin() {
    return Err(AppError::Forbidden("Only admins can change user roles".to_string()));
  }

  let password_hash = match payload.password.as_deref() {
    Some(password) => Some(auth_service::hash_password(password)?),
    None => None,
  };
  let changes = UserChanges {
    email: payload.email,
    password_hash,
    first_name: payload.first_name,
    last_name: payload.last_name,
    address: payload.address,
    city: payload.city,
    country: payload.country,
    role: payload.role,
  };

  let user = user_service::update(&app_state.db_pool, target, changes)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
  info!(updated_by = %auth.id(), "User updated.");
  Ok(response::ok(user))
}

/// Deleting one's own account also ends the session.
#[instrument(name = "handler::delete_user", skip(app_state, auth), fields(user_id = %path))]
pub async fn delete_user_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let target = path.into_inner();
  require_self_or_admin(&auth, target, "delete")?;

  if !user_service::delete(&app_state.db_pool, target).await? {
    return Err(AppError::NotFound("User not found".to_string()));
  }
  info!(deleted_by = %auth.id(), "User deleted.");

  let mut resp = response::ok(response::message("User deleted successfully"));
  if auth.id() == target {
    resp
      .add_cookie(&session::removal_cookie(&app_state.config))
      .map_err(|e| AppError::Internal(format!("Could not clear session cookie: {}", e)))?;
  }
  Ok(resp)
}

#[instrument(name = "handler::change_password", skip(app_state, auth, payload), fields(user_id = %auth.id()))]
pub async fn change_password_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  payload: web::Json<ChangePasswordPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;

  if !auth_service::verify_password(&auth.user.password_hash, &payload.current_password)? {
    warn!("Password change refused: current password mismatch.");
    return Err(AppError::Validation("Current password is incorrect".to_string()));
  }
  let new_hash = auth_service::hash_password(&payload.new_password)?;
  user_service::set_password_hash(&app_state.db_pool, auth.id(), &new_hash).await?;

  info!("Password changed.");
  Ok(response::ok(response::message("Password changed successfully")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn register_payload_rules() {
    let payload: RegisterPayload = serde_json::from_value(json!({
      "email": "not-an-email",
      "password": "abc",
      "firstName": "",
      "lastName": "Smith"
    }))
    .unwrap();
    let err = AppError::from(payload.validate().unwrap_err());
    match err {
      AppError::InvalidFields(fields) => {
        assert_eq!(
          fields,
          vec![
            "email: Please provide a valid email address".to_string(),
            "first_name: First name is required".to_string(),
            "password: Password must be at least 6 characters long".to_string(),
          ]
        );
      }
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[test]
  fn empty_update_is_detected() {
    assert!(UpdateUserPayload::default().is_empty());
    let payload: UpdateUserPayload = serde_json::from_value(json!({ "city": "Austin" })).unwrap();
    assert!(!payload.is_empty());
    assert!(payload.validate().is_ok());
  }
}
