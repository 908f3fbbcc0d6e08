// server/src/web/session.rs

//! Session cookie handling and the extractors that guard protected routes.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use tracing::warn;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::User;
use crate::services::user_service;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "token";

/// The session token from the `token` cookie, or from an `Authorization: Bearer` header.
pub fn token_from_request(req: &HttpRequest) -> Option<String> {
  if let Some(cookie) = req.cookie(TOKEN_COOKIE) {
    if !cookie.value().is_empty() {
      return Some(cookie.value().to_string());
    }
  }
  req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(|t| t.trim().to_string())
    .filter(|t| !t.is_empty())
}

fn base_cookie<'c>(config: &AppConfig, value: String) -> Cookie<'c> {
  Cookie::build(TOKEN_COOKIE, value)
    .path("/")
    .http_only(true)
    .secure(config.production)
    .same_site(if config.production { SameSite::None } else { SameSite::Lax })
    .finish()
}

pub fn session_cookie<'c>(config: &AppConfig, token: String) -> Cookie<'c> {
  let mut cookie = base_cookie(config, token);
  cookie.set_max_age(CookieDuration::days(config.jwt_expiration_days));
  cookie
}

pub fn removal_cookie<'c>(config: &AppConfig) -> Cookie<'c> {
  let mut cookie = base_cookie(config, String::new());
  cookie.make_removal();
  cookie
}

/// An authenticated caller, re-loaded from the database on every request.
#[derive(Debug, Clone)]
pub struct AuthUser {
  pub user: User,
}

impl AuthUser {
  pub fn id(&self) -> Uuid {
    self.user.id
  }

  pub fn is_admin(&self) -> bool {
    self.user.is_admin()
  }
}

impl FromRequest for AuthUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let token = token_from_request(req);
    let app_state = req.app_data::<web::Data<AppState>>().cloned();

    Box::pin(async move {
      let token = token.ok_or_else(|| AppError::Auth("Not authorized, no token".to_string()))?;
      let app_state =
        app_state.ok_or_else(|| AppError::Internal("Application state is not registered".to_string()))?;

      let claims = app_state.tokens.verify(&token).map_err(|e| {
        warn!(error = %e, "Rejected session token.");
        AppError::Auth("Invalid token".to_string())
      })?;

      let user = user_service::find_by_id(&app_state.db_pool, claims.sub)
        .await?
        .ok_or_else(|| AppError::Auth("User not found".to_string()))?;
      Ok(AuthUser { user })
    })
  }
}

/// An authenticated caller with the `ADMIN` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl AdminUser {
  pub fn require(auth: AuthUser) -> Result<Self, AppError> {
    if auth.is_admin() {
      Ok(AdminUser(auth))
    } else {
      warn!(user_id = %auth.id(), "Non-admin attempted an admin operation.");
      Err(AppError::Forbidden("Not authorized as an admin".to_string()))
    }
  }
}

impl FromRequest for AdminUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
    let auth = AuthUser::from_request(req, payload);
    Box::pin(async move { AdminUser::require(auth.await?) })
  }
}
