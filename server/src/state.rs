// server/src/state.rs
use crate::config::AppConfig;
use crate::services::auth_service::TokenService;
use crate::services::image_host::{self, ImageHost};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub db_pool: PgPool,
  pub config: Arc<AppConfig>,
  pub tokens: Arc<TokenService>,
  pub images: Arc<dyn ImageHost>,
}

impl AppState {
  pub fn new(db_pool: PgPool, config: Arc<AppConfig>) -> Self {
    let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.jwt_expiration_days));
    let images = image_host::from_config(&config);
    Self {
      db_pool,
      config,
      tokens,
      images,
    }
  }

  /// Swap the image host, e.g. for an in-memory double in tests.
  pub fn with_image_host(mut self, images: Arc<dyn ImageHost>) -> Self {
    self.images = images;
    self
  }
}
