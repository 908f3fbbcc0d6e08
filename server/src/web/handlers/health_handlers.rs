// server/src/web/handlers/health_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::response;

/// Liveness plus a database check. A database failure is reported, not raised.
#[instrument(name = "handler::health", skip(app_state))]
pub async fn health_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let ping: Result<i64, sqlx::Error> = sqlx::query_scalar("SELECT COUNT(*) FROM products")
    .fetch_one(&app_state.db_pool)
    .await;

  let (database_connected, product_count) = match ping {
    Ok(count) => (true, count),
    Err(e) => {
      warn!(error = %e, "Database check failed.");
      (false, 0)
    }
  };

  Ok(response::ok(json!({
    "message": "API is working",
    "databaseConnected": database_connected,
    "productCount": product_count,
  })))
}
