// server/src/errors.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  /// Payload failed field-level validation. Each entry reads `field: message`.
  #[error("Validation Error: {} field(s) invalid", .0.len())]
  InvalidFields(Vec<String>),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Token Error: {0}")]
  Token(#[from] jsonwebtoken::errors::Error),

  #[error("Image Host Error: {0}")]
  ImageHost(String),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  /// Message shown to the client. Internal details stay in the logs.
  fn public_message(&self) -> String {
    match self {
      AppError::Validation(m) | AppError::Auth(m) | AppError::Forbidden(m) | AppError::NotFound(m) => m.clone(),
      AppError::InvalidFields(_) => "Validation error".to_string(),
      AppError::Config(_) => "Server configuration error".to_string(),
      AppError::Sqlx(_) => "Database operation failed".to_string(),
      AppError::Token(_) => "Invalid token".to_string(),
      AppError::ImageHost(m) => format!("Image service error: {}", m),
      AppError::Internal(_) => "Server error".to_string(),
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

/// Flattens nested validation errors into `path: message` lines, e.g. `images[0].url: ...`.
fn collect_validation_messages(prefix: &str, errors: &validator::ValidationErrors, out: &mut Vec<String>) {
  use validator::ValidationErrorsKind;

  for (field, kind) in errors.errors() {
    let path = if prefix.is_empty() {
      field.to_string()
    } else {
      format!("{}.{}", prefix, field)
    };
    match kind {
      ValidationErrorsKind::Field(field_errors) => {
        for e in field_errors {
          let msg = e
            .message
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| e.code.to_string());
          out.push(format!("{}: {}", path, msg));
        }
      }
      ValidationErrorsKind::Struct(inner) => collect_validation_messages(&path, inner, out),
      ValidationErrorsKind::List(items) => {
        for (index, inner) in items {
          collect_validation_messages(&format!("{}[{}]", path, index), inner, out);
        }
      }
    }
  }
}

impl From<validator::ValidationErrors> for AppError {
  fn from(errors: validator::ValidationErrors) -> Self {
    let mut messages = Vec::new();
    collect_validation_messages("", &errors, &mut messages);
    messages.sort();
    AppError::InvalidFields(messages)
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) | AppError::InvalidFields(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::ImageHost(_) => StatusCode::BAD_GATEWAY,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Responding with client error");
    }

    let body = match self {
      AppError::InvalidFields(errors) => json!({
        "success": false,
        "message": self.public_message(),
        "errors": errors,
      }),
      _ => json!({
        "success": false,
        "message": self.public_message(),
      }),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;

  #[test]
  fn variants_map_to_expected_status_codes() {
    assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::InvalidFields(vec![]).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::Auth("x".into()).status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::Sqlx(sqlx::Error::RowNotFound).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(AppError::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[actix_rt::test]
  async fn field_errors_are_listed_in_the_envelope() {
    let err = AppError::InvalidFields(vec!["email: Please provide a valid email address".to_string()]);
    let resp = err.error_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = to_bytes(resp.into_body()).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["success"], false);
    assert_eq!(value["message"], "Validation error");
    assert_eq!(value["errors"][0], "email: Please provide a valid email address");
  }

  #[actix_rt::test]
  async fn database_details_are_not_leaked() {
    let resp = AppError::Sqlx(sqlx::Error::PoolTimedOut).error_response();
    let body = to_bytes(resp.into_body()).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["message"], "Database operation failed");
    assert!(value.get("errors").is_none());
  }

  #[test]
  fn anyhow_wrapping_sqlx_is_unwrapped() {
    let err: AppError = anyhow::Error::new(sqlx::Error::RowNotFound).into();
    assert!(matches!(err, AppError::Sqlx(sqlx::Error::RowNotFound)));

    let err: AppError = anyhow::anyhow!("boom").into();
    assert!(matches!(err, AppError::Internal(ref m) if m == "boom"));
  }
}
