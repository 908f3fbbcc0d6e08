// server/src/services/auth_service.rs

//! Password hashing and session token issuing/verification.

use crate::errors::AppError;
use crate::models::Role;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Hashes a plain-text password using Argon2 with a fresh random salt.
#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  if password.is_empty() {
    error!("Password hashing failed: Password cannot be empty.");
    return Err(AppError::Validation("Password cannot be empty.".to_string()));
  }

  let salt = SaltString::generate(&mut OsRng);
  match Argon2::default().hash_password(password.as_bytes(), &salt) {
    Ok(password_hash) => {
      debug!("Password hashed successfully.");
      Ok(password_hash.to_string())
    }
    Err(argon_err) => {
      error!(error = %argon_err, "Argon2 password hashing failed.");
      Err(AppError::Internal(format!("Password hashing process failed: {}", argon_err)))
    }
  }
}

/// Verifies a plain-text password against a stored Argon2 hash.
///
/// Returns `Ok(false)` on a mismatch; errors are reserved for unreadable hashes.
#[instrument(name = "auth_service::verify_password", skip_all, err(Display))]
pub fn verify_password(hashed_password: &str, provided_password: &str) -> Result<bool, AppError> {
  if provided_password.is_empty() {
    return Ok(false);
  }

  let parsed_hash = PasswordHash::new(hashed_password).map_err(|parse_err| {
    error!(error = %parse_err, "Failed to parse stored password hash string.");
    AppError::Internal(format!("Invalid stored password hash format: {}", parse_err))
  })?;

  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password verification failed: Passwords do not match.");
      Ok(false)
    }
    Err(other_argon_err) => {
      error!(error = %other_argon_err, "Argon2 password verification process encountered an error.");
      Err(AppError::Internal(format!(
        "Password verification process failed: {}",
        other_argon_err
      )))
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub: Uuid,
  pub email: String,
  pub role: Role,
  pub iat: i64,
  pub exp: i64,
}

/// Issues and verifies HS256 session tokens.
pub struct TokenService {
  encoding: EncodingKey,
  decoding: DecodingKey,
  validation: Validation,
  ttl: Duration,
}

impl TokenService {
  pub fn new(secret: &str, ttl_days: i64) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      validation,
      ttl: Duration::days(ttl_days),
    }
  }

  pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> Result<String, AppError> {
    self.issue_at(user_id, email, role, Utc::now())
  }

  pub fn issue_at(&self, user_id: Uuid, email: &str, role: Role, issued_at: DateTime<Utc>) -> Result<String, AppError> {
    let claims = Claims {
      sub: user_id,
      email: email.to_string(),
      role,
      iat: issued_at.timestamp(),
      exp: (issued_at + self.ttl).timestamp(),
    };
    Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
  }

  pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
    Ok(data.claims)
  }
}
