// server/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
  User,
  Admin,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: Uuid,
  pub email: String,
  #[serde(skip_serializing)] // Never send password hash to client
  pub password_hash: String,
  pub first_name: String,
  pub last_name: String,
  pub address: Option<String>,
  pub city: Option<String>,
  pub country: Option<String>,
  pub role: Role,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl User {
  pub fn is_admin(&self) -> bool {
    self.role == Role::Admin
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn password_hash_is_never_serialized() {
    let now = Utc::now();
    let user = User {
      id: Uuid::new_v4(),
      email: "jane@example.com".into(),
      password_hash: "$argon2id$secret".into(),
      first_name: "Jane".into(),
      last_name: "Smith".into(),
      address: None,
      city: Some("San Francisco".into()),
      country: Some("USA".into()),
      role: Role::User,
      created_at: now,
      updated_at: now,
    };
    let value = serde_json::to_value(&user).unwrap();
    assert!(value.get("passwordHash").is_none());
    assert_eq!(value["firstName"], "Jane");
    assert_eq!(value["role"], "USER");
  }
}
