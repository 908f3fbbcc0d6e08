// server/src/models/product.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "product_category", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
  Mens,
  Womens,
  Accessories,
}

impl Category {
  pub const ALL: [Category; 3] = [Category::Mens, Category::Womens, Category::Accessories];

  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Mens => "MENS",
      Category::Womens => "WOMENS",
      Category::Accessories => "ACCESSORIES",
    }
  }

  pub fn valid_list() -> String {
    Self::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Case-insensitive, so `/category/mens` and `/category/MENS` both resolve.
impl FromStr for Category {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| format!("Invalid category. Valid categories are: {}", Self::valid_list()))
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub description: String,
  pub price_cents: i64,
  pub category: Category,
  pub inventory: i32,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn category_parsing_ignores_case() {
    assert_eq!("mens".parse::<Category>().unwrap(), Category::Mens);
    assert_eq!("Womens".parse::<Category>().unwrap(), Category::Womens);
    assert_eq!("ACCESSORIES".parse::<Category>().unwrap(), Category::Accessories);
  }

  #[test]
  fn unknown_category_lists_valid_options() {
    let err = "shoes".parse::<Category>().unwrap_err();
    assert_eq!(err, "Invalid category. Valid categories are: MENS, WOMENS, ACCESSORIES");
  }
}
