// server/src/services/catalog_service.rs

//! Product catalog: listings with rating aggregates, product detail, admin
//! maintenance and customer ratings.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Category, Product, ProductImage, Rating};

pub const DEFAULT_PAGE_SIZE: i64 = 12;
pub const FEATURED_COUNT: i64 = 4;

pub(crate) const PRODUCT_COLUMNS: &str =
  "p.id, p.name, p.description, p.price_cents, p.category, p.inventory, p.is_active, p.created_at, p.updated_at";

/// Listing order for catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
  #[default]
  Newest,
  PriceAsc,
  PriceDesc,
  Rating,
}

impl SortBy {
  pub const ALL: [SortBy; 4] = [SortBy::Newest, SortBy::PriceAsc, SortBy::PriceDesc, SortBy::Rating];

  pub fn as_str(&self) -> &'static str {
    match self {
      SortBy::Newest => "newest",
      SortBy::PriceAsc => "price-asc",
      SortBy::PriceDesc => "price-desc",
      SortBy::Rating => "rating",
    }
  }

  fn order_clause(&self) -> &'static str {
    match self {
      SortBy::Newest => "p.created_at DESC",
      SortBy::PriceAsc => "p.price_cents ASC, p.created_at DESC",
      SortBy::PriceDesc => "p.price_cents DESC, p.created_at DESC",
      SortBy::Rating => {
        "COALESCE(ROUND(AVG(r.value)::NUMERIC, 1), 0) DESC, COUNT(r.id) DESC, p.created_at DESC"
      }
    }
  }
}

impl fmt::Display for SortBy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for SortBy {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl FromStr for SortBy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL.into_iter().find(|o| o.as_str() == s).ok_or_else(|| {
      let valid = Self::ALL.iter().map(|o| o.as_str()).collect::<Vec<_>>().join(", ");
      format!("Invalid sort option. Valid options are: {}", valid)
    })
  }
}

/// Average rating rounded to one decimal; unrated products report 0.
pub fn round_rating(avg: Option<f64>) -> f64 {
  match avg {
    Some(value) if value.is_finite() => (value * 10.0).round() / 10.0,
    _ => 0.0,
  }
}

#[derive(Debug, FromRow)]
struct RatedProductRow {
  #[sqlx(flatten)]
  product: Product,
  avg_rating: Option<f64>,
  num_reviews: i64,
}

/// A product as shown in listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
  #[serde(flatten)]
  pub product: Product,
  pub images: Vec<ProductImage>,
  pub avg_rating: f64,
  pub num_reviews: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RaterSummary {
  pub id: Uuid,
  pub first_name: String,
  pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingView {
  pub id: Uuid,
  pub value: i16,
  pub created_at: DateTime<Utc>,
  pub user: RaterSummary,
}

#[derive(Debug, FromRow)]
struct RatingRow {
  id: Uuid,
  value: i16,
  created_at: DateTime<Utc>,
  user_id: Uuid,
  first_name: String,
  last_name: String,
}

/// A single product with everything the detail page shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
  #[serde(flatten)]
  pub product: Product,
  pub images: Vec<ProductImage>,
  pub ratings: Vec<RatingView>,
  pub avg_rating: f64,
  pub num_reviews: i64,
}

/// A product with its images, as returned by admin writes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithImages {
  #[serde(flatten)]
  pub product: Product,
  pub images: Vec<ProductImage>,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
  pub category: Option<Category>,
  pub include_inactive: bool,
  pub search: Option<String>,
  pub sort: SortBy,
  pub limit: i64,
  pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct ProductPage {
  pub products: Vec<ProductView>,
  pub total: i64,
}

#[derive(Debug, Clone)]
pub struct NewImage {
  pub url: String,
  pub is_main: bool,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
  pub name: String,
  pub description: String,
  pub price_cents: i64,
  pub category: Category,
  pub inventory: i32,
  pub images: Vec<NewImage>,
}

/// Partial product update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
  pub name: Option<String>,
  pub description: Option<String>,
  pub price_cents: Option<i64>,
  pub category: Option<Category>,
  pub inventory: Option<i32>,
}

impl ProductChanges {
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.description.is_none()
      && self.price_cents.is_none()
      && self.category.is_none()
      && self.inventory.is_none()
  }
}

/// Exactly one image ends up main: the first flagged one, else the first.
pub fn assign_main_image(images: &[NewImage]) -> Vec<NewImage> {
  let main_index = images.iter().position(|img| img.is_main).unwrap_or(0);
  images
    .iter()
    .enumerate()
    .map(|(i, img)| NewImage {
      url: img.url.clone(),
      is_main: i == main_index,
    })
    .collect()
}

const FILTER_CLAUSE: &str = "($1::product_category IS NULL OR p.category = $1) \
   AND ($2 OR p.is_active) \
   AND ($3::TEXT IS NULL OR POSITION(LOWER($3) IN LOWER(p.name)) > 0)";

#[instrument(name = "catalog_service::list", skip(pool), fields(sort = %filter.sort))]
pub async fn list(pool: &PgPool, filter: &ListFilter) -> AppResult<ProductPage> {
  let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

  let count_sql = format!("SELECT COUNT(*) FROM products p WHERE {}", FILTER_CLAUSE);
  let list_sql = format!(
    "SELECT {}, AVG(r.value)::FLOAT8 AS avg_rating, COUNT(r.id) AS num_reviews \
     FROM products p LEFT JOIN ratings r ON r.product_id = p.id \
     WHERE {} GROUP BY p.id ORDER BY {} LIMIT $4 OFFSET $5",
    PRODUCT_COLUMNS,
    FILTER_CLAUSE,
    filter.sort.order_clause()
  );

  let count = sqlx::query_scalar::<_, i64>(&count_sql)
    .bind(filter.category)
    .bind(filter.include_inactive)
    .bind(search)
    .fetch_one(pool);
  let page = sqlx::query_as::<_, RatedProductRow>(&list_sql)
    .bind(filter.category)
    .bind(filter.include_inactive)
    .bind(search)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool);
  let (total, rows) = tokio::try_join!(count, page)?;

  debug!(total, returned = rows.len(), "Catalog page loaded.");
  let products = attach_images(pool, rows).await?;
  Ok(ProductPage { products, total })
}

/// Random selection of active, in-stock products.
#[instrument(name = "catalog_service::featured", skip(pool))]
pub async fn featured(pool: &PgPool) -> AppResult<Vec<ProductView>> {
  let sql = format!(
    "SELECT {}, AVG(r.value)::FLOAT8 AS avg_rating, COUNT(r.id) AS num_reviews \
     FROM products p LEFT JOIN ratings r ON r.product_id = p.id \
     WHERE p.is_active AND p.inventory > 0 GROUP BY p.id ORDER BY RANDOM() LIMIT $1",
    PRODUCT_COLUMNS
  );
  let rows = sqlx::query_as::<_, RatedProductRow>(&sql)
    .bind(FEATURED_COUNT)
    .fetch_all(pool)
    .await?;
  attach_images(pool, rows).await
}

async fn attach_images(pool: &PgPool, rows: Vec<RatedProductRow>) -> AppResult<Vec<ProductView>> {
  let ids: Vec<Uuid> = rows.iter().map(|row| row.product.id).collect();
  let mut images_by_product = images_for(pool, &ids).await?;

  Ok(
    rows
      .into_iter()
      .map(|row| ProductView {
        images: images_by_product.remove(&row.product.id).unwrap_or_default(),
        avg_rating: round_rating(row.avg_rating),
        num_reviews: row.num_reviews,
        product: row.product,
      })
      .collect(),
  )
}

/// Images of several products at once, main image first.
pub async fn images_for(pool: &PgPool, product_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<ProductImage>>> {
  if product_ids.is_empty() {
    return Ok(HashMap::new());
  }
  let images = sqlx::query_as::<_, ProductImage>(
    "SELECT id, product_id, url, public_id, is_main, created_at FROM product_images \
     WHERE product_id = ANY($1) ORDER BY is_main DESC, created_at ASC",
  )
  .bind(product_ids)
  .fetch_all(pool)
  .await?;

  let mut grouped: HashMap<Uuid, Vec<ProductImage>> = HashMap::new();
  for image in images {
    grouped.entry(image.product_id).or_default().push(image);
  }
  Ok(grouped)
}

pub async fn find_by_id(pool: &PgPool, product_id: Uuid) -> AppResult<Option<Product>> {
  let sql = format!("SELECT {} FROM products p WHERE p.id = $1", PRODUCT_COLUMNS);
  Ok(sqlx::query_as::<_, Product>(&sql).bind(product_id).fetch_optional(pool).await?)
}

async fn with_images(pool: &PgPool, product: Product) -> AppResult<ProductWithImages> {
  let images = images_for(pool, &[product.id]).await?.remove(&product.id).unwrap_or_default();
  Ok(ProductWithImages { product, images })
}

#[instrument(name = "catalog_service::detail", skip(pool))]
pub async fn detail(pool: &PgPool, product_id: Uuid) -> AppResult<Option<ProductDetail>> {
  let Some(product) = find_by_id(pool, product_id).await? else {
    return Ok(None);
  };
  let ProductWithImages { product, images } = with_images(pool, product).await?;

  let rows = sqlx::query_as::<_, RatingRow>(
    "SELECT r.id, r.value, r.created_at, u.id AS user_id, u.first_name, u.last_name \
     FROM ratings r JOIN users u ON u.id = r.user_id \
     WHERE r.product_id = $1 ORDER BY r.created_at DESC",
  )
  .bind(product_id)
  .fetch_all(pool)
  .await?;

  let num_reviews = rows.len() as i64;
  let avg = if rows.is_empty() {
    None
  } else {
    Some(rows.iter().map(|r| f64::from(r.value)).sum::<f64>() / rows.len() as f64)
  };
  let ratings = rows
    .into_iter()
    .map(|r| RatingView {
      id: r.id,
      value: r.value,
      created_at: r.created_at,
      user: RaterSummary {
        id: r.user_id,
        first_name: r.first_name,
        last_name: r.last_name,
      },
    })
    .collect();

  Ok(Some(ProductDetail {
    product,
    images,
    ratings,
    avg_rating: round_rating(avg),
    num_reviews,
  }))
}

pub(crate) async fn insert_image(
  conn: &mut PgConnection,
  product_id: Uuid,
  url: &str,
  public_id: Option<&str>,
  is_main: bool,
) -> AppResult<ProductImage> {
  Ok(
    sqlx::query_as::<_, ProductImage>(
      "INSERT INTO product_images (id, product_id, url, public_id, is_main) VALUES ($1, $2, $3, $4, $5) \
       RETURNING id, product_id, url, public_id, is_main, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(url)
    .bind(public_id)
    .bind(is_main)
    .fetch_one(conn)
    .await?,
  )
}

#[instrument(name = "catalog_service::create", skip(pool, new_product), fields(name = %new_product.name))]
pub async fn create(pool: &PgPool, new_product: NewProduct) -> AppResult<ProductWithImages> {
  let mut tx = pool.begin().await?;

  let sql = format!(
    "INSERT INTO products AS p (id, name, description, price_cents, category, inventory) \
     VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
    PRODUCT_COLUMNS
  );
  let product = sqlx::query_as::<_, Product>(&sql)
    .bind(Uuid::new_v4())
    .bind(&new_product.name)
    .bind(&new_product.description)
    .bind(new_product.price_cents)
    .bind(new_product.category)
    .bind(new_product.inventory)
    .fetch_one(&mut *tx)
    .await?;

  let mut images = Vec::with_capacity(new_product.images.len());
  for image in assign_main_image(&new_product.images) {
    images.push(insert_image(&mut *tx, product.id, &image.url, None, image.is_main).await?);
  }
  tx.commit().await?;

  info!(product_id = %product.id, images = images.len(), "Product created.");
  Ok(ProductWithImages { product, images })
}

#[instrument(name = "catalog_service::update", skip(pool, changes))]
pub async fn update(pool: &PgPool, product_id: Uuid, changes: ProductChanges) -> AppResult<Option<ProductWithImages>> {
  let sql = format!(
    "UPDATE products AS p SET \
       name = COALESCE($2, p.name), \
       description = COALESCE($3, p.description), \
       price_cents = COALESCE($4, p.price_cents), \
       category = COALESCE($5, p.category), \
       inventory = COALESCE($6, p.inventory), \
       updated_at = NOW() \
     WHERE p.id = $1 RETURNING {}",
    PRODUCT_COLUMNS
  );
  let updated = sqlx::query_as::<_, Product>(&sql)
    .bind(product_id)
    .bind(changes.name)
    .bind(changes.description)
    .bind(changes.price_cents)
    .bind(changes.category)
    .bind(changes.inventory)
    .fetch_optional(pool)
    .await?;

  match updated {
    Some(product) => Ok(Some(with_images(pool, product).await?)),
    None => Ok(None),
  }
}

/// Soft delete: hidden from the storefront and no longer purchasable.
#[instrument(name = "catalog_service::discontinue", skip(pool))]
pub async fn discontinue(pool: &PgPool, product_id: Uuid) -> AppResult<Option<ProductWithImages>> {
  set_active(pool, product_id, false).await
}

#[instrument(name = "catalog_service::restore", skip(pool))]
pub async fn restore(pool: &PgPool, product_id: Uuid) -> AppResult<Option<ProductWithImages>> {
  set_active(pool, product_id, true).await
}

async fn set_active(pool: &PgPool, product_id: Uuid, active: bool) -> AppResult<Option<ProductWithImages>> {
  // Discontinuing also zeroes stock; restoring leaves stock for the admin to set.
  let sql = format!(
    "UPDATE products AS p SET is_active = $2, \
       inventory = CASE WHEN $2 THEN p.inventory ELSE 0 END, \
       updated_at = NOW() \
     WHERE p.id = $1 RETURNING {}",
    PRODUCT_COLUMNS
  );
  let updated = sqlx::query_as::<_, Product>(&sql)
    .bind(product_id)
    .bind(active)
    .fetch_optional(pool)
    .await?;

  match updated {
    Some(product) => {
      info!(product_id = %product.id, active, "Product availability changed.");
      Ok(Some(with_images(pool, product).await?))
    }
    None => Ok(None),
  }
}

/// Records the caller's rating; rating the same product again replaces the value.
#[instrument(name = "catalog_service::rate", skip(pool))]
pub async fn rate(pool: &PgPool, user_id: Uuid, product_id: Uuid, value: i16) -> AppResult<Rating> {
  if !(1..=5).contains(&value) {
    return Err(AppError::Validation("Rating must be between 1 and 5".to_string()));
  }
  if find_by_id(pool, product_id).await?.is_none() {
    return Err(AppError::NotFound("Product not found".to_string()));
  }

  let rating = sqlx::query_as::<_, Rating>(
    "INSERT INTO ratings (id, user_id, product_id, value) VALUES ($1, $2, $3, $4) \
     ON CONFLICT (user_id, product_id) DO UPDATE SET value = EXCLUDED.value, created_at = NOW() \
     RETURNING id, user_id, product_id, value, created_at",
  )
  .bind(Uuid::new_v4())
  .bind(user_id)
  .bind(product_id)
  .bind(value)
  .fetch_one(pool)
  .await?;
  Ok(rating)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ratings_round_to_one_decimal() {
    assert_eq!(round_rating(None), 0.0);
    assert_eq!(round_rating(Some(4.0)), 4.0);
    assert_eq!(round_rating(Some(13.0 / 3.0)), 4.3);
    assert_eq!(round_rating(Some(4.66)), 4.7);
    assert_eq!(round_rating(Some(f64::NAN)), 0.0);
  }

  #[test]
  fn sort_options_parse_exactly() {
    assert_eq!("newest".parse::<SortBy>().unwrap(), SortBy::Newest);
    assert_eq!("price-asc".parse::<SortBy>().unwrap(), SortBy::PriceAsc);
    assert_eq!("price-desc".parse::<SortBy>().unwrap(), SortBy::PriceDesc);
    assert_eq!("rating".parse::<SortBy>().unwrap(), SortBy::Rating);
    assert_eq!(SortBy::default(), SortBy::Newest);
  }

  #[test]
  fn unknown_sort_lists_valid_options() {
    let err = "popularity".parse::<SortBy>().unwrap_err();
    assert_eq!(err, "Invalid sort option. Valid options are: newest, price-asc, price-desc, rating");
  }

  #[test]
  fn first_image_is_main_unless_one_is_flagged() {
    let unflagged = vec![
      NewImage { url: "https://a".into(), is_main: false },
      NewImage { url: "https://b".into(), is_main: false },
    ];
    let assigned = assign_main_image(&unflagged);
    assert!(assigned[0].is_main);
    assert!(!assigned[1].is_main);

    let flagged_twice = vec![
      NewImage { url: "https://a".into(), is_main: false },
      NewImage { url: "https://b".into(), is_main: true },
      NewImage { url: "https://c".into(), is_main: true },
    ];
    let mains: Vec<bool> = assign_main_image(&flagged_twice).iter().map(|i| i.is_main).collect();
    assert_eq!(mains, vec![false, true, false]);

    assert!(assign_main_image(&[]).is_empty());
  }

  #[test]
  fn empty_changes_are_detected() {
    assert!(ProductChanges::default().is_empty());
    let changes = ProductChanges {
      inventory: Some(0),
      ..Default::default()
    };
    assert!(!changes.is_empty());
  }
}
