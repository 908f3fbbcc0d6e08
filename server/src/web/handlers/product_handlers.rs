// server/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::Category;
use crate::services::catalog_service::{
  self, ListFilter, NewImage, NewProduct, ProductChanges, ProductView, SortBy, DEFAULT_PAGE_SIZE,
};
use crate::state::AppState;
use crate::web::pagination::Pagination;
use crate::web::response;
use crate::web::session::{AdminUser, AuthUser};

// --- Request DTOs ---

/// Raw listing query. Everything is a string so bad values can be reported
/// with the catalog's own messages.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
  pub category: Option<String>,
  pub page: Option<String>,
  pub limit: Option<String>,
  pub sort: Option<String>,
  pub include_inactive: Option<String>,
  pub search: Option<String>,
}

impl ProductQuery {
  fn sort(&self) -> Result<SortBy, AppError> {
    match self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
      Some(raw) => raw.parse().map_err(AppError::Validation),
      None => Ok(SortBy::default()),
    }
  }

  fn pagination(&self) -> Pagination {
    Pagination::from_query(self.page.as_deref(), self.limit.as_deref(), DEFAULT_PAGE_SIZE)
  }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
  #[validate(url(message = "Image URL must be a valid URL"))]
  pub url: String,
  #[serde(default)]
  pub is_main: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
  #[validate(length(min = 1, message = "Product name is required"))]
  pub name: String,
  #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
  pub description: String,
  #[validate(range(min = 1, message = "Price must be a positive number"))]
  pub price_cents: i64,
  pub category: Category,
  #[validate(range(min = 0, message = "Inventory must be a non-negative integer"))]
  pub inventory: i32,
  #[serde(default)]
  #[validate(nested)]
  pub images: Vec<ImagePayload>,
}

impl CreateProductPayload {
  /// Surrounding whitespace is dropped before validation, so a blank name is rejected.
  fn trimmed(mut self) -> Self {
    self.name = self.name.trim().to_string();
    self
  }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
  #[validate(length(min = 1, message = "Product name is required"))]
  pub name: Option<String>,
  #[validate(length(min = 10, message = "Description must be at least 10 characters"))]
  pub description: Option<String>,
  #[validate(range(min = 1, message = "Price must be a positive number"))]
  pub price_cents: Option<i64>,
  pub category: Option<Category>,
  #[validate(range(min = 0, message = "Inventory must be a non-negative integer"))]
  pub inventory: Option<i32>,
}

impl UpdateProductPayload {
  fn trimmed(mut self) -> Self {
    self.name = self.name.map(|n| n.trim().to_string());
    self
  }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RatingPayload {
  #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
  pub value: i16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductListing {
  products: Vec<ProductView>,
  total: i64,
  sort_by: SortBy,
  #[serde(skip_serializing_if = "Option::is_none")]
  category: Option<Category>,
}

async fn listing(
  app_state: &AppState,
  query: &ProductQuery,
  category: Option<Category>,
  include_inactive: bool,
) -> Result<HttpResponse, AppError> {
  let sort = query.sort()?;
  let pagination = query.pagination();
  let filter = ListFilter {
    category,
    include_inactive,
    search: query.search.clone(),
    sort,
    limit: pagination.limit,
    offset: pagination.offset(),
  };

  let page = catalog_service::list(&app_state.db_pool, &filter).await?;
  let meta = pagination.meta(page.products.len(), page.total);
  Ok(response::ok_with_meta(
    ProductListing {
      products: page.products,
      total: page.total,
      sort_by: sort,
      category,
    },
    meta,
  ))
}

// --- Handlers ---

#[instrument(name = "handler::list_products", skip(app_state, query))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
  let category = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
    Some(raw) => Some(raw.parse::<Category>().map_err(AppError::Validation)?),
    None => None,
  };
  let include_inactive = query.include_inactive.as_deref() == Some("true");
  listing(&app_state, &query, category, include_inactive).await
}

#[instrument(name = "handler::featured_products", skip(app_state))]
pub async fn featured_products_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let products = catalog_service::featured(&app_state.db_pool).await?;
  Ok(response::ok(json!({ "products": products })))
}

#[instrument(name = "handler::products_by_category", skip(app_state, query), fields(category = %path))]
pub async fn products_by_category_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
  let category: Category = path.parse().map_err(AppError::Validation)?;
  listing(&app_state, &query, Some(category), false).await
}

#[instrument(name = "handler::get_product", skip(app_state), fields(product_id = %path))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let detail = catalog_service::detail(&app_state.db_pool, path.into_inner())
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
  Ok(response::ok(detail))
}

#[instrument(name = "handler::create_product", skip(app_state, admin, payload), fields(admin_id = %admin.0.id()))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  payload: web::Json<CreateProductPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner().trimmed();
  payload.validate()?;

  let product = catalog_service::create(
    &app_state.db_pool,
    NewProduct {
      name: payload.name,
      description: payload.description,
      price_cents: payload.price_cents,
      category: payload.category,
      inventory: payload.inventory,
      images: payload
        .images
        .into_iter()
        .map(|img| NewImage {
          url: img.url,
          is_main: img.is_main,
        })
        .collect(),
    },
  )
  .await?;
  Ok(response::created(product))
}

#[instrument(name = "handler::update_product", skip(app_state, _admin, payload), fields(product_id = %path))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
  payload: web::Json<UpdateProductPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner().trimmed();
  payload.validate()?;
  let changes = ProductChanges {
    name: payload.name,
    description: payload.description,
    price_cents: payload.price_cents,
    category: payload.category,
    inventory: payload.inventory,
  };
  if changes.is_empty() {
    return Err(AppError::Validation(
      "At least one field must be provided for update".to_string(),
    ));
  }

  let product = catalog_service::update(&app_state.db_pool, path.into_inner(), changes)
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
  Ok(response::ok(product))
}

#[instrument(name = "handler::discontinue_product", skip(app_state, _admin), fields(product_id = %path))]
pub async fn discontinue_product_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product = catalog_service::discontinue(&app_state.db_pool, path.into_inner())
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
  Ok(response::ok(json!({
    "message": "Product has been discontinued",
    "product": product,
  })))
}

#[instrument(name = "handler::restore_product", skip(app_state, _admin), fields(product_id = %path))]
pub async fn restore_product_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product = catalog_service::restore(&app_state.db_pool, path.into_inner())
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
  Ok(response::ok(json!({
    "message": "Product has been restored",
    "product": product,
  })))
}

#[instrument(name = "handler::rate_product", skip(app_state, auth, payload), fields(product_id = %path, user_id = %auth.id()))]
pub async fn rate_product_handler(
  app_state: web::Data<AppState>,
  auth: AuthUser,
  path: web::Path<Uuid>,
  payload: web::Json<RatingPayload>,
) -> Result<HttpResponse, AppError> {
  payload.validate()?;
  let rating = catalog_service::rate(&app_state.db_pool, auth.id(), path.into_inner(), payload.value).await?;
  info!(rating_id = %rating.id, value = rating.value, "Product rated.");
  Ok(response::ok(rating))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn query_defaults_to_newest_first_page() {
    let query = ProductQuery::default();
    assert_eq!(query.sort().unwrap(), SortBy::Newest);
    assert_eq!(query.pagination(), Pagination { page: 1, limit: 12 });
  }

  #[test]
  fn invalid_sort_is_a_validation_error() {
    let query = ProductQuery {
      sort: Some("cheapest".into()),
      ..Default::default()
    };
    assert!(matches!(query.sort(), Err(AppError::Validation(_))));
  }

  #[test]
  fn create_payload_checks_prices_and_image_urls() {
    let payload: CreateProductPayload = serde_json::from_value(json!({
      "name": "Canvas Tote",
      "description": "Heavy cotton canvas tote bag",
      "priceCents": 0,
      "category": "ACCESSORIES",
      "inventory": 4,
      "images": [{ "url": "not a url" }]
    }))
    .unwrap();
    let errors = payload.validate().unwrap_err();
    let fields = errors.errors();
    assert!(fields.contains_key("price_cents"));
    assert!(fields.contains_key("images"));
  }

  #[test]
  fn blank_product_names_fail_validation_after_trimming() {
    let create: CreateProductPayload = serde_json::from_value(json!({
      "name": "   ",
      "description": "Heavy cotton canvas tote bag",
      "priceCents": 1500,
      "category": "ACCESSORIES",
      "inventory": 4
    }))
    .unwrap();
    let errors = create.trimmed().validate().unwrap_err();
    assert!(errors.errors().contains_key("name"));

    let update = UpdateProductPayload {
      name: Some(" \t ".into()),
      ..Default::default()
    };
    assert!(update.trimmed().validate().is_err());

    let padded = UpdateProductPayload {
      name: Some("  Canvas Tote ".into()),
      ..Default::default()
    }
    .trimmed();
    assert_eq!(padded.name.as_deref(), Some("Canvas Tote"));
    assert!(padded.validate().is_ok());
  }

  #[test]
  fn listing_serializes_sort_and_optional_category() {
    let value = serde_json::to_value(ProductListing {
      products: Vec::new(),
      total: 0,
      sort_by: SortBy::PriceDesc,
      category: None,
    })
    .unwrap();
    assert_eq!(value, json!({ "products": [], "total": 0, "sortBy": "price-desc" }));
  }
}
