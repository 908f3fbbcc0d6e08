// tests/inventory_tests.rs

//! Stock and account invariants that only hold with a real database behind
//! the services. `sqlx::test` gives each test a fresh, migrated database
//! from `DATABASE_URL`.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use threadscape::errors::{AppError, Result as AppResult};
use threadscape::models::{Category, OrderStatus, Role, User};
use threadscape::services::catalog_service::{self, NewProduct, ProductChanges};
use threadscape::services::image_host::{HostedImage, ImageHost, ImageUpload};
use threadscape::services::user_service::{self, NewUser, UserChanges};
use threadscape::services::{cart_service, image_service, order_service};

async fn user(pool: &PgPool, email: &str) -> User {
  user_service::create(
    pool,
    NewUser {
      email: email.to_string(),
      password_hash: "not-a-real-hash".to_string(),
      first_name: "Test".to_string(),
      last_name: "Shopper".to_string(),
      address: None,
      city: None,
      country: None,
      role: Role::User,
    },
  )
  .await
  .expect("user should be created")
}

async fn product(pool: &PgPool, name: &str, price_cents: i64, inventory: i32) -> Uuid {
  catalog_service::create(
    pool,
    NewProduct {
      name: name.to_string(),
      description: format!("{} for testing", name),
      price_cents,
      category: Category::Mens,
      inventory,
      images: vec![],
    },
  )
  .await
  .expect("product should be created")
  .product
  .id
}

async fn inventory(pool: &PgPool, product_id: Uuid) -> i32 {
  catalog_service::find_by_id(pool, product_id)
    .await
    .expect("product lookup")
    .expect("product exists")
    .inventory
}

fn assert_validation(result: AppResult<impl std::fmt::Debug>) -> String {
  match result {
    Err(AppError::Validation(message)) => message,
    other => panic!("expected a validation error, got {:?}", other),
  }
}

#[sqlx::test(migrations = "./migrations")]
async fn out_of_stock_products_cannot_be_added(pool: PgPool) {
  let shopper = user(&pool, "shopper@example.com").await;
  let sold_out = product(&pool, "Sold Out Tee", 1999, 0).await;

  let message = assert_validation(cart_service::add_item(&pool, shopper.id, sold_out, 1).await);
  assert_eq!(message, "Insufficient inventory. Only 0 items available.");
  assert!(cart_service::get_cart(&pool, shopper.id).await.unwrap().items.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn topping_up_past_stock_leaves_the_line_unchanged(pool: PgPool) {
  let shopper = user(&pool, "shopper@example.com").await;
  let tee = product(&pool, "Oxford Tee", 2500, 5).await;

  let (line, created) = cart_service::add_item(&pool, shopper.id, tee, 3).await.unwrap();
  assert!(created);
  assert_eq!(line.quantity, 3);

  let message = assert_validation(cart_service::add_item(&pool, shopper.id, tee, 3).await);
  assert_eq!(message, "Cannot add 3 more units. Only 2 more units available.");

  let cart = cart_service::get_cart(&pool, shopper.id).await.unwrap();
  assert_eq!(cart.items.len(), 1);
  assert_eq!(cart.items[0].item.quantity, 3);

  let (line, created) = cart_service::add_item(&pool, shopper.id, tee, 2).await.unwrap();
  assert!(!created);
  assert_eq!(line.quantity, 5);
}

#[sqlx::test(migrations = "./migrations")]
async fn checkout_takes_stock_and_empties_the_cart(pool: PgPool) {
  let shopper = user(&pool, "shopper@example.com").await;
  let tee = product(&pool, "Oxford Tee", 2500, 5).await;
  let cap = product(&pool, "Wool Cap", 1200, 2).await;
  cart_service::add_item(&pool, shopper.id, tee, 2).await.unwrap();
  cart_service::add_item(&pool, shopper.id, cap, 1).await.unwrap();

  let placed = order_service::place_order(&pool, shopper.id).await.unwrap();
  assert_eq!(placed.order.status, OrderStatus::Pending);
  assert_eq!(placed.order.total_cents, 2 * 2500 + 1200);
  assert_eq!(placed.order_items.len(), 2);

  assert_eq!(inventory(&pool, tee).await, 3);
  assert_eq!(inventory(&pool, cap).await, 1);
  assert!(cart_service::get_cart(&pool, shopper.id).await.unwrap().items.is_empty());

  let message = assert_validation(order_service::place_order(&pool, shopper.id).await);
  assert_eq!(message, "Cart is empty");
}

#[sqlx::test(migrations = "./migrations")]
async fn cancelling_restores_stock_once(pool: PgPool) {
  let shopper = user(&pool, "shopper@example.com").await;
  let tee = product(&pool, "Oxford Tee", 2500, 4).await;
  cart_service::add_item(&pool, shopper.id, tee, 3).await.unwrap();
  let order_id = order_service::place_order(&pool, shopper.id).await.unwrap().order.id;
  assert_eq!(inventory(&pool, tee).await, 1);

  let cancelled = order_service::cancel(&pool, shopper.id, order_id).await.unwrap();
  assert_eq!(cancelled.status, OrderStatus::Cancelled);
  assert_eq!(inventory(&pool, tee).await, 4);

  let message = assert_validation(order_service::cancel(&pool, shopper.id, order_id).await);
  assert_eq!(message, "Cannot cancel order with status \"CANCELLED\"");
  assert_eq!(inventory(&pool, tee).await, 4);
}

#[sqlx::test(migrations = "./migrations")]
async fn reopening_a_cancelled_order_needs_stock(pool: PgPool) {
  let shopper = user(&pool, "shopper@example.com").await;
  let tee = product(&pool, "Oxford Tee", 2500, 2).await;
  cart_service::add_item(&pool, shopper.id, tee, 2).await.unwrap();
  let order_id = order_service::place_order(&pool, shopper.id).await.unwrap().order.id;
  order_service::cancel(&pool, shopper.id, order_id).await.unwrap();

  catalog_service::update(
    &pool,
    tee,
    ProductChanges {
      inventory: Some(0),
      ..Default::default()
    },
  )
  .await
  .unwrap();

  let message = assert_validation(order_service::set_status(&pool, order_id, OrderStatus::Pending).await);
  assert!(message.contains("Oxford Tee"), "{}", message);

  let order = order_service::get(&pool, order_id).await.unwrap().expect("order exists");
  assert_eq!(order.order.status, OrderStatus::Cancelled);
  assert_eq!(inventory(&pool, tee).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn only_shipped_orders_can_be_fulfilled(pool: PgPool) {
  let shopper = user(&pool, "shopper@example.com").await;
  let tee = product(&pool, "Oxford Tee", 2500, 2).await;
  cart_service::add_item(&pool, shopper.id, tee, 1).await.unwrap();
  let order_id = order_service::place_order(&pool, shopper.id).await.unwrap().order.id;

  let message = assert_validation(order_service::fulfill(&pool, shopper.id, order_id).await);
  assert!(message.starts_with("Cannot change order status from PENDING to DELIVERED"), "{}", message);

  order_service::set_status(&pool, order_id, OrderStatus::Shipped).await.unwrap();
  let delivered = order_service::fulfill(&pool, shopper.id, order_id).await.unwrap();
  assert_eq!(delivered.status, OrderStatus::Delivered);
}

#[sqlx::test(migrations = "./migrations")]
async fn emails_are_unique_regardless_of_case(pool: PgPool) {
  user(&pool, "alice@example.com").await;
  let bob = user(&pool, "bob@example.com").await;

  let message = assert_validation(
    user_service::update(
      &pool,
      bob.id,
      UserChanges {
        email: Some("Alice@Example.COM".to_string()),
        ..Default::default()
      },
    )
    .await,
  );
  assert_eq!(message, "User with this email already exists");

  let duplicate = NewUser {
    email: "ALICE@EXAMPLE.COM".to_string(),
    ..bob_like("ignored@example.com")
  };
  let message = assert_validation(user_service::create(&pool, duplicate).await);
  assert_eq!(message, "User with this email already exists");

  let found = user_service::find_by_email(&pool, "ALICE@example.com").await.unwrap();
  assert_eq!(found.map(|u| u.email), Some("alice@example.com".to_string()));
}

fn bob_like(email: &str) -> NewUser {
  NewUser {
    email: email.to_string(),
    password_hash: "not-a-real-hash".to_string(),
    first_name: "Bob".to_string(),
    last_name: "Shopper".to_string(),
    address: None,
    city: None,
    country: None,
    role: Role::User,
  }
}

/// Image host whose upload succeeds but deletes the product first, so the
/// following database write fails. Records every destroy call.
struct VanishingProductHost {
  pool: PgPool,
  product_id: Uuid,
  destroyed: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageHost for VanishingProductHost {
  async fn upload(&self, folder: &str, image: ImageUpload) -> AppResult<HostedImage> {
    sqlx::query("DELETE FROM products WHERE id = $1")
      .bind(self.product_id)
      .execute(&self.pool)
      .await?;
    let public_id = format!("{}/{}", folder, image.filename.trim_end_matches(".png"));
    Ok(HostedImage {
      url: format!("https://res.cloudinary.com/demo/image/upload/{}.png", public_id),
      public_id,
    })
  }

  async fn destroy(&self, public_id: &str) -> AppResult<bool> {
    self.destroyed.lock().unwrap().push(public_id.to_string());
    Ok(true)
  }
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_image_writes_discard_the_hosted_copy(pool: PgPool) {
  let tee = product(&pool, "Oxford Tee", 2500, 2).await;
  let host = VanishingProductHost {
    pool: pool.clone(),
    product_id: tee,
    destroyed: Mutex::new(Vec::new()),
  };
  let upload = ImageUpload {
    filename: "tee.png".to_string(),
    content_type: Some("image/png".to_string()),
    bytes: vec![0x89, b'P', b'N', b'G'],
  };

  let result = image_service::upload_one(&pool, &host, tee, upload).await;
  assert!(result.is_err(), "{:?}", result);
  assert_eq!(
    *host.destroyed.lock().unwrap(),
    vec!["threadscape/products/tee".to_string()]
  );
}
