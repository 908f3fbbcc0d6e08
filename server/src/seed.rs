// server/src/seed.rs

//! Demo data for local development. Wipes every storefront table and loads a
//! small catalog, one admin and a handful of customers.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{Category, Role};
use crate::services::auth_service;
use crate::services::catalog_service;

pub const ADMIN_EMAIL: &str = "admin@threadscape.com";
const ADMIN_PASSWORD: &str = "Admin123!";
const CUSTOMER_PASSWORD: &str = "Password123!";

struct SeedUser {
  email: &'static str,
  first_name: &'static str,
  last_name: &'static str,
  address: &'static str,
  city: &'static str,
  role: Role,
}

struct SeedProduct {
  name: &'static str,
  description: &'static str,
  price_cents: i64,
  category: Category,
  inventory: i32,
  /// First entry becomes the main image.
  images: [&'static str; 2],
}

const USERS: &[SeedUser] = &[
  SeedUser {
    email: ADMIN_EMAIL,
    first_name: "Admin",
    last_name: "User",
    address: "123 Admin Street",
    city: "New York",
    role: Role::Admin,
  },
  SeedUser {
    email: "john@example.com",
    first_name: "John",
    last_name: "Doe",
    address: "456 Park Avenue",
    city: "Boston",
    role: Role::User,
  },
  SeedUser {
    email: "jane@example.com",
    first_name: "Jane",
    last_name: "Smith",
    address: "789 Oak Road",
    city: "San Francisco",
    role: Role::User,
  },
  SeedUser {
    email: "mike@example.com",
    first_name: "Mike",
    last_name: "Johnson",
    address: "101 Pine Street",
    city: "Chicago",
    role: Role::User,
  },
];

const UNSPLASH: &str = "https://images.unsplash.com/";

const PRODUCTS: &[SeedProduct] = &[
  SeedProduct {
    name: "Classic Cotton T-Shirt",
    description: "A comfortable everyday cotton t-shirt with a relaxed fit. Made from 100% organic cotton.",
    price_cents: 2499,
    category: Category::Mens,
    inventory: 100,
    images: ["photo-1521572163474-6864f9cf17ab", "photo-1583743814966-8936f5b7be1a"],
  },
  SeedProduct {
    name: "Slim Fit Jeans",
    description: "Modern slim fit jeans in a versatile dark wash. Perfect for casual and semi-formal occasions.",
    price_cents: 5999,
    category: Category::Mens,
    inventory: 75,
    images: ["photo-1541099649105-f69ad21f3246", "photo-1542272604-787c3835535d"],
  },
  SeedProduct {
    name: "Oxford Button-Down Shirt",
    description: "A timeless Oxford shirt made from premium cotton. Features a button-down collar and relaxed fit.",
    price_cents: 4999,
    category: Category::Mens,
    inventory: 60,
    images: ["photo-1596755094514-f87e34085b2c", "photo-1589310243389-96a5483213a8"],
  },
  SeedProduct {
    name: "Rain Jacket",
    description: "A lightweight waterproof shell with a packable hood and taped seams for wet commutes.",
    price_cents: 8999,
    category: Category::Mens,
    inventory: 40,
    images: ["photo-1520175128829-4ccea1389ba6", "photo-1554114892-d507c5c3c4e5"],
  },
  SeedProduct {
    name: "Wool Peacoat",
    description: "A double-breasted peacoat in heavy wool with a warm quilted lining.",
    price_cents: 19999,
    category: Category::Mens,
    inventory: 30,
    images: ["photo-1556726307-08ba1c3e1f9a", "photo-1580657018950-c7f7d6a6d990"],
  },
  SeedProduct {
    name: "Floral Summer Dress",
    description: "A breezy floral dress with a flattering waist tie, made for warm afternoons.",
    price_cents: 7999,
    category: Category::Womens,
    inventory: 50,
    images: ["photo-1612722432474-b971cdcea546", "photo-1618554754947-e01d5ce3c549"],
  },
  SeedProduct {
    name: "High-Waisted Skinny Jeans",
    description: "Stretch denim skinny jeans with a high rise and a clean dark finish.",
    price_cents: 6499,
    category: Category::Womens,
    inventory: 85,
    images: ["photo-1541099649105-f69ad21f3246", "photo-1475178626620-a4d074967452"],
  },
  SeedProduct {
    name: "Cashmere Sweater",
    description: "A soft pure cashmere crew-neck sweater that layers easily through the colder months.",
    price_cents: 12999,
    category: Category::Womens,
    inventory: 40,
    images: ["photo-1620799140188-3b2a02fd9a77", "photo-1618354691373-d851c5c3a990"],
  },
  SeedProduct {
    name: "Silk Blouse",
    description: "A fluid silk blouse with a relaxed drape that works from the office to dinner.",
    price_cents: 8999,
    category: Category::Womens,
    inventory: 55,
    images: ["photo-1605763240000-7e93b172d754", "photo-1552902865-b72c031ac5ea"],
  },
  SeedProduct {
    name: "Yoga Leggings",
    description: "High-waisted leggings in a squat-proof stretch fabric with a hidden pocket.",
    price_cents: 4999,
    category: Category::Womens,
    inventory: 100,
    images: ["photo-1506629082955-511b1aa562c8", "photo-1545442150-d3b0ac351690"],
  },
  SeedProduct {
    name: "Leather Belt",
    description: "A high-quality leather belt with a classic buckle. Versatile and durable for everyday wear.",
    price_cents: 3499,
    category: Category::Accessories,
    inventory: 120,
    images: ["photo-1624624717741-70ea3d4376a8", "photo-1611094616687-f8f1ac8c9fd3"],
  },
  SeedProduct {
    name: "Knitted Beanie",
    description: "A warm knitted beanie for cold winter days. Made from a soft wool blend for maximum comfort.",
    price_cents: 1999,
    category: Category::Accessories,
    inventory: 90,
    images: ["photo-1576871337622-98d48d1cf531", "photo-1510598155053-d5c97353fedc"],
  },
  SeedProduct {
    name: "Silk Scarf",
    description: "A luxurious silk scarf with an elegant pattern. Adds a touch of sophistication to any outfit.",
    price_cents: 4499,
    category: Category::Accessories,
    inventory: 65,
    images: ["photo-1584187839132-aaad17f181a8", "photo-1601370552761-d129028bd833"],
  },
  SeedProduct {
    name: "Aviator Sunglasses",
    description: "Classic aviator sunglasses with UV protection. Timeless style for any face shape.",
    price_cents: 8999,
    category: Category::Accessories,
    inventory: 80,
    images: ["photo-1473496169904-658ba7c44d8a", "photo-1511499767150-a48a237f0083"],
  },
  SeedProduct {
    name: "Leather Wallet",
    description: "A premium leather wallet with multiple card slots and a bill compartment. Slim profile for pocket comfort.",
    price_cents: 4999,
    category: Category::Accessories,
    inventory: 100,
    images: ["photo-1627123424574-724758594e93", "photo-1559694097-9180c97f661d"],
  },
];

/// (customer index, product index, stars). Customers are `USERS[1..]`.
const RATINGS: &[(usize, usize, i16)] = &[
  (0, 0, 5),
  (1, 0, 4),
  (2, 0, 4),
  (0, 5, 5),
  (1, 7, 3),
  (2, 10, 4),
  (0, 12, 2),
  (1, 13, 5),
];

const WIPE_ORDER: [&str; 7] = [
  "cart_items",
  "order_items",
  "orders",
  "ratings",
  "product_images",
  "products",
  "users",
];

async fn wipe(conn: &mut PgConnection) -> Result<()> {
  for table in WIPE_ORDER {
    sqlx::query(&format!("DELETE FROM {}", table))
      .execute(&mut *conn)
      .await
      .with_context(|| format!("Failed to clear table '{}'", table))?;
  }
  Ok(())
}

async fn insert_users(conn: &mut PgConnection) -> Result<Vec<Uuid>> {
  let admin_hash = auth_service::hash_password(ADMIN_PASSWORD).context("Failed to hash admin password")?;
  let customer_hash = auth_service::hash_password(CUSTOMER_PASSWORD).context("Failed to hash customer password")?;

  let mut ids = Vec::with_capacity(USERS.len());
  for user in USERS {
    let id = Uuid::new_v4();
    let hash = if user.role == Role::Admin { &admin_hash } else { &customer_hash };
    sqlx::query(
      "INSERT INTO users (id, email, password_hash, first_name, last_name, address, city, country, role) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, 'USA', $8)",
    )
    .bind(id)
    .bind(user.email)
    .bind(hash)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.address)
    .bind(user.city)
    .bind(user.role)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to insert user '{}'", user.email))?;
    ids.push(id);
  }
  Ok(ids)
}

async fn insert_products(conn: &mut PgConnection) -> Result<Vec<Uuid>> {
  let mut ids = Vec::with_capacity(PRODUCTS.len());
  for product in PRODUCTS {
    let id = Uuid::new_v4();
    sqlx::query(
      "INSERT INTO products (id, name, description, price_cents, category, inventory) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(product.name)
    .bind(product.description)
    .bind(product.price_cents)
    .bind(product.category)
    .bind(product.inventory)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to insert product '{}'", product.name))?;

    for (position, photo) in product.images.iter().enumerate() {
      let url = format!("{}{}", UNSPLASH, photo);
      catalog_service::insert_image(&mut *conn, id, &url, None, position == 0)
        .await
        .with_context(|| format!("Failed to insert image for '{}'", product.name))?;
    }
    ids.push(id);
  }
  Ok(ids)
}

async fn insert_ratings(conn: &mut PgConnection, customers: &[Uuid], products: &[Uuid]) -> Result<usize> {
  let mut inserted = 0;
  for &(customer, product, value) in RATINGS {
    let (Some(user_id), Some(product_id)) = (customers.get(customer), products.get(product)) else {
      continue;
    };
    sqlx::query("INSERT INTO ratings (id, user_id, product_id, value) VALUES ($1, $2, $3, $4)")
      .bind(Uuid::new_v4())
      .bind(user_id)
      .bind(product_id)
      .bind(value)
      .execute(&mut *conn)
      .await
      .context("Failed to insert rating")?;
    inserted += 1;
  }
  Ok(inserted)
}

/// Replaces the database contents with the demo data set in one transaction.
#[instrument(name = "seed::seed", skip(pool))]
pub async fn seed(pool: &PgPool) -> Result<()> {
  let mut tx = pool.begin().await.context("Failed to open seed transaction")?;

  wipe(&mut *tx).await?;
  let user_ids = insert_users(&mut *tx).await?;
  let product_ids = insert_products(&mut *tx).await?;
  let ratings = insert_ratings(&mut *tx, &user_ids[1..], &product_ids).await?;

  tx.commit().await.context("Failed to commit seed transaction")?;
  info!(
    users = user_ids.len(),
    products = product_ids.len(),
    ratings,
    "Database seeded."
  );
  Ok(())
}
