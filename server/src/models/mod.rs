// server/src/models/mod.rs

//! Row types for the storefront tables and the enums stored alongside them.

pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_image;
pub mod rating;
pub mod user;

pub use cart_item::CartItem;
pub use order::{Order, OrderStatus};
pub use order_item::OrderItem;
pub use product::{Category, Product};
pub use product_image::ProductImage;
pub use rating::Rating;
pub use user::{Role, User};
