// server/src/web/handlers/mod.rs

pub mod auth_handlers;
pub mod cart_handlers;
pub mod health_handlers;
pub mod order_handlers;
pub mod product_handlers;
pub mod product_image_handlers;
pub mod user_handlers;
