// server/src/services/mod.rs

pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod image_host;
pub mod image_service;
pub mod order_service;
pub mod user_service;
