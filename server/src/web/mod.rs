// server/src/web/mod.rs

pub mod handlers;
pub mod pagination;
pub mod response;
pub mod routes;
pub mod session;

pub use routes::configure_app_routes;
