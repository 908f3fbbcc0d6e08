// server/src/web/routes.rs

use actix_web::{error, web, HttpRequest};

use crate::errors::AppError;
use crate::web::handlers::{
  auth_handlers, cart_handlers, health_handlers, order_handlers, product_handlers, product_image_handlers,
  user_handlers,
};

/// Extractor failures answer with the same envelope as handler errors.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
      let message = match &err {
        error::JsonPayloadError::ContentType => "Content type must be application/json".to_string(),
        other => other.to_string(),
      };
      error::Error::from(AppError::Validation(message))
    }))
    .app_data(
      web::PathConfig::default()
        .error_handler(|_err, _req| error::Error::from(AppError::Validation("Invalid ID format".to_string()))),
    )
    .app_data(
      web::QueryConfig::default()
        .error_handler(|err, _req| error::Error::from(AppError::Validation(format!("Invalid query: {}", err)))),
    );
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  extractor_configs(cfg);

  cfg.service(
    web::scope("/api")
      .route("/test", web::get().to(health_handlers::health_handler))
      // Authentication
      .service(
        web::scope("/auth")
          .route("/login", web::post().to(auth_handlers::login_handler))
          .route("/logout", web::post().to(auth_handlers::logout_handler))
          .route("/me", web::get().to(auth_handlers::me_handler)),
      )
      // Users; literal segments are registered before `{id}`
      .service(
        web::scope("/users")
          .route("/change-password", web::post().to(user_handlers::change_password_handler))
          .route("", web::post().to(user_handlers::register_handler))
          .route("", web::get().to(user_handlers::list_users_handler))
          .route("/{id}", web::get().to(user_handlers::get_user_handler))
          .route("/{id}", web::put().to(user_handlers::update_user_handler))
          .route("/{id}", web::delete().to(user_handlers::delete_user_handler)),
      )
      // Catalog
      .service(
        web::scope("/products")
          .route("", web::get().to(product_handlers::list_products_handler))
          .route("", web::post().to(product_handlers::create_product_handler))
          .route("/featured", web::get().to(product_handlers::featured_products_handler))
          .route("/category/{category}", web::get().to(product_handlers::products_by_category_handler))
          .route("/{id}", web::get().to(product_handlers::get_product_handler))
          .route("/{id}", web::put().to(product_handlers::update_product_handler))
          .route("/{id}/discontinue", web::put().to(product_handlers::discontinue_product_handler))
          .route("/{id}/restore", web::put().to(product_handlers::restore_product_handler))
          .route("/{id}/ratings", web::post().to(product_handlers::rate_product_handler)),
      )
      .service(
        web::scope("/product-images")
          .route("/{product_id}", web::post().to(product_image_handlers::upload_image_handler))
          .route("/{product_id}/multiple", web::post().to(product_image_handlers::upload_images_handler))
          .route("/{id}", web::delete().to(product_image_handlers::delete_image_handler))
          .route("/{id}/main", web::put().to(product_image_handlers::set_main_image_handler)),
      )
      // Cart
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart_handlers::get_cart_handler))
          .route("", web::post().to(cart_handlers::add_to_cart_handler))
          .route("", web::delete().to(cart_handlers::clear_cart_handler))
          .route("/{id}", web::put().to(cart_handlers::update_cart_item_handler))
          .route("/{id}", web::delete().to(cart_handlers::remove_cart_item_handler)),
      )
      // Orders
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("/admin/all", web::get().to(order_handlers::list_all_orders_handler))
          .route("/{id}", web::get().to(order_handlers::get_order_handler))
          .route("/{id}/cancel", web::put().to(order_handlers::cancel_order_handler))
          .route("/{id}/fulfill", web::put().to(order_handlers::fulfill_order_handler))
          .route("/{id}/update-status", web::put().to(order_handlers::update_order_status_handler))
          .route("/{id}/status", web::put().to(order_handlers::set_order_status_handler)),
      ),
  );
}
