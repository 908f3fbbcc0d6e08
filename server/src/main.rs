// server/src/main.rs

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware::DefaultHeaders, web, App, HttpServer};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use threadscape::config::{AppConfig, LogFormat};
use threadscape::state::AppState;
use threadscape::web::configure_app_routes;
use threadscape::{db, seed};

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration

  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

fn cors(frontend_url: Option<&str>) -> Cors {
  let cors = Cors::default()
    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
    .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
    .supports_credentials()
    .max_age(3600);
  match frontend_url {
    Some(origin) => cors.allowed_origin(origin),
    None => cors.allowed_origin_fn(|origin, _req| {
      origin
        .to_str()
        .map(|o| o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1"))
        .unwrap_or(false)
    }),
  }
}

fn security_headers(frontend_url: Option<&str>) -> DefaultHeaders {
  let connect_src = match frontend_url {
    Some(url) => format!("'self' {}", url),
    None => "'self'".to_string(),
  };
  let csp = format!(
    "default-src 'self'; img-src 'self' data: https:; \
     connect-src {}; frame-ancestors 'none'",
    connect_src
  );
  DefaultHeaders::new()
    .add((header::CONTENT_SECURITY_POLICY, csp))
    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
    .add((header::X_FRAME_OPTIONS, "DENY"))
    .add((header::REFERRER_POLICY, "no-referrer"))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  // Loaded before tracing is installed so the log format is known.
  let app_config = Arc::new(AppConfig::from_env()?);
  init_tracing(app_config.log_format);
  tracing::info!(
    production = app_config.production,
    image_uploads = app_config.cloudinary.is_some(),
    "Application configuration loaded successfully."
  );

  tracing::info!("Starting Threadscape API server...");

  let db_pool = db::connect(&app_config).await?;
  if app_config.run_migrations {
    db::migrate(&db_pool).await?;
  }
  if app_config.seed_db {
    seed::seed(&db_pool).await?;
  }

  let app_state = AppState::new(db_pool, app_config.clone());
  let server_address = app_config.bind_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    let frontend_url = app_state.config.frontend_url.as_deref();
    App::new()
      .app_data(web::Data::new(app_state.clone()))
      .wrap(security_headers(frontend_url))
      .wrap(cors(frontend_url))
      .wrap(TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;

  tracing::info!("Server stopped.");
  Ok(())
}
