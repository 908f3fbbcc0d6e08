// server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;

/// Credentials for the hosted image CDN. Absent when uploads are disabled.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
  pub cloud_name: String,
  pub api_key: String,
  pub api_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub db_max_connections: u32,

  pub jwt_secret: String,
  pub jwt_expiration_days: i64,
  /// `APP_ENV=production` turns on secure, cross-site session cookies.
  pub production: bool,
  pub frontend_url: Option<String>,

  pub cloudinary: Option<CloudinaryConfig>,

  pub run_migrations: bool,
  pub seed_db: bool,
  pub log_format: LogFormat,
}

fn optional_env(var_name: &str) -> Option<String> {
  env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

fn required_env(var_name: &str) -> Result<String> {
  optional_env(var_name).ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
}

fn parsed_env<T>(var_name: &str, default: T) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match optional_env(var_name) {
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", var_name, raw, e))),
    None => Ok(default),
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let server_host = optional_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parsed_env::<u16>("SERVER_PORT", 5000)?;
    let database_url = required_env("DATABASE_URL")?;
    let db_max_connections = parsed_env::<u32>("DB_MAX_CONNECTIONS", 10)?;

    let jwt_secret = required_env("JWT_SECRET")?;
    let jwt_expiration_days = parsed_env::<i64>("JWT_EXPIRATION_DAYS", 30)?;
    if jwt_expiration_days <= 0 {
      return Err(AppError::Config("JWT_EXPIRATION_DAYS must be positive".to_string()));
    }

    let production = optional_env("APP_ENV")
      .map(|v| v.eq_ignore_ascii_case("production"))
      .unwrap_or(false);
    let frontend_url = optional_env("FRONTEND_URL");

    let cloudinary = match (
      optional_env("CLOUDINARY_CLOUD_NAME"),
      optional_env("CLOUDINARY_API_KEY"),
      optional_env("CLOUDINARY_API_SECRET"),
    ) {
      (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
        cloud_name,
        api_key,
        api_secret,
      }),
      (None, None, None) => None,
      _ => {
        return Err(AppError::Config(
          "CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET must be set together".to_string(),
        ))
      }
    };

    let run_migrations = parsed_env::<bool>("RUN_MIGRATIONS", true)?;
    let seed_db = parsed_env::<bool>("SEED_DB", false)?;
    let log_format = match optional_env("LOG_FORMAT").as_deref() {
      Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
      _ => LogFormat::Pretty,
    };

    Ok(Self {
      server_host,
      server_port,
      database_url,
      db_max_connections,
      jwt_secret,
      jwt_expiration_days,
      production,
      frontend_url,
      cloudinary,
      run_migrations,
      seed_db,
      log_format,
    })
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use std::io;
  use std::sync::{Arc, Mutex};

  const VARS: &[&str] = &[
    "SERVER_HOST",
    "SERVER_PORT",
    "DATABASE_URL",
    "DB_MAX_CONNECTIONS",
    "JWT_SECRET",
    "JWT_EXPIRATION_DAYS",
    "APP_ENV",
    "FRONTEND_URL",
    "CLOUDINARY_CLOUD_NAME",
    "CLOUDINARY_API_KEY",
    "CLOUDINARY_API_SECRET",
    "RUN_MIGRATIONS",
    "SEED_DB",
    "LOG_FORMAT",
  ];

  fn reset_env() {
    for var in VARS {
      env::remove_var(var);
    }
    env::set_var("DATABASE_URL", "postgres://localhost/threadscape_test");
    env::set_var("JWT_SECRET", "test-secret");
  }

  #[test]
  #[serial]
  fn defaults_apply_when_only_required_vars_are_set() {
    reset_env();
    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.bind_address(), "127.0.0.1:5000");
    assert_eq!(cfg.jwt_expiration_days, 30);
    assert_eq!(cfg.db_max_connections, 10);
    assert!(!cfg.production);
    assert!(cfg.run_migrations);
    assert!(!cfg.seed_db);
    assert!(cfg.cloudinary.is_none());
    assert_eq!(cfg.log_format, LogFormat::Pretty);
  }

  #[test]
  #[serial]
  fn missing_jwt_secret_is_a_config_error() {
    reset_env();
    env::remove_var("JWT_SECRET");
    match AppConfig::from_env() {
      Err(AppError::Config(msg)) => assert!(msg.contains("JWT_SECRET")),
      other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }
  }

  #[test]
  #[serial]
  fn invalid_port_names_the_variable() {
    reset_env();
    env::set_var("SERVER_PORT", "eighty");
    match AppConfig::from_env() {
      Err(AppError::Config(msg)) => assert!(msg.contains("SERVER_PORT")),
      other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }
  }

  #[test]
  #[serial]
  fn partial_cloudinary_credentials_are_rejected() {
    reset_env();
    env::set_var("CLOUDINARY_CLOUD_NAME", "demo");
    assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));

    env::set_var("CLOUDINARY_API_KEY", "key");
    env::set_var("CLOUDINARY_API_SECRET", "secret");
    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.cloudinary.unwrap().cloud_name, "demo");
  }

  struct Capture(Arc<Mutex<Vec<u8>>>);

  impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  #[test]
  #[serial]
  fn loading_emits_no_log_events() {
    reset_env();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::TRACE)
      .with_writer(move || Capture(sink.clone()))
      .finish();

    tracing::subscriber::with_default(subscriber, || AppConfig::from_env().unwrap());
    assert!(captured.lock().unwrap().is_empty());
  }

  #[test]
  #[serial]
  fn production_and_json_logging_are_detected() {
    reset_env();
    env::set_var("APP_ENV", "Production");
    env::set_var("LOG_FORMAT", "json");
    let cfg = AppConfig::from_env().unwrap();
    assert!(cfg.production);
    assert_eq!(cfg.log_format, LogFormat::Json);
  }
}
