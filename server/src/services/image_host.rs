// server/src/services/image_host.rs

//! Hosted image storage. Product photos are pushed to Cloudinary; the
//! database only keeps the delivery URL and the CDN public id.

use crate::config::{AppConfig, CloudinaryConfig};
use crate::errors::{AppError, Result as AppResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const PRODUCT_FOLDER: &str = "threadscape/products";
pub const ALLOWED_FORMATS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Longest edge is limited to 1000px on upload.
const PRODUCT_TRANSFORMATION: &str = "c_limit,h_1000,w_1000";

#[derive(Debug, Clone)]
pub struct ImageUpload {
  pub filename: String,
  pub content_type: Option<String>,
  pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedImage {
  pub url: String,
  pub public_id: String,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
  async fn upload(&self, folder: &str, image: ImageUpload) -> AppResult<HostedImage>;

  /// Returns `Ok(false)` when the CDN reports nothing was removed.
  async fn destroy(&self, public_id: &str) -> AppResult<bool>;
}

pub fn from_config(config: &AppConfig) -> Arc<dyn ImageHost> {
  match &config.cloudinary {
    Some(cloudinary) => Arc::new(CloudinaryHost::new(cloudinary.clone())),
    None => {
      warn!("Cloudinary credentials not configured; product image uploads are disabled.");
      Arc::new(DisabledImageHost)
    }
  }
}

/// Lower-cased extension of `filename`, if any.
fn extension(filename: &str) -> Option<String> {
  filename
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .filter(|ext| !ext.is_empty())
}

/// Accepts jpg/jpeg/png/webp by file extension, falling back to the part's MIME type.
pub fn is_allowed_format(filename: &str, content_type: Option<&str>) -> bool {
  if let Some(ext) = extension(filename) {
    return ALLOWED_FORMATS.contains(&ext.as_str());
  }
  matches!(content_type, Some("image/jpeg" | "image/png" | "image/webp"))
}

/// Extracts the public id from a Cloudinary delivery URL, e.g.
/// `https://res.cloudinary.com/demo/image/upload/v1712/threadscape/products/abc.jpg`
/// yields `threadscape/products/abc`.
pub fn public_id_from_url(url: &str) -> Option<String> {
  let (_, after_upload) = url.split_once("/upload/")?;
  let mut segments = after_upload.split('/');
  let version = segments.next()?;
  let is_version = version.len() > 1 && version.starts_with('v') && version[1..].chars().all(|c| c.is_ascii_digit());
  if !is_version {
    return None;
  }
  let path = segments.collect::<Vec<_>>().join("/");
  let (id, _ext) = path.rsplit_once('.')?;
  if id.is_empty() {
    None
  } else {
    Some(id.to_string())
  }
}

/// Signature over the sorted request parameters, as Cloudinary's signed upload API expects.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
  let mut sorted: Vec<&(&str, String)> = params.iter().collect();
  sorted.sort_by(|a, b| a.0.cmp(b.0));
  let to_sign = sorted
    .iter()
    .map(|(k, v)| format!("{}={}", k, v))
    .collect::<Vec<_>>()
    .join("&");

  let mut hasher = Sha256::new();
  hasher.update(to_sign.as_bytes());
  hasher.update(api_secret.as_bytes());
  hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
  secure_url: String,
  public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
  result: String,
}

pub struct CloudinaryHost {
  config: CloudinaryConfig,
  client: reqwest::Client,
}

impl CloudinaryHost {
  pub fn new(config: CloudinaryConfig) -> Self {
    Self {
      config,
      client: reqwest::Client::new(),
    }
  }

  fn endpoint(&self, action: &str) -> String {
    format!(
      "https://api.cloudinary.com/v1_1/{}/image/{}",
      self.config.cloud_name, action
    )
  }

  fn signed_form(&self, params: Vec<(&'static str, String)>) -> Form {
    let signature = sign_params(&params, &self.config.api_secret);
    params
      .into_iter()
      .fold(Form::new(), |form, (k, v)| form.text(k, v))
      .text("api_key", self.config.api_key.clone())
      .text("signature", signature)
      .text("signature_algorithm", "sha256")
  }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
  #[instrument(name = "image_host::upload", skip(self, image), fields(filename = %image.filename, size = image.bytes.len()), err(Display))]
  async fn upload(&self, folder: &str, image: ImageUpload) -> AppResult<HostedImage> {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let form = self.signed_form(vec![
      ("folder", folder.to_string()),
      ("timestamp", timestamp),
      ("transformation", PRODUCT_TRANSFORMATION.to_string()),
    ]);

    let mut part = Part::bytes(image.bytes).file_name(image.filename);
    if let Some(content_type) = image.content_type.as_deref() {
      part = part
        .mime_str(content_type)
        .map_err(|e| AppError::Validation(format!("Invalid image content type: {}", e)))?;
    }

    let response = self
      .client
      .post(self.endpoint("upload"))
      .multipart(form.part("file", part))
      .send()
      .await
      .map_err(|e| AppError::ImageHost(e.to_string()))?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      warn!(%status, %body, "Cloudinary rejected the upload.");
      return Err(AppError::ImageHost(format!("upload failed with status {}", status)));
    }

    let uploaded: UploadResponse = response
      .json()
      .await
      .map_err(|e| AppError::ImageHost(format!("unreadable upload response: {}", e)))?;
    info!(public_id = %uploaded.public_id, "Image uploaded to Cloudinary.");
    Ok(HostedImage {
      url: uploaded.secure_url,
      public_id: uploaded.public_id,
    })
  }

  #[instrument(name = "image_host::destroy", skip(self), err(Display))]
  async fn destroy(&self, public_id: &str) -> AppResult<bool> {
    let form = self.signed_form(vec![
      ("public_id", public_id.to_string()),
      ("timestamp", chrono::Utc::now().timestamp().to_string()),
    ]);

    let response = self
      .client
      .post(self.endpoint("destroy"))
      .multipart(form)
      .send()
      .await
      .map_err(|e| AppError::ImageHost(e.to_string()))?;

    if !response.status().is_success() {
      return Err(AppError::ImageHost(format!(
        "destroy failed with status {}",
        response.status()
      )));
    }
    let destroyed: DestroyResponse = response
      .json()
      .await
      .map_err(|e| AppError::ImageHost(format!("unreadable destroy response: {}", e)))?;
    Ok(destroyed.result == "ok")
  }
}

/// Used when no CDN credentials are configured.
pub struct DisabledImageHost;

#[async_trait]
impl ImageHost for DisabledImageHost {
  async fn upload(&self, _folder: &str, _image: ImageUpload) -> AppResult<HostedImage> {
    Err(AppError::Config("Image hosting is not configured".to_string()))
  }

  async fn destroy(&self, _public_id: &str) -> AppResult<bool> {
    Ok(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn public_id_is_taken_from_versioned_delivery_urls() {
    let url = "https://res.cloudinary.com/demo/image/upload/v1712345678/threadscape/products/abc123.jpg";
    assert_eq!(public_id_from_url(url).as_deref(), Some("threadscape/products/abc123"));
  }

  #[test]
  fn foreign_urls_have_no_public_id() {
    assert_eq!(public_id_from_url("https://images.unsplash.com/photo-1521572163474"), None);
    assert_eq!(public_id_from_url("https://res.cloudinary.com/demo/image/upload/sample.jpg"), None);
  }

  #[test]
  fn allowed_formats_follow_extension_then_mime() {
    assert!(is_allowed_format("shirt.JPG", None));
    assert!(is_allowed_format("shirt.webp", Some("application/octet-stream")));
    assert!(!is_allowed_format("shirt.gif", Some("image/png")));
    assert!(is_allowed_format("blob", Some("image/png")));
    assert!(!is_allowed_format("blob", Some("image/gif")));
    assert!(!is_allowed_format("blob", None));
  }

  #[test]
  fn signature_is_order_independent() {
    let a = sign_params(&[("timestamp", "1".into()), ("folder", "f".into())], "s3cr3t");
    let b = sign_params(&[("folder", "f".into()), ("timestamp", "1".into())], "s3cr3t");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert_ne!(a, sign_params(&[("folder", "f".into()), ("timestamp", "1".into())], "other"));
  }

  #[actix_rt::test]
  async fn disabled_host_refuses_uploads() {
    let host = DisabledImageHost;
    let upload = ImageUpload {
      filename: "a.png".into(),
      content_type: Some("image/png".into()),
      bytes: vec![1, 2, 3],
    };
    assert!(matches!(host.upload(PRODUCT_FOLDER, upload).await, Err(AppError::Config(_))));
    assert!(!host.destroy("x").await.unwrap());
  }
}
