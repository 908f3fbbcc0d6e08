// server/src/services/image_service.rs

use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::ProductImage;
use crate::services::catalog_service::{self, insert_image};
use crate::services::image_host::{self, HostedImage, ImageHost, ImageUpload, PRODUCT_FOLDER};

pub const MAX_IMAGES_PER_UPLOAD: usize = 10;

const IMAGE_COLUMNS: &str = "id, product_id, url, public_id, is_main, created_at";

/// Rejects files the CDN folder does not accept.
pub fn check_upload(upload: &ImageUpload) -> AppResult<()> {
  if upload.bytes.is_empty() {
    return Err(AppError::Validation("No image file provided".to_string()));
  }
  if upload.bytes.len() > image_host::MAX_IMAGE_BYTES {
    return Err(AppError::Validation("Image exceeds the 10MB size limit".to_string()));
  }
  if !image_host::is_allowed_format(&upload.filename, upload.content_type.as_deref()) {
    return Err(AppError::Validation(format!(
      "Unsupported image format. Allowed formats: {}",
      image_host::ALLOWED_FORMATS.join(", ")
    )));
  }
  Ok(())
}

async fn require_product(pool: &PgPool, product_id: Uuid) -> AppResult<()> {
  match catalog_service::find_by_id(pool, product_id).await? {
    Some(_) => Ok(()),
    None => Err(AppError::NotFound("Product not found".to_string())),
  }
}

/// Locks the product's image set and reports whether it is empty.
async fn has_no_images(conn: &mut PgConnection, product_id: Uuid) -> AppResult<bool> {
  sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
    .bind(product_id)
    .execute(&mut *conn)
    .await?;
  let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_images WHERE product_id = $1")
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;
  Ok(count == 0)
}

async fn find_image(pool: &PgPool, image_id: Uuid) -> AppResult<ProductImage> {
  let sql = format!("SELECT {} FROM product_images WHERE id = $1", IMAGE_COLUMNS);
  sqlx::query_as::<_, ProductImage>(&sql)
    .bind(image_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Image not found".to_string()))
}

/// Uploads one image; it becomes main iff the product had none.
#[instrument(name = "image_service::upload_one", skip(pool, host, upload), fields(filename = %upload.filename))]
pub async fn upload_one(
  pool: &PgPool,
  host: &dyn ImageHost,
  product_id: Uuid,
  upload: ImageUpload,
) -> AppResult<ProductImage> {
  require_product(pool, product_id).await?;
  check_upload(&upload)?;

  let hosted = host.upload(PRODUCT_FOLDER, upload).await?;
  let image = store_hosted(pool, host, product_id, std::slice::from_ref(&hosted))
    .await?
    .pop()
    .ok_or_else(|| AppError::Internal("Uploaded image was not stored".to_string()))?;

  info!(image_id = %image.id, is_main = image.is_main, "Product image stored.");
  Ok(image)
}

/// Uploads a batch; the first becomes main iff the product had none.
/// Returns the stored images and the id of the main image, if one was assigned.
#[instrument(name = "image_service::upload_many", skip(pool, host, uploads), fields(files = uploads.len()))]
pub async fn upload_many(
  pool: &PgPool,
  host: &dyn ImageHost,
  product_id: Uuid,
  uploads: Vec<ImageUpload>,
) -> AppResult<(Vec<ProductImage>, Option<Uuid>)> {
  if uploads.is_empty() {
    return Err(AppError::Validation("No image files provided".to_string()));
  }
  if uploads.len() > MAX_IMAGES_PER_UPLOAD {
    return Err(AppError::Validation(format!(
      "At most {} images can be uploaded at once",
      MAX_IMAGES_PER_UPLOAD
    )));
  }
  require_product(pool, product_id).await?;
  for upload in &uploads {
    check_upload(upload)?;
  }

  let mut hosted: Vec<HostedImage> = Vec::with_capacity(uploads.len());
  for upload in uploads {
    match host.upload(PRODUCT_FOLDER, upload).await {
      Ok(image) => hosted.push(image),
      Err(e) => {
        discard_hosted(host, &hosted).await;
        return Err(e);
      }
    }
  }

  let images = store_hosted(pool, host, product_id, &hosted).await?;
  let main_image_id = images.iter().find(|img| img.is_main).map(|img| img.id);
  info!(count = images.len(), ?main_image_id, "Product images stored.");
  Ok((images, main_image_id))
}

/// Records already-hosted images for the product in one transaction. The first
/// becomes main iff the product had none.
async fn insert_hosted(pool: &PgPool, product_id: Uuid, hosted: &[HostedImage]) -> AppResult<Vec<ProductImage>> {
  let mut tx = pool.begin().await?;
  let first_is_main = has_no_images(&mut *tx, product_id).await?;
  let mut images = Vec::with_capacity(hosted.len());
  for (i, image) in hosted.iter().enumerate() {
    let is_main = first_is_main && i == 0;
    images.push(insert_image(&mut *tx, product_id, &image.url, Some(&image.public_id), is_main).await?);
  }
  tx.commit().await?;
  Ok(images)
}

/// As `insert_hosted`, but a failed write removes the images from the CDN again.
async fn store_hosted(
  pool: &PgPool,
  host: &dyn ImageHost,
  product_id: Uuid,
  hosted: &[HostedImage],
) -> AppResult<Vec<ProductImage>> {
  match insert_hosted(pool, product_id, hosted).await {
    Ok(images) => Ok(images),
    Err(e) => {
      warn!(%product_id, error = %e, "Storing image records failed; discarding hosted copies.");
      discard_hosted(host, hosted).await;
      Err(e)
    }
  }
}

async fn discard_hosted(host: &dyn ImageHost, hosted: &[HostedImage]) {
  for image in hosted {
    if let Err(e) = host.destroy(&image.public_id).await {
      warn!(public_id = %image.public_id, error = %e, "Could not discard an uploaded image.");
    }
  }
}

/// Removes the image from the CDN (best effort) and the database, promoting
/// another image of the same product if the main one was deleted.
#[instrument(name = "image_service::delete", skip(pool, host))]
pub async fn delete(pool: &PgPool, host: &dyn ImageHost, image_id: Uuid) -> AppResult<()> {
  let image = find_image(pool, image_id).await?;

  let public_id = image
    .public_id
    .clone()
    .or_else(|| image_host::public_id_from_url(&image.url));
  if let Some(public_id) = public_id {
    match host.destroy(&public_id).await {
      Ok(true) => {}
      Ok(false) => warn!(%public_id, "CDN reported nothing to delete."),
      Err(e) => warn!(%public_id, error = %e, "CDN delete failed; removing the database record anyway."),
    }
  }

  let mut tx = pool.begin().await?;
  sqlx::query("DELETE FROM product_images WHERE id = $1")
    .bind(image_id)
    .execute(&mut *tx)
    .await?;
  if image.is_main {
    sqlx::query(
      "UPDATE product_images SET is_main = TRUE WHERE id = \
       (SELECT id FROM product_images WHERE product_id = $1 ORDER BY created_at ASC LIMIT 1)",
    )
    .bind(image.product_id)
    .execute(&mut *tx)
    .await?;
  }
  tx.commit().await?;

  info!(product_id = %image.product_id, was_main = image.is_main, "Product image deleted.");
  Ok(())
}

#[instrument(name = "image_service::set_main", skip(pool))]
pub async fn set_main(pool: &PgPool, image_id: Uuid) -> AppResult<()> {
  let image = find_image(pool, image_id).await?;

  sqlx::query("UPDATE product_images SET is_main = (id = $1) WHERE product_id = $2")
    .bind(image_id)
    .bind(image.product_id)
    .execute(pool)
    .await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn upload(name: &str, size: usize) -> ImageUpload {
    ImageUpload {
      filename: name.into(),
      content_type: None,
      bytes: vec![0u8; size],
    }
  }

  #[test]
  fn uploads_are_checked_for_format_and_size() {
    assert!(check_upload(&upload("tee.png", 16)).is_ok());
    assert!(matches!(check_upload(&upload("tee.gif", 16)), Err(AppError::Validation(_))));
    assert!(matches!(check_upload(&upload("tee.png", 0)), Err(AppError::Validation(_))));
    assert!(matches!(
      check_upload(&upload("tee.jpg", image_host::MAX_IMAGE_BYTES + 1)),
      Err(AppError::Validation(_))
    ));
  }
}
