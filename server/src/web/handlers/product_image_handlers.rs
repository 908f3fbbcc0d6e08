// server/src/web/handlers/product_image_handlers.rs

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde_json::json;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::image_host::{ImageUpload, MAX_IMAGE_BYTES};
use crate::services::image_service::{self, MAX_IMAGES_PER_UPLOAD};
use crate::state::AppState;
use crate::web::response;
use crate::web::session::AdminUser;

fn multipart_error(e: impl std::fmt::Display) -> AppError {
  AppError::Validation(format!("Invalid multipart payload: {}", e))
}

/// Collects the file parts named `field_name`, at most `max_files` of them.
/// Other parts are drained and ignored.
async fn read_files(mut payload: Multipart, field_name: &str, max_files: usize) -> Result<Vec<ImageUpload>, AppError> {
  let mut uploads = Vec::new();

  while let Some(item) = payload.next().await {
    let mut field = item.map_err(multipart_error)?;
    let disposition = field.content_disposition().cloned();
    let name = disposition.as_ref().and_then(|cd| cd.get_name()).unwrap_or_default();
    let filename = disposition.as_ref().and_then(|cd| cd.get_filename()).map(str::to_string);

    let wanted = name == field_name && filename.is_some();
    if wanted && uploads.len() == max_files {
      return Err(AppError::Validation(format!(
        "Too many files. At most {} images can be uploaded at once",
        max_files
      )));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
      let chunk = chunk.map_err(multipart_error)?;
      if wanted {
        if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
          return Err(AppError::Validation("Image exceeds the 10MB size limit".to_string()));
        }
        bytes.extend_from_slice(&chunk);
      }
    }

    if let (true, Some(filename)) = (wanted, filename) {
      debug!(%filename, size = bytes.len(), "Received image part.");
      uploads.push(ImageUpload {
        filename,
        content_type: field.content_type().map(|m| m.essence_str().to_string()),
        bytes,
      });
    }
  }
  Ok(uploads)
}

#[instrument(name = "handler::upload_product_image", skip(app_state, _admin, payload), fields(product_id = %path))]
pub async fn upload_image_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
  payload: Multipart,
) -> Result<HttpResponse, AppError> {
  let upload = read_files(payload, "image", 1)
    .await?
    .pop()
    .ok_or_else(|| AppError::Validation("No image file provided".to_string()))?;

  let image = image_service::upload_one(&app_state.db_pool, app_state.images.as_ref(), path.into_inner(), upload).await?;
  Ok(response::created(json!({
    "message": "Image uploaded successfully",
    "isMain": image.is_main,
    "image": image,
  })))
}

#[instrument(name = "handler::upload_product_images", skip(app_state, _admin, payload), fields(product_id = %path))]
pub async fn upload_images_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
  payload: Multipart,
) -> Result<HttpResponse, AppError> {
  let uploads = read_files(payload, "images", MAX_IMAGES_PER_UPLOAD).await?;
  if uploads.is_empty() {
    return Err(AppError::Validation("No image files provided".to_string()));
  }

  let (images, main_image_id) =
    image_service::upload_many(&app_state.db_pool, app_state.images.as_ref(), path.into_inner(), uploads).await?;
  Ok(response::created(json!({
    "message": format!("{} images uploaded successfully", images.len()),
    "images": images,
    "mainImageId": main_image_id,
  })))
}

#[instrument(name = "handler::delete_product_image", skip(app_state, _admin), fields(image_id = %path))]
pub async fn delete_image_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  image_service::delete(&app_state.db_pool, app_state.images.as_ref(), path.into_inner()).await?;
  Ok(response::ok(response::message("Image deleted successfully")))
}

#[instrument(name = "handler::set_main_product_image", skip(app_state, _admin), fields(image_id = %path))]
pub async fn set_main_image_handler(
  app_state: web::Data<AppState>,
  _admin: AdminUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  image_service::set_main(&app_state.db_pool, path.into_inner()).await?;
  Ok(response::ok(response::message("Main image updated successfully")))
}
