// server/src/web/response.rs

//! The `{success, data}` envelope every endpoint answers with.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub count: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub total_pages: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
  pub success: bool,
  pub data: T,
  #[serde(flatten)]
  pub meta: PageMeta,
}

pub fn respond<T: Serialize>(status: StatusCode, data: T, meta: PageMeta) -> HttpResponse {
  HttpResponse::build(status).json(Envelope {
    success: true,
    data,
    meta,
  })
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
  respond(StatusCode::OK, data, PageMeta::default())
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
  respond(StatusCode::CREATED, data, PageMeta::default())
}

pub fn ok_with_meta<T: Serialize>(data: T, meta: PageMeta) -> HttpResponse {
  respond(StatusCode::OK, data, meta)
}

/// `{"message": ...}` payload used by endpoints that only confirm an action.
pub fn message(text: impl Into<String>) -> serde_json::Value {
  serde_json::json!({ "message": text.into() })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_meta_is_omitted() {
    let value = serde_json::to_value(Envelope {
      success: true,
      data: message("done"),
      meta: PageMeta::default(),
    })
    .unwrap();
    assert_eq!(value, serde_json::json!({"success": true, "data": {"message": "done"}}));
  }

  #[test]
  fn page_meta_is_flattened_next_to_data() {
    let value = serde_json::to_value(Envelope {
      success: true,
      data: vec![1, 2],
      meta: PageMeta {
        count: Some(2),
        page: Some(1),
        total_pages: Some(4),
      },
    })
    .unwrap();
    assert_eq!(value["count"], 2);
    assert_eq!(value["page"], 1);
    assert_eq!(value["totalPages"], 4);
  }
}
