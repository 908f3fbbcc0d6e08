// server/src/web/pagination.rs

use crate::web::response::PageMeta;

pub const MAX_LIMIT: i64 = 100;
/// Highest page whose offset still fits an `i64` at any allowed limit.
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// Page/limit resolved from raw query strings. Unparseable values fall back to
/// the defaults; `page` stays within `1..=MAX_PAGE` and `limit` stays within `1..=MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  pub page: i64,
  pub limit: i64,
}

impl Pagination {
  pub fn from_query(page: Option<&str>, limit: Option<&str>, default_limit: i64) -> Self {
    let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<i64>().ok());
    let page = parse(page).unwrap_or(1).clamp(1, MAX_PAGE);
    let limit = parse(limit).unwrap_or(default_limit).clamp(1, MAX_LIMIT);
    Self { page, limit }
  }

  pub fn offset(&self) -> i64 {
    (self.page - 1).saturating_mul(self.limit)
  }

  pub fn total_pages(&self, total: i64) -> i64 {
    (total + self.limit - 1) / self.limit
  }

  pub fn meta(&self, count: usize, total: i64) -> PageMeta {
    PageMeta {
      count: Some(count as i64),
      page: Some(self.page),
      total_pages: Some(self.total_pages(total)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_apply_to_missing_or_garbage_values() {
    assert_eq!(Pagination::from_query(None, None, 12), Pagination { page: 1, limit: 12 });
    assert_eq!(Pagination::from_query(Some("abc"), Some("x"), 10), Pagination { page: 1, limit: 10 });
  }

  #[test]
  fn values_are_clamped() {
    assert_eq!(Pagination::from_query(Some("0"), Some("500"), 12), Pagination { page: 1, limit: 100 });
    assert_eq!(Pagination::from_query(Some("-3"), Some("0"), 12), Pagination { page: 1, limit: 1 });
  }

  #[test]
  fn huge_pages_are_capped_without_overflow() {
    let p = Pagination::from_query(Some("9223372036854775807"), None, 12);
    assert_eq!(p.page, MAX_PAGE);
    assert!(p.offset() > 0);

    let widest = Pagination::from_query(Some("9223372036854775807"), Some("100"), 12);
    assert_eq!(widest.offset(), (MAX_PAGE - 1) * MAX_LIMIT);
  }

  #[test]
  fn offset_and_total_pages() {
    let p = Pagination::from_query(Some("3"), Some("10"), 12);
    assert_eq!(p.offset(), 20);
    assert_eq!(p.total_pages(0), 0);
    assert_eq!(p.total_pages(10), 1);
    assert_eq!(p.total_pages(21), 3);
    assert_eq!(p.meta(1, 21).total_pages, Some(3));
  }
}
