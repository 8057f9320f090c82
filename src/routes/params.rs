use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{OrderStatus, PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self { page, limit }
    }

    /// `(page, limit, offset)` — page is 1-indexed, limit defaults to 10 and
    /// is clamped into 1..=100, offset = (page - 1) * limit.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(10).clamp(1, 100);
        let offset = (page - 1) * limit;
        (page, limit, offset)
    }
}

// Filter query structs keep page/limit inline instead of a #[serde(flatten)]
// Pagination: serde_urlencoded cannot deserialize numeric fields through a
// flatten, so axum's Query extractor would reject every request.

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub name: Option<String>,
}

impl CategoryQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

impl SearchQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderSearchQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub status: Option<OrderStatus>,
    pub shipping_address: Option<String>,
}

impl OrderSearchQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_defaults_to_first_page_of_ten() {
        let (page, limit, offset) = Pagination::new(None, None).normalize();
        assert_eq!((page, limit, offset), (1, 10, 0));
    }

    #[test]
    fn normalize_computes_offset_from_one_indexed_page() {
        let (page, limit, offset) = Pagination::new(Some(3), Some(10)).normalize();
        assert_eq!((page, limit, offset), (3, 10, 20));
    }

    #[test]
    fn normalize_clamps_out_of_range_values() {
        let (page, limit, _) = Pagination::new(Some(0), Some(1000)).normalize();
        assert_eq!((page, limit), (1, 100));
        let (_, limit, _) = Pagination::new(Some(2), Some(0)).normalize();
        assert_eq!(limit, 1);
    }
}
