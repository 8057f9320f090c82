use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::OverviewSection;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub stock: i32,
    pub category_id: Uuid,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    #[serde(default)]
    pub overview: Vec<OverviewSection>,
    pub voucher_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub discount_price: Option<i64>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    pub overview: Option<Vec<OverviewSection>>,
    pub voucher_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
}

/// Listing projection: the card fields plus the joined category name.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductCard {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub stock: i32,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub rating: Option<f32>,
    pub category: CategoryRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<ProductCard>)]
    pub items: Vec<ProductCard>,
}