use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ProductSummary;

/// One incoming line: `product` is the product id, the rest is the variant
/// choice and the price observed by the client.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemInput {
    pub product: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub color: String,
    pub size: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceCartRequest {
    pub items: Vec<CartItemInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub color: String,
    pub size: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveCartItemRequest {
    pub color: String,
    pub size: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product: ProductSummary,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub color: String,
    pub size: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
