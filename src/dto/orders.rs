use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{OrderStatus, PaymentMethod, PaymentStatus, ShippingMethod};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub product: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    pub payment_method: PaymentMethod,
    pub payment_status: Option<PaymentStatus>,
    pub status: Option<OrderStatus>,
    pub shipping_method: Option<ShippingMethod>,
    pub shipping_address: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub shipping_method: Option<ShippingMethod>,
    pub shipping_address: Option<String>,
    pub note: Option<String>,
}

/// Display fields the original populates onto order lines.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub images: Vec<String>,
}

/// Display fields the original populates for the ordering user.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product: Option<ProductRef>,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub subtotal: i64,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user: Option<UserSummary>,
    pub items: Vec<OrderLine>,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub shipping_method: Option<ShippingMethod>,
    pub shipping_address: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<OrderDto>)]
    pub items: Vec<OrderDto>,
}
