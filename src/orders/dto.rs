use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::orders::repo_types::Order;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub amount: f64,
}

/// Partial update; `None` leaves the stored value as is.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub product_name: Option<String>,
    pub quantity: Option<i32>,
    pub amount: Option<f64>,
    pub status: Option<i16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<String>,
    pub product_name: Option<String>,
    pub status: Option<i16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub user_name: String,  // empty when the user module cannot tell
    pub user_email: String, // same
    pub product_name: String,
    pub quantity: i32,
    pub amount: f64,
    pub status: i16,
    pub status_text: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            user_name: String::new(),
            user_email: String::new(),
            product_name: order.product_name,
            quantity: order.quantity,
            amount: order.amount,
            status: order.status.code(),
            status_text: order.status.label(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
