use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

pub const ORDER_TABLE: &str = "orders";
pub const ORDER_COLUMNS: &str =
    "id, user_id, product_name, quantity, amount, status, created_at, updated_at";

pub mod columns {
    pub const USER_ID: &str = "user_id";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const STATUS: &str = "status";

    pub const FILTERABLE: &[&str] = &[USER_ID, PRODUCT_NAME, STATUS];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum OrderStatus {
    Pending = 1,
    Completed = 2,
    Cancelled = 3,
}

impl OrderStatus {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(OrderStatus::Pending),
            2 => Some(OrderStatus::Completed),
            3 => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Order record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String, // not a foreign key; users may be deleted independently
    pub product_name: String,
    pub quantity: i32,
    pub amount: f64,
    pub status: OrderStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: String,
    pub user_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub amount: f64,
    pub status: OrderStatus,
}
