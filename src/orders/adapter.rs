use std::sync::Arc;

use axum::async_trait;

use crate::common::AppError;
use crate::orders::services::OrderService;
use crate::registry::{OrderGetter, OrderInfo};

/// Publishes order lookups to other modules.
pub struct OrderModuleAdapter {
    service: Arc<dyn OrderService>,
}

impl OrderModuleAdapter {
    pub fn new(service: Arc<dyn OrderService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl OrderGetter for OrderModuleAdapter {
    async fn get_by_id(&self, order_id: &str) -> Result<OrderInfo, AppError> {
        let order = self.service.get_by_id(order_id).await?;
        Ok(OrderInfo {
            id: order.id,
            user_id: order.user_id,
            product_name: order.product_name,
            quantity: order.quantity,
            amount: order.amount,
            status: order.status,
        })
    }
}
