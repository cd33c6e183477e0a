use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::common::{
    query::{FilterValue, Filters},
    AppError, ErrorCode, Page, PageRequest, RepoError,
};
use crate::db::Transactional;
use crate::orders::{
    dto::{CreateOrderRequest, OrderListQuery, OrderResponse, PageQuery, UpdateOrderRequest},
    repo::OrderRepository,
    repo_types::{columns, NewOrder, Order, OrderStatus},
};
use crate::registry::{ModuleRegistry, UserInfo};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PRODUCT_NAME_LEN: usize = 255;

fn validate_product_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("productName is required"));
    }
    if name.chars().count() > MAX_PRODUCT_NAME_LEN {
        return Err(AppError::validation(
            "productName must be at most 255 characters",
        ));
    }
    Ok(())
}

fn validate_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::validation("quantity must be at least 1"));
    }
    Ok(())
}

fn validate_amount(amount: f64) -> Result<(), AppError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::validation("amount must be a non-negative number"));
    }
    Ok(())
}

fn parse_status(code: i16) -> Result<OrderStatus, AppError> {
    OrderStatus::from_code(code).ok_or_else(|| AppError::validation("status must be 1, 2 or 3"))
}

fn order_error(err: RepoError, internal_message: &str) -> AppError {
    if !matches!(err, RepoError::NotFound) {
        error!(error = %err, "{internal_message}");
    }
    AppError::from_repo(err, ErrorCode::NotFound, "Order not found", internal_message)
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn create(&self, req: CreateOrderRequest) -> Result<OrderResponse, AppError>;
    async fn update(&self, id: &str, req: UpdateOrderRequest) -> Result<OrderResponse, AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
    async fn get_by_id(&self, id: &str) -> Result<OrderResponse, AppError>;
    async fn get_all(&self, query: OrderListQuery) -> Result<Page<OrderResponse>, AppError>;
    async fn get_by_user_id(
        &self,
        user_id: &str,
        query: PageQuery,
    ) -> Result<Page<OrderResponse>, AppError>;
}

pub struct DefaultOrderService {
    repo: Arc<dyn OrderRepository>,
    transactions: Option<Arc<dyn Transactional<dyn OrderRepository>>>,
    registry: Arc<ModuleRegistry>,
}

impl DefaultOrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        transactions: Option<Arc<dyn Transactional<dyn OrderRepository>>>,
        registry: Arc<ModuleRegistry>,
    ) -> Self {
        Self {
            repo,
            transactions,
            registry,
        }
    }

    /// Looks the owner up before an order is created. Returns the projection
    /// when status is known, `None` when only existence could be checked or
    /// no user capability is registered at all.
    async fn check_owner(&self, user_id: &str) -> Result<Option<UserInfo>, AppError> {
        if let Some(lookup) = self.registry.user_lookup() {
            return lookup.get_user_by_id(user_id).await.map(Some);
        }
        if let Some(getter) = self.registry.user_getter() {
            return getter.get_user_by_id(user_id).await.map(Some);
        }
        if let Some(verifier) = self.registry.user_verifier() {
            verifier.verify_user_exists(user_id).await?;
            warn!(user_id = %user_id, "user status unavailable; skipping inactive check");
            return Ok(None);
        }
        warn!(user_id = %user_id, "no user capability registered; owner not verified");
        Ok(None)
    }

    async fn insert(&self, new_order: NewOrder) -> Result<Order, AppError> {
        let Some(transactions) = &self.transactions else {
            debug!("no transaction support; writing order directly");
            return self
                .repo
                .create(new_order)
                .await
                .map_err(|e| order_error(e, "Failed to create order"));
        };

        let scoped = transactions
            .begin()
            .await
            .map_err(|e| order_error(e, "Failed to start transaction"))?;
        let created = scoped.repo().create(new_order).await;
        match created {
            Ok(order) => {
                scoped
                    .commit()
                    .await
                    .map_err(|e| order_error(e, "Failed to commit order"))?;
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback_err) = scoped.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(order_error(e, "Failed to create order"))
            }
        }
    }

    /// Fills user name and email. Lookup failures leave them empty.
    async fn enrich_one(&self, order: Order) -> OrderResponse {
        let mut response = OrderResponse::from(order);
        if let Some(getter) = self.registry.user_getter() {
            match getter.get_user_by_id(&response.user_id).await {
                Ok(info) => fill_user(&mut response, &info),
                Err(e) => debug!(user_id = %response.user_id, error = %e, "order enrichment skipped"),
            }
        }
        response
    }

    /// Same as [`Self::enrich_one`], looking each distinct user up once.
    async fn enrich_page(&self, page: Page<Order>) -> Page<OrderResponse> {
        let mut page = page.map(OrderResponse::from);
        let Some(getter) = self.registry.user_getter() else {
            return page;
        };

        let mut known: HashMap<String, Option<UserInfo>> = HashMap::new();
        for response in &page.items {
            if known.contains_key(&response.user_id) {
                continue;
            }
            let info = match getter.get_user_by_id(&response.user_id).await {
                Ok(info) => Some(info),
                Err(e) => {
                    debug!(user_id = %response.user_id, error = %e, "order enrichment skipped");
                    None
                }
            };
            known.insert(response.user_id.clone(), info);
        }

        for response in &mut page.items {
            if let Some(Some(info)) = known.get(&response.user_id) {
                fill_user(response, info);
            }
        }
        page
    }
}

fn fill_user(response: &mut OrderResponse, info: &UserInfo) {
    response.user_name = info.name.clone();
    response.user_email = info.email.clone();
}

#[async_trait]
impl OrderService for DefaultOrderService {
    async fn create(&self, req: CreateOrderRequest) -> Result<OrderResponse, AppError> {
        if req.user_id.trim().is_empty() {
            return Err(AppError::validation("userId is required"));
        }
        validate_product_name(&req.product_name)?;
        validate_quantity(req.quantity)?;
        validate_amount(req.amount)?;

        if let Some(owner) = self.check_owner(&req.user_id).await? {
            if !owner.is_active() {
                warn!(user_id = %owner.id, "order rejected for inactive user");
                return Err(AppError::new(ErrorCode::Invalid, "User is inactive"));
            }
        }

        let new_order = NewOrder {
            id: Uuid::new_v4().to_string(),
            user_id: req.user_id,
            product_name: req.product_name,
            quantity: req.quantity,
            amount: req.amount,
            status: OrderStatus::Pending,
        };
        let order = self.insert(new_order).await?;

        info!(order_id = %order.id, user_id = %order.user_id, "order created");
        Ok(self.enrich_one(order).await)
    }

    async fn update(&self, id: &str, req: UpdateOrderRequest) -> Result<OrderResponse, AppError> {
        let mut order = self
            .repo
            .find_by_id(id)
            .await
            .map_err(|e| order_error(e, "Failed to get order"))?;

        if let Some(name) = req.product_name {
            validate_product_name(&name)?;
            order.product_name = name;
        }
        if let Some(quantity) = req.quantity {
            validate_quantity(quantity)?;
            order.quantity = quantity;
        }
        if let Some(amount) = req.amount {
            validate_amount(amount)?;
            order.amount = amount;
        }
        if let Some(code) = req.status {
            order.status = parse_status(code)?;
        }

        let order = self
            .repo
            .update(&order)
            .await
            .map_err(|e| order_error(e, "Failed to update order"))?;

        info!(order_id = %order.id, "order updated");
        Ok(self.enrich_one(order).await)
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.repo
            .delete(id)
            .await
            .map_err(|e| order_error(e, "Failed to delete order"))?;
        info!(order_id = %id, "order deleted");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<OrderResponse, AppError> {
        let order = self
            .repo
            .find_by_id(id)
            .await
            .map_err(|e| order_error(e, "Failed to get order"))?;
        Ok(self.enrich_one(order).await)
    }

    async fn get_all(&self, query: OrderListQuery) -> Result<Page<OrderResponse>, AppError> {
        let request = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        let status = query.status.map(parse_status).transpose()?;
        let filters = Filters::new(columns::FILTERABLE)
            .equals(columns::USER_ID, query.user_id.map(FilterValue::Text))
            .and_then(|f| f.contains(columns::PRODUCT_NAME, query.product_name.as_deref()))
            .and_then(|f| {
                f.equals(
                    columns::STATUS,
                    status.map(|s| FilterValue::Int(i64::from(s.code()))),
                )
            })
            .map_err(|e| AppError::bad_request(e.to_string()))?;

        let (items, total) = self
            .repo
            .find_all_with_filters(&filters, request)
            .await
            .map_err(|e| order_error(e, "Failed to list orders"))?;

        Ok(self
            .enrich_page(Page {
                items,
                request,
                total,
            })
            .await)
    }

    async fn get_by_user_id(
        &self,
        user_id: &str,
        query: PageQuery,
    ) -> Result<Page<OrderResponse>, AppError> {
        match self.registry.user_verifier() {
            Some(verifier) => verifier.verify_user_exists(user_id).await?,
            None => warn!(user_id = %user_id, "user verifier not registered; listing without check"),
        }

        let request = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        let (items, total) = self
            .repo
            .find_by_user_id(user_id, request)
            .await
            .map_err(|e| order_error(e, "Failed to list user orders"))?;

        Ok(self
            .enrich_page(Page {
                items,
                request,
                total,
            })
            .await)
    }
}
