use std::sync::Arc;

use axum::Router;

use crate::{db::Transactional, registry::ModuleRegistry, state::AppState};

pub mod adapter;
pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use adapter::OrderModuleAdapter;
use repo::OrderRepository;
use services::{DefaultOrderService, OrderService};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::order_routes())
}

/// Builds the order service on top of whatever user capabilities are
/// already registered, then publishes the order capability.
pub fn init(
    repo: Arc<dyn OrderRepository>,
    transactions: Option<Arc<dyn Transactional<dyn OrderRepository>>>,
    registry: Arc<ModuleRegistry>,
) -> Arc<dyn OrderService> {
    let service: Arc<dyn OrderService> =
        Arc::new(DefaultOrderService::new(repo, transactions, registry.clone()));
    registry.register_order_getter(Arc::new(OrderModuleAdapter::new(service.clone())));
    service
}
