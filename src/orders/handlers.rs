use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use tracing::{info, instrument};

use crate::{
    common::{
        response::{self, Reply},
        ApiJson, ApiQuery, AppError,
    },
    orders::dto::{
        CreateOrderRequest, OrderListQuery, OrderResponse, PageQuery, UpdateOrderRequest,
    },
    state::AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/:id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/orders/user/:user_id", get(list_user_orders))
}

#[instrument(skip(state, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateOrderRequest>,
) -> Result<Reply<OrderResponse>, AppError> {
    let order = state.orders.create(payload).await?;
    Ok(response::created(order))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply<OrderResponse>, AppError> {
    let order = state.orders.get_by_id(&id).await?;
    Ok(response::ok(order))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<Reply<Vec<OrderResponse>>, AppError> {
    let page = state.orders.get_all(query).await?;
    Ok(response::paged(page))
}

#[instrument(skip(state))]
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Reply<Vec<OrderResponse>>, AppError> {
    let page = state.orders.get_by_user_id(&user_id, query).await?;
    Ok(response::paged(page))
}

#[instrument(skip(state, payload))]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateOrderRequest>,
) -> Result<Reply<OrderResponse>, AppError> {
    let order = state.orders.update(&id, payload).await?;
    Ok(response::ok(order))
}

#[instrument(skip(state))]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply<()>, AppError> {
    state.orders.delete(&id).await?;
    info!(order_id = %id, "order removed via api");
    Ok(response::done())
}
