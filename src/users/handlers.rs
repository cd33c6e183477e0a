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
    state::AppState,
    users::dto::{CreateUserRequest, UpdateUserRequest, UserListQuery, UserResponse},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<Reply<UserResponse>, AppError> {
    let user = state.users.create(payload).await?;
    Ok(response::created(user))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply<UserResponse>, AppError> {
    let user = state.users.get_by_id(&id).await?;
    Ok(response::ok(user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Result<Reply<Vec<UserResponse>>, AppError> {
    let page = state.users.get_all(query).await?;
    Ok(response::paged(page))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Reply<UserResponse>, AppError> {
    let user = state.users.update(&id, payload).await?;
    Ok(response::ok(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply<()>, AppError> {
    state.users.delete(&id).await?;
    info!(user_id = %id, "user removed via api");
    Ok(response::done())
}
