use std::sync::Arc;
use std::time::Instant;

use axum::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::{query::Filters, AppError, ErrorCode, Page, PageRequest, RepoError};
use crate::db::Transactional;
use crate::metrics::Metrics;
use crate::users::{
    dto::{CreateUserRequest, UpdateUserRequest, UserListQuery, UserResponse},
    repo::UserRepository,
    repo_types::{columns, NewUser, User, UserStatus},
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_NAME_LEN: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= MAX_NAME_LEN && EMAIL_RE.is_match(email)
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation("name must be at most 255 characters"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() {
        return Err(AppError::validation("email is required"));
    }
    if !is_valid_email(email) {
        return Err(AppError::validation("email must be a valid email address"));
    }
    Ok(())
}

fn email_exists() -> AppError {
    AppError::new(ErrorCode::EmailExists, "Email already exists")
}

fn user_not_found() -> AppError {
    AppError::new(ErrorCode::UserNotFound, "User not found")
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn create(&self, req: CreateUserRequest) -> Result<UserResponse, AppError>;
    async fn update(&self, id: &str, req: UpdateUserRequest) -> Result<UserResponse, AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
    async fn get_by_id(&self, id: &str) -> Result<UserResponse, AppError>;
    async fn get_all(&self, query: UserListQuery) -> Result<Page<UserResponse>, AppError>;
}

pub struct DefaultUserService {
    repo: Arc<dyn UserRepository>,
    transactions: Option<Arc<dyn Transactional<dyn UserRepository>>>,
}

impl DefaultUserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self {
            repo,
            transactions: None,
        }
    }

    /// Runs updates inside a transaction so the email check and the write
    /// see the same rows.
    pub fn with_transactions(
        mut self,
        transactions: Option<Arc<dyn Transactional<dyn UserRepository>>>,
    ) -> Self {
        self.transactions = transactions;
        self
    }
}

/// `Ok(())` when no user holds `email`.
async fn ensure_email_free(repo: &dyn UserRepository, email: &str) -> Result<(), AppError> {
    match repo.find_by_email(email).await {
        Ok(_) => {
            warn!(email = %email, "email already registered");
            Err(email_exists())
        }
        Err(RepoError::NotFound) => Ok(()),
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            Err(AppError::internal("Failed to check email", e))
        }
    }
}

async fn apply_update(
    repo: &dyn UserRepository,
    id: &str,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let mut user = repo.find_by_id(id).await.map_err(|e| {
        AppError::from_repo(e, ErrorCode::UserNotFound, "User not found", "Failed to get user")
    })?;

    if let Some(name) = req.name {
        validate_name(&name)?;
        user.name = name;
    }
    if let Some(email) = req.email {
        validate_email(&email)?;
        if email != user.email {
            ensure_email_free(repo, &email).await?;
            user.email = email;
        }
    }
    if let Some(code) = req.status {
        user.status = UserStatus::from_code(code)
            .ok_or_else(|| AppError::validation("status must be 0 or 1"))?;
    }

    match repo.update(&user).await {
        Ok(u) => Ok(u),
        Err(RepoError::NotFound) => Err(user_not_found()),
        Err(RepoError::Duplicate(_)) => Err(email_exists()),
        Err(e) => {
            error!(error = %e, user_id = %id, "update user failed");
            Err(AppError::internal("Failed to update user", e))
        }
    }
}

#[async_trait]
impl UserService for DefaultUserService {
    async fn create(&self, req: CreateUserRequest) -> Result<UserResponse, AppError> {
        validate_name(&req.name)?;
        validate_email(&req.email)?;
        ensure_email_free(self.repo.as_ref(), &req.email).await?;

        let new_user = NewUser {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            email: req.email,
            status: UserStatus::Active,
        };
        let user = match self.repo.create(new_user).await {
            Ok(u) => u,
            Err(RepoError::Duplicate(constraint)) => {
                warn!(%constraint, "email taken concurrently");
                return Err(email_exists());
            }
            Err(e) => {
                error!(error = %e, "create user failed");
                return Err(AppError::internal("Failed to create user", e));
            }
        };

        info!(user_id = %user.id, email = %user.email, "user created");
        Ok(user.into())
    }

    async fn update(&self, id: &str, req: UpdateUserRequest) -> Result<UserResponse, AppError> {
        let user = match &self.transactions {
            Some(transactions) => {
                let scoped = transactions.begin().await.map_err(|e| {
                    error!(error = %e, "begin transaction failed");
                    AppError::internal("Failed to update user", e)
                })?;
                let updated = apply_update(scoped.repo(), id, req).await;
                match updated {
                    Ok(user) => {
                        scoped.commit().await.map_err(|e| {
                            error!(error = %e, user_id = %id, "commit failed");
                            AppError::internal("Failed to update user", e)
                        })?;
                        user
                    }
                    Err(err) => {
                        if let Err(e) = scoped.rollback().await {
                            warn!(error = %e, user_id = %id, "rollback failed");
                        }
                        return Err(err);
                    }
                }
            }
            None => apply_update(self.repo.as_ref(), id, req).await?,
        };

        info!(user_id = %user.id, "user updated");
        Ok(user.into())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.repo.delete(id).await.map_err(|e| {
            AppError::from_repo(e, ErrorCode::UserNotFound, "User not found", "Failed to delete user")
        })?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<UserResponse, AppError> {
        let user = self.repo.find_by_id(id).await.map_err(|e| {
            AppError::from_repo(e, ErrorCode::UserNotFound, "User not found", "Failed to get user")
        })?;
        Ok(user.into())
    }

    async fn get_all(&self, query: UserListQuery) -> Result<Page<UserResponse>, AppError> {
        let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        let filters = Filters::new(columns::FILTERABLE)
            .contains(columns::NAME, query.name.as_deref())
            .and_then(|f| f.contains(columns::EMAIL, query.email.as_deref()))
            .map_err(|e| AppError::bad_request(e.to_string()))?;

        let (users, total) = self
            .repo
            .find_all_with_filters(&filters, page)
            .await
            .map_err(|e| {
                error!(error = %e, "list users failed");
                AppError::internal("Failed to list users", e)
            })?;

        Ok(Page {
            items: users,
            request: page,
            total,
        }
        .map(UserResponse::from))
    }
}

/// Decorator recording business metrics around every user operation.
pub struct InstrumentedUserService {
    inner: Arc<dyn UserService>,
    metrics: Arc<Metrics>,
}

impl InstrumentedUserService {
    const MODULE: &'static str = "user";

    pub fn new(inner: Arc<dyn UserService>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }

    fn record<T>(&self, operation: &str, started: Instant, result: &Result<T, AppError>) {
        let code = result.as_ref().err().map(|e| e.code.as_str());
        self.metrics
            .observe_operation(Self::MODULE, operation, started.elapsed(), code);
    }
}

#[async_trait]
impl UserService for InstrumentedUserService {
    async fn create(&self, req: CreateUserRequest) -> Result<UserResponse, AppError> {
        let started = Instant::now();
        let result = self.inner.create(req).await;
        self.record("create", started, &result);
        result
    }

    async fn update(&self, id: &str, req: UpdateUserRequest) -> Result<UserResponse, AppError> {
        let started = Instant::now();
        let result = self.inner.update(id, req).await;
        self.record("update", started, &result);
        result
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let started = Instant::now();
        let result = self.inner.delete(id).await;
        self.record("delete", started, &result);
        result
    }

    async fn get_by_id(&self, id: &str) -> Result<UserResponse, AppError> {
        let started = Instant::now();
        let result = self.inner.get_by_id(id).await;
        self.record("get_by_id", started, &result);
        result
    }

    async fn get_all(&self, query: UserListQuery) -> Result<Page<UserResponse>, AppError> {
        let started = Instant::now();
        let result = self.inner.get_all(query).await;
        self.record("get_all", started, &result);
        result
    }
}
