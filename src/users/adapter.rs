use std::sync::Arc;

use axum::async_trait;

use crate::common::{AppError, ErrorCode};
use crate::registry::{UserGetter, UserInfo, UserVerifier};
use crate::users::services::UserService;

/// Exposes the user service to other modules through the registry.
pub struct UserModuleAdapter {
    service: Arc<dyn UserService>,
}

impl UserModuleAdapter {
    pub fn new(service: Arc<dyn UserService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl UserVerifier for UserModuleAdapter {
    async fn verify_user_exists(&self, user_id: &str) -> Result<(), AppError> {
        match self.service.get_by_id(user_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.code == ErrorCode::UserNotFound => Err(AppError::new(
                ErrorCode::UserNotFound,
                format!("User {user_id} not found"),
            )),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl UserGetter for UserModuleAdapter {
    async fn get_user_by_id(&self, user_id: &str) -> Result<UserInfo, AppError> {
        let user = self.service.get_by_id(user_id).await?;
        Ok(UserInfo {
            id: user.id,
            name: user.name,
            email: user.email,
            status: user.status,
        })
    }
}
