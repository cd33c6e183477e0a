use std::sync::Arc;

use axum::Router;

use crate::{db::Transactional, metrics::Metrics, registry::ModuleRegistry, state::AppState};

pub mod adapter;
pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use adapter::UserModuleAdapter;
use repo::UserRepository;
use services::{DefaultUserService, InstrumentedUserService, UserService};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}

/// Builds the user service and publishes its capabilities. Must run before
/// any module that looks users up through the registry. Registry lookups go
/// to the uninstrumented service.
pub fn init(
    repo: Arc<dyn UserRepository>,
    transactions: Option<Arc<dyn Transactional<dyn UserRepository>>>,
    registry: &ModuleRegistry,
    metrics: Arc<Metrics>,
) -> Arc<dyn UserService> {
    let core: Arc<dyn UserService> =
        Arc::new(DefaultUserService::new(repo).with_transactions(transactions));
    registry.register_user_module(Arc::new(UserModuleAdapter::new(core.clone())));
    Arc::new(InstrumentedUserService::new(core, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{UserGetter, UserVerifier};
    use crate::test_support::InMemoryUsers;
    use crate::users::dto::CreateUserRequest;

    #[tokio::test]
    async fn registry_lookups_are_not_business_operations() {
        let registry = ModuleRegistry::new();
        let metrics = Arc::new(Metrics::new().expect("metrics"));
        let users = init(
            Arc::new(InMemoryUsers::default()),
            None,
            &registry,
            metrics.clone(),
        );
        let ann = users
            .create(CreateUserRequest {
                name: "Ann".into(),
                email: "ann@example.com".into(),
            })
            .await
            .expect("create");

        let lookup = registry.user_lookup().expect("user capabilities");
        lookup.get_user_by_id(&ann.id).await.expect("found");
        lookup
            .verify_user_exists("ghost")
            .await
            .expect_err("unknown user");

        let text = metrics.render().expect("render");
        assert!(text.contains(r#"operation="create""#));
        assert!(!text.contains(r#"operation="get_by_id""#));
        assert!(!text.contains(r#"error_code="USER_NOT_FOUND""#));
    }
}
