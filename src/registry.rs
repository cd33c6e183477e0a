//! Capability registry through which feature modules call each other.
//!
//! Modules register narrow capabilities at startup and look them up on
//! demand. Every slot is written at most once; a slot that was never filled
//! reads as `None` and callers degrade instead of failing.

use std::sync::{Arc, OnceLock};

use axum::async_trait;
use tracing::{info, warn};

use crate::common::AppError;

/// Read-only projection of a user shared with other modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: i16,
}

impl UserInfo {
    pub fn is_active(&self) -> bool {
        self.status == 1
    }
}

/// Read-only projection of an order shared with other modules.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderInfo {
    pub id: String,
    pub user_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub amount: f64,
    pub status: i16,
}

#[async_trait]
pub trait UserVerifier: Send + Sync {
    /// `Ok(())` when the user exists, `USER_NOT_FOUND` otherwise.
    async fn verify_user_exists(&self, user_id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait UserGetter: Send + Sync {
    async fn get_user_by_id(&self, user_id: &str) -> Result<UserInfo, AppError>;
}

/// Both user capabilities behind one handle.
pub trait UserLookup: UserVerifier + UserGetter {}

#[async_trait]
pub trait OrderGetter: Send + Sync {
    async fn get_by_id(&self, order_id: &str) -> Result<OrderInfo, AppError>;
}

/// Explicit composition of a verifier and a getter registered separately.
struct CombinedUser {
    verifier: Arc<dyn UserVerifier>,
    getter: Arc<dyn UserGetter>,
}

#[async_trait]
impl UserVerifier for CombinedUser {
    async fn verify_user_exists(&self, user_id: &str) -> Result<(), AppError> {
        self.verifier.verify_user_exists(user_id).await
    }
}

#[async_trait]
impl UserGetter for CombinedUser {
    async fn get_user_by_id(&self, user_id: &str) -> Result<UserInfo, AppError> {
        self.getter.get_user_by_id(user_id).await
    }
}

impl UserLookup for CombinedUser {}

#[derive(Default)]
pub struct ModuleRegistry {
    user_verifier: OnceLock<Arc<dyn UserVerifier>>,
    user_getter: OnceLock<Arc<dyn UserGetter>>,
    user_lookup: OnceLock<Arc<dyn UserLookup>>,
    order_getter: OnceLock<Arc<dyn OrderGetter>>,
}

fn fill<T: ?Sized>(slot: &OnceLock<Arc<T>>, value: Arc<T>, name: &'static str) {
    if slot.set(value).is_err() {
        warn!(capability = name, "capability already registered; keeping the first one");
    } else {
        info!(capability = name, "capability registered");
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user_verifier(&self, verifier: Arc<dyn UserVerifier>) {
        fill(&self.user_verifier, verifier, "user_verifier");
        self.combine_user_capabilities();
    }

    pub fn register_user_getter(&self, getter: Arc<dyn UserGetter>) {
        fill(&self.user_getter, getter, "user_getter");
        self.combine_user_capabilities();
    }

    /// Registers one implementation for both user capabilities.
    pub fn register_user_module<T>(&self, module: Arc<T>)
    where
        T: UserVerifier + UserGetter + 'static,
    {
        let verifier: Arc<dyn UserVerifier> = module.clone();
        let getter: Arc<dyn UserGetter> = module;
        self.register_user_verifier(verifier);
        self.register_user_getter(getter);
    }

    pub fn register_order_getter(&self, getter: Arc<dyn OrderGetter>) {
        fill(&self.order_getter, getter, "order_getter");
    }

    fn combine_user_capabilities(&self) {
        if self.user_lookup.get().is_some() {
            return;
        }
        if let (Some(verifier), Some(getter)) = (self.user_verifier.get(), self.user_getter.get()) {
            let combined = Arc::new(CombinedUser {
                verifier: verifier.clone(),
                getter: getter.clone(),
            });
            // Racing registrations may both get here; the first one wins.
            let _ = self.user_lookup.set(combined);
        }
    }

    pub fn user_verifier(&self) -> Option<Arc<dyn UserVerifier>> {
        self.user_verifier.get().cloned()
    }

    pub fn user_getter(&self) -> Option<Arc<dyn UserGetter>> {
        self.user_getter.get().cloned()
    }

    pub fn user_lookup(&self) -> Option<Arc<dyn UserLookup>> {
        self.user_lookup.get().cloned()
    }

    pub fn order_getter(&self) -> Option<Arc<dyn OrderGetter>> {
        self.order_getter.get().cloned()
    }
}
