//! In-memory stores standing in for Postgres in unit and router tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::common::{
    query::{FilterOp, FilterValue, Filters},
    PageRequest, RepoError, RepoResult,
};
use crate::db::{Scoped, Transactional, TxControl};
use crate::orders::{
    repo::OrderRepository,
    repo_types::{NewOrder, Order},
};
use crate::users::{
    repo::UserRepository,
    repo_types::{NewUser, User},
};

fn matches(filters: &Filters, field: impl Fn(&str) -> Option<FilterValue>) -> bool {
    filters.conditions().iter().all(|c| match (&c.op, field(&c.field)) {
        (FilterOp::Contains(needle), Some(FilterValue::Text(value))) => value
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        (FilterOp::Equals(expected), Some(actual)) => *expected == actual,
        _ => false,
    })
}

/// Newest first, then the requested window.
fn page_of<T: Clone>(
    mut rows: Vec<T>,
    created: impl Fn(&T) -> OffsetDateTime,
    page: PageRequest,
) -> (Vec<T>, u64) {
    rows.reverse();
    rows.sort_by_key(|r| std::cmp::Reverse(created(r)));
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (items, total)
}

#[derive(Default)]
pub struct InMemoryUsers {
    rows: Mutex<Vec<User>>,
}

impl InMemoryUsers {
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    fn snapshot(&self) -> Self {
        Self {
            rows: Mutex::new(self.rows.lock().clone()),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Duplicate("users_email_key".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: user.id,
            name: user.name,
            email: user.email,
            status: user.status,
            created_at: now,
            updated_at: now,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> RepoResult<User> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|u| u.email == user.email && u.id != user.id) {
            return Err(RepoError::Duplicate("users_email_key".into()));
        }
        let stored = rows
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(RepoError::NotFound)?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.status = user.status;
        stored.updated_at = OffsetDateTime::now_utc().max(stored.updated_at);
        Ok(stored.clone())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|u| u.id != id);
        if rows.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> RepoResult<User> {
        self.rows
            .lock()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<User> {
        self.rows
            .lock()
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn find_all_with_filters(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> RepoResult<(Vec<User>, u64)> {
        let rows: Vec<User> = self
            .rows
            .lock()
            .iter()
            .filter(|u| {
                matches(filters, |field| match field {
                    "name" => Some(FilterValue::Text(u.name.clone())),
                    "email" => Some(FilterValue::Text(u.email.clone())),
                    _ => None,
                })
            })
            .cloned()
            .collect();
        Ok(page_of(rows, |u| u.created_at, page))
    }
}

#[derive(Default)]
pub struct InMemoryOrders {
    rows: Mutex<Vec<Order>>,
    fail_writes: AtomicBool,
}

impl InMemoryOrders {
    /// A store whose inserts fail with a database error.
    pub fn failing() -> Self {
        Self {
            rows: Mutex::default(),
            fail_writes: AtomicBool::new(true),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    fn absorb(&self, other: &InMemoryOrders) {
        let staged = std::mem::take(&mut *other.rows.lock());
        self.rows.lock().extend(staged);
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create(&self, order: NewOrder) -> RepoResult<Order> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
        }
        let now = OffsetDateTime::now_utc();
        let order = Order {
            id: order.id,
            user_id: order.user_id,
            product_name: order.product_name,
            quantity: order.quantity,
            amount: order.amount,
            status: order.status,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().push(order.clone());
        Ok(order)
    }

    async fn update(&self, order: &Order) -> RepoResult<Order> {
        let mut rows = self.rows.lock();
        let stored = rows
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or(RepoError::NotFound)?;
        stored.product_name = order.product_name.clone();
        stored.quantity = order.quantity;
        stored.amount = order.amount;
        stored.status = order.status;
        stored.updated_at = OffsetDateTime::now_utc().max(stored.updated_at);
        Ok(stored.clone())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|o| o.id != id);
        if rows.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> RepoResult<Order> {
        self.rows
            .lock()
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn find_by_user_id(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> RepoResult<(Vec<Order>, u64)> {
        let rows: Vec<Order> = self
            .rows
            .lock()
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(page_of(rows, |o| o.created_at, page))
    }

    async fn find_all_with_filters(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> RepoResult<(Vec<Order>, u64)> {
        let rows: Vec<Order> = self
            .rows
            .lock()
            .iter()
            .filter(|o| {
                matches(filters, |field| match field {
                    "user_id" => Some(FilterValue::Text(o.user_id.clone())),
                    "product_name" => Some(FilterValue::Text(o.product_name.clone())),
                    "status" => Some(FilterValue::Int(i64::from(o.status.code()))),
                    _ => None,
                })
            })
            .cloned()
            .collect();
        Ok(page_of(rows, |o| o.created_at, page))
    }
}

/// Transactions over [`InMemoryOrders`]: writes go to a staging store and
/// move to the target only on commit.
pub struct InMemoryOrderTransactions {
    target: Arc<InMemoryOrders>,
    fail_writes: bool,
    pub commits: Arc<AtomicUsize>,
    pub rollbacks: Arc<AtomicUsize>,
}

impl InMemoryOrderTransactions {
    pub fn new(target: Arc<InMemoryOrders>) -> Self {
        Self {
            target,
            fail_writes: false,
            commits: Arc::default(),
            rollbacks: Arc::default(),
        }
    }

    pub fn failing(target: Arc<InMemoryOrders>) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(target)
        }
    }
}

struct StagedTx {
    staged: Arc<InMemoryOrders>,
    target: Arc<InMemoryOrders>,
    commits: Arc<AtomicUsize>,
    rollbacks: Arc<AtomicUsize>,
}

#[async_trait]
impl TxControl for StagedTx {
    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.target.absorb(&self.staged);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Transactional<dyn OrderRepository> for InMemoryOrderTransactions {
    async fn begin(&self) -> RepoResult<Scoped<dyn OrderRepository>> {
        let staged = Arc::new(if self.fail_writes {
            InMemoryOrders::failing()
        } else {
            InMemoryOrders::default()
        });
        let tx = StagedTx {
            staged: staged.clone(),
            target: self.target.clone(),
            commits: self.commits.clone(),
            rollbacks: self.rollbacks.clone(),
        };
        let repo: Arc<dyn OrderRepository> = staged;
        Ok(Scoped::new(repo, Box::new(tx)))
    }
}

/// Transactions over [`InMemoryUsers`]: the scoped store starts as a copy of
/// the target and replaces it on commit.
pub struct InMemoryUserTransactions {
    target: Arc<InMemoryUsers>,
    pub commits: Arc<AtomicUsize>,
    pub rollbacks: Arc<AtomicUsize>,
}

impl InMemoryUserTransactions {
    pub fn new(target: Arc<InMemoryUsers>) -> Self {
        Self {
            target,
            commits: Arc::default(),
            rollbacks: Arc::default(),
        }
    }
}

struct SnapshotTx {
    working: Arc<InMemoryUsers>,
    target: Arc<InMemoryUsers>,
    commits: Arc<AtomicUsize>,
    rollbacks: Arc<AtomicUsize>,
}

#[async_trait]
impl TxControl for SnapshotTx {
    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let rows = std::mem::take(&mut *self.working.rows.lock());
        *self.target.rows.lock() = rows;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Transactional<dyn UserRepository> for InMemoryUserTransactions {
    async fn begin(&self) -> RepoResult<Scoped<dyn UserRepository>> {
        let working = Arc::new(self.target.snapshot());
        let tx = SnapshotTx {
            working: working.clone(),
            target: self.target.clone(),
            commits: self.commits.clone(),
            rollbacks: self.rollbacks.clone(),
        };
        let repo: Arc<dyn UserRepository> = working;
        Ok(Scoped::new(repo, Box::new(tx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::UserStatus;

    fn new_user(id: &str, email: &str) -> NewUser {
        NewUser {
            id: id.into(),
            name: "Ann".into(),
            email: email.into(),
            status: UserStatus::Active,
        }
    }

    #[tokio::test]
    async fn user_transaction_commit_publishes_writes() {
        let store = Arc::new(InMemoryUsers::default());
        let transactions = InMemoryUserTransactions::new(store.clone());

        let scoped = transactions.begin().await.expect("begin");
        scoped
            .repo()
            .create(new_user("u1", "ann@example.com"))
            .await
            .expect("create in tx");
        assert_eq!(store.len(), 0);

        scoped.commit().await.expect("commit");
        assert_eq!(store.len(), 1);
        assert_eq!(transactions.commits.load(Ordering::SeqCst), 1);
        store.find_by_id("u1").await.expect("committed row");
    }

    #[tokio::test]
    async fn user_transaction_rollback_discards_writes() {
        let store = Arc::new(InMemoryUsers::default());
        store
            .create(new_user("u1", "ann@example.com"))
            .await
            .expect("seed");
        let transactions = InMemoryUserTransactions::new(store.clone());

        let scoped = transactions.begin().await.expect("begin");
        scoped.repo().delete("u1").await.expect("delete in tx");
        scoped
            .repo()
            .create(new_user("u2", "bob@example.com"))
            .await
            .expect("create in tx");

        scoped.rollback().await.expect("rollback");
        assert_eq!(transactions.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
        store.find_by_id("u1").await.expect("still there");
        assert!(matches!(
            store.find_by_id("u2").await,
            Err(RepoError::NotFound)
        ));
    }
}
