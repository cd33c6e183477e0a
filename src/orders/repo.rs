use std::sync::Arc;

use axum::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::common::{query::Filters, PageRequest, RepoError, RepoResult};
use crate::db::{Conn, Scoped, Transactional, TxHandle};
use crate::orders::repo_types::{NewOrder, Order, ORDER_COLUMNS, ORDER_TABLE};

/// Persistence contract for orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: NewOrder) -> RepoResult<Order>;
    async fn update(&self, order: &Order) -> RepoResult<Order>;
    async fn delete(&self, id: &str) -> RepoResult<()>;
    async fn find_by_id(&self, id: &str) -> RepoResult<Order>;
    async fn find_by_user_id(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> RepoResult<(Vec<Order>, u64)>;
    async fn find_all_with_filters(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> RepoResult<(Vec<Order>, u64)>;
}

#[derive(Clone)]
pub struct PgOrderRepository {
    conn: Conn,
}

impl PgOrderRepository {
    pub fn new(db: PgPool) -> Self {
        Self {
            conn: Conn::Pool(db),
        }
    }

    pub fn with_tx(&self, tx: &TxHandle) -> Self {
        Self {
            conn: Conn::Tx(tx.clone()),
        }
    }

    async fn page_where(
        &self,
        push_where: impl Fn(&mut QueryBuilder<'_, Postgres>) + Send,
        page: PageRequest,
    ) -> RepoResult<(Vec<Order>, u64)> {
        let mut conn = self.conn.acquire().await?;

        let mut count =
            QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {ORDER_TABLE}"));
        push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM {ORDER_TABLE}"));
        push_where(&mut select);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let orders = select.build_query_as::<Order>().fetch_all(&mut *conn).await?;

        Ok((orders, total.max(0) as u64))
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: NewOrder) -> RepoResult<Order> {
        let mut conn = self.conn.acquire().await?;
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO {ORDER_TABLE} (id, user_id, product_name, quantity, amount, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.product_name)
        .bind(order.quantity)
        .bind(order.amount)
        .bind(order.status)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    async fn update(&self, order: &Order) -> RepoResult<Order> {
        let mut conn = self.conn.acquire().await?;
        let row = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE {ORDER_TABLE}
            SET product_name = $2, quantity = $3, amount = $4, status = $5,
                updated_at = GREATEST(now(), updated_at)
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order.id)
        .bind(&order.product_name)
        .bind(order.quantity)
        .bind(order.amount)
        .bind(order.status)
        .fetch_optional(&mut *conn)
        .await?;
        row.ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let mut conn = self.conn.acquire().await?;
        let result = sqlx::query(&format!("DELETE FROM {ORDER_TABLE} WHERE id = $1"))
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> RepoResult<Order> {
        let mut conn = self.conn.acquire().await?;
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM {ORDER_TABLE} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        order.ok_or(RepoError::NotFound)
    }

    async fn find_by_user_id(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> RepoResult<(Vec<Order>, u64)> {
        let user_id = user_id.to_string();
        self.page_where(
            move |qb| {
                qb.push(" WHERE user_id = ").push_bind(user_id.clone());
            },
            page,
        )
        .await
    }

    async fn find_all_with_filters(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> RepoResult<(Vec<Order>, u64)> {
        self.page_where(|qb| filters.push_where(qb), page).await
    }
}

/// Opens transaction-scoped order repositories on the pool.
pub struct PgOrderTransactions {
    db: PgPool,
}

impl PgOrderTransactions {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Transactional<dyn OrderRepository> for PgOrderTransactions {
    async fn begin(&self) -> RepoResult<Scoped<dyn OrderRepository>> {
        let tx = TxHandle::begin(&self.db).await?;
        let repo: Arc<dyn OrderRepository> =
            Arc::new(PgOrderRepository::new(self.db.clone()).with_tx(&tx));
        Ok(Scoped::new(repo, Box::new(tx)))
    }
}
