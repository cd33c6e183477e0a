use std::sync::Arc;

use axum::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::common::{query::Filters, PageRequest, RepoError, RepoResult};
use crate::db::{Conn, Scoped, Transactional, TxHandle};
use crate::users::repo_types::{NewUser, User, USER_COLUMNS, USER_TABLE};

/// Persistence contract for users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts the user; the store assigns both timestamps.
    async fn create(&self, user: NewUser) -> RepoResult<User>;
    /// Writes name, email and status; `NotFound` if the id is unknown.
    async fn update(&self, user: &User) -> RepoResult<User>;
    async fn delete(&self, id: &str) -> RepoResult<()>;
    async fn find_by_id(&self, id: &str) -> RepoResult<User>;
    async fn find_by_email(&self, email: &str) -> RepoResult<User>;
    /// One page of users, newest first, plus the total matching count.
    async fn find_all_with_filters(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> RepoResult<(Vec<User>, u64)>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    conn: Conn,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self {
            conn: Conn::Pool(db),
        }
    }

    /// Same repository running inside `tx`.
    pub fn with_tx(&self, tx: &TxHandle) -> Self {
        Self {
            conn: Conn::Tx(tx.clone()),
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let mut conn = self.conn.acquire().await?;
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO {USER_TABLE} (id, name, email, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.status)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    async fn update(&self, user: &User) -> RepoResult<User> {
        let mut conn = self.conn.acquire().await?;
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE {USER_TABLE}
            SET name = $2, email = $3, status = $4,
                updated_at = GREATEST(now(), updated_at)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.status)
        .fetch_optional(&mut *conn)
        .await?;
        row.ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let mut conn = self.conn.acquire().await?;
        let result = sqlx::query(&format!("DELETE FROM {USER_TABLE} WHERE id = $1"))
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> RepoResult<User> {
        let mut conn = self.conn.acquire().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM {USER_TABLE} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        user.ok_or(RepoError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<User> {
        let mut conn = self.conn.acquire().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM {USER_TABLE} WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
        user.ok_or(RepoError::NotFound)
    }

    async fn find_all_with_filters(
        &self,
        filters: &Filters,
        page: PageRequest,
    ) -> RepoResult<(Vec<User>, u64)> {
        let mut conn = self.conn.acquire().await?;

        let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {USER_TABLE}"));
        filters.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM {USER_TABLE}"));
        filters.push_where(&mut select);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let users = select.build_query_as::<User>().fetch_all(&mut *conn).await?;

        Ok((users, total.max(0) as u64))
    }
}

/// Opens transaction-scoped user repositories on the pool.
pub struct PgUserTransactions {
    db: PgPool,
}

impl PgUserTransactions {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Transactional<dyn UserRepository> for PgUserTransactions {
    async fn begin(&self) -> RepoResult<Scoped<dyn UserRepository>> {
        let tx = TxHandle::begin(&self.db).await?;
        let repo: Arc<dyn UserRepository> =
            Arc::new(PgUserRepository::new(self.db.clone()).with_tx(&tx));
        Ok(Scoped::new(repo, Box::new(tx)))
    }
}
