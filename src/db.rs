use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use sqlx::{
    pool::PoolConnection, postgres::PgPoolOptions, PgConnection, PgPool, Postgres, Transaction,
};
use tokio::sync::{Mutex, MutexGuard};

use crate::common::{RepoError, RepoResult};
use crate::config::DatabaseConfig;

pub type PgTx = Transaction<'static, Postgres>;

pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.url)
        .await
        .context("connect to database")
}

/// Shared handle to an open transaction. Repositories bound to the same
/// handle run their statements inside that transaction.
#[derive(Clone)]
pub struct TxHandle(Arc<Mutex<PgTx>>);

impl TxHandle {
    pub async fn begin(pool: &PgPool) -> RepoResult<Self> {
        let tx = pool.begin().await?;
        Ok(Self(Arc::new(Mutex::new(tx))))
    }

    fn into_inner(self) -> RepoResult<PgTx> {
        Arc::try_unwrap(self.0)
            .map(Mutex::into_inner)
            .map_err(|_| RepoError::TxFinished)
    }
}

/// Where a repository sends its statements.
#[derive(Clone)]
pub enum Conn {
    Pool(PgPool),
    Tx(TxHandle),
}

impl Conn {
    pub async fn acquire(&self) -> RepoResult<ConnGuard<'_>> {
        match self {
            Conn::Pool(pool) => Ok(ConnGuard::Pooled(pool.acquire().await?)),
            Conn::Tx(handle) => Ok(ConnGuard::Tx(handle.0.lock().await)),
        }
    }
}

pub enum ConnGuard<'a> {
    Pooled(PoolConnection<Postgres>),
    Tx(MutexGuard<'a, PgTx>),
}

impl Deref for ConnGuard<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            ConnGuard::Pooled(conn) => conn,
            ConnGuard::Tx(tx) => tx,
        }
    }
}

impl DerefMut for ConnGuard<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            ConnGuard::Pooled(conn) => &mut **conn,
            ConnGuard::Tx(tx) => &mut ***tx,
        }
    }
}

/// Completion side of a unit of work.
#[async_trait]
pub trait TxControl: Send + Sync {
    async fn commit(self: Box<Self>) -> RepoResult<()>;
    async fn rollback(self: Box<Self>) -> RepoResult<()>;
}

#[async_trait]
impl TxControl for TxHandle {
    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let tx = (*self).into_inner()?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        // A handle still shared elsewhere rolls back when its last clone drops.
        match (*self).into_inner() {
            Ok(tx) => {
                tx.rollback().await?;
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }
}

/// A repository scoped to one transaction, plus the means to finish it.
pub struct Scoped<R: ?Sized> {
    repo: Arc<R>,
    tx: Box<dyn TxControl>,
}

impl<R: ?Sized> Scoped<R> {
    pub fn new(repo: Arc<R>, tx: Box<dyn TxControl>) -> Self {
        Self { repo, tx }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub async fn commit(self) -> RepoResult<()> {
        let Scoped { repo, tx } = self;
        drop(repo);
        tx.commit().await
    }

    pub async fn rollback(self) -> RepoResult<()> {
        let Scoped { repo, tx } = self;
        drop(repo);
        tx.rollback().await
    }
}

/// Capability of a store to open a transaction-scoped variant of `R`.
#[async_trait]
pub trait Transactional<R: ?Sized + Send + Sync>: Send + Sync {
    async fn begin(&self) -> RepoResult<Scoped<R>>;
}
