use std::{future::Future, sync::Arc};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::DbConfig;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database unavailable after {attempts} attempt(s): {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Query(#[from] sqlx::Error),
}

impl DbError {
    /// Postgres `unique_violation` (SQLSTATE 23505).
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Query(sqlx::Error::Database(db)) => db.code().as_deref() == Some("23505"),
            _ => false,
        }
    }

    pub fn constraint(&self) -> Option<&str> {
        match self {
            DbError::Query(sqlx::Error::Database(db)) => db.constraint(),
            _ => None,
        }
    }
}

/// Errors that mean "the server could not be reached", as opposed to a query the
/// server rejected. Only these trigger a reconnect.
pub fn is_connectivity_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

struct Handle {
    pool: PgPool,
    generation: u64,
}

/// Process-wide connection manager. Cheap to clone; all clones share one pool handle.
#[derive(Clone)]
pub struct Database {
    handle: Arc<RwLock<Handle>>,
    settings: Arc<DbConfig>,
}

impl Database {
    /// Opens the pool, retrying with a fixed delay. Exhausting the attempts is fatal for
    /// the caller: there is nothing to serve without a database.
    pub async fn connect(settings: DbConfig) -> Result<Self, DbError> {
        let max = settings.max_retry_attempts.max(1);
        let mut attempt = 0;
        let pool = loop {
            attempt += 1;
            info!(attempt, max, "connecting to database");
            match open_pool(&settings).await {
                Ok(pool) => break pool,
                Err(e) if attempt >= max => {
                    error!(error = %e, attempts = attempt, "database unavailable, giving up");
                    return Err(DbError::Unavailable {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(error = %e, attempt, max, "database connection attempt failed");
                    tokio::time::sleep(settings.retry_delay()).await;
                }
            }
        };
        info!("database connected");
        Ok(Self::from_pool(pool, settings))
    }

    /// Pool that only dials on first use. Used by tests that never reach the database.
    pub fn lazy(settings: DbConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout())
            .connect_lazy(&settings.url)?;
        Ok(Self::from_pool(pool, settings))
    }

    fn from_pool(pool: PgPool, settings: DbConfig) -> Self {
        Self {
            handle: Arc::new(RwLock::new(Handle {
                pool,
                generation: 0,
            })),
            settings: Arc::new(settings),
        }
    }

    /// Current pool, reopened first if the last known handle was closed.
    pub async fn pool(&self) -> Result<PgPool, DbError> {
        let (pool, generation) = self.current().await;
        if !pool.is_closed() {
            return Ok(pool);
        }
        self.reconnect(generation).await
    }

    async fn current(&self) -> (PgPool, u64) {
        let guard = self.handle.read().await;
        (guard.pool.clone(), guard.generation)
    }

    /// Replaces the handle of `stale` generation. If another task already swapped it,
    /// the fresh pool is returned without dialing again.
    async fn reconnect(&self, stale: u64) -> Result<PgPool, DbError> {
        let mut guard = self.handle.write().await;
        if guard.generation != stale {
            return Ok(guard.pool.clone());
        }
        let fresh = open_pool(&self.settings)
            .await
            .map_err(|source| DbError::Unavailable {
                attempts: 1,
                source,
            })?;
        let old = std::mem::replace(&mut guard.pool, fresh);
        guard.generation += 1;
        info!(generation = guard.generation, "database handle replaced");
        tokio::spawn(async move { old.close().await });
        Ok(guard.pool.clone())
    }

    /// `query_with_retry` with the configured retry count.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, DbError>
    where
        F: FnMut(PgPool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        self.query_with_retry(self.settings.query_retries, op).await
    }

    /// Runs `op`, reconnecting and retrying up to `retries` times when it fails with a
    /// connectivity error. Any other error is returned immediately.
    pub async fn query_with_retry<T, F, Fut>(&self, retries: u32, mut op: F) -> Result<T, DbError>
    where
        F: FnMut(PgPool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let (pool, generation) = self.current().await;
            let err = match op(pool).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !is_connectivity_error(&err) {
                return Err(DbError::Query(err));
            }
            if attempt >= retries {
                error!(error = %err, attempts = attempt + 1, "database query failed, retries exhausted");
                return Err(DbError::Unavailable {
                    attempts: attempt + 1,
                    source: err,
                });
            }
            attempt += 1;
            warn!(error = %err, attempt, retries, "database connection lost, reconnecting");
            tokio::time::sleep(self.settings.retry_delay()).await;
            if let Err(e) = self.reconnect(generation).await {
                warn!(error = %e, attempt, "reconnect failed");
            }
        }
    }
}

async fn open_pool(settings: &DbConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .connect(&settings.url)
        .await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(pool)
}
