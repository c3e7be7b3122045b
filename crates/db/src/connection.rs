use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::Mutex;
use tracing::info;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[derive(Clone, Debug)]
struct ConnectSettings {
    database_url: String,
    max_connections: u32,
    timeout_secs: u64,
}

/// Hands out a pool, opening it on first use and reopening it after it was
/// closed.
///
/// A manager built with [`ConnectionManager::from_pool`] has no URL to
/// reconnect with and reports `PoolClosed` once its pool is gone.
pub struct ConnectionManager {
    settings: Option<ConnectSettings>,
    pool: Mutex<Option<DbPool>>,
}

impl ConnectionManager {
    pub fn new(database_url: impl Into<String>, max_connections: u32, timeout_secs: u64) -> Self {
        Self {
            settings: Some(ConnectSettings {
                database_url: database_url.into(),
                max_connections,
                timeout_secs,
            }),
            pool: Mutex::new(None),
        }
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { settings: None, pool: Mutex::new(Some(pool)) }
    }

    pub async fn pool(&self) -> Result<DbPool, sqlx::Error> {
        let mut current = self.pool.lock().await;
        if let Some(pool) = current.as_ref().filter(|pool| !pool.is_closed()) {
            return Ok(pool.clone());
        }

        let Some(settings) = &self.settings else {
            return Err(sqlx::Error::PoolClosed);
        };

        let reconnect = current.is_some();
        let pool = connect_with_settings(
            &settings.database_url,
            settings.max_connections,
            settings.timeout_secs,
        )
        .await?;
        info!(
            event_name = "system.database.connected",
            reconnect,
            max_connections = settings.max_connections,
            "database pool opened"
        );

        *current = Some(pool.clone());
        Ok(pool)
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.lock().await.take() {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, ConnectionManager};

    #[tokio::test]
    async fn reopens_pool_after_close() {
        let manager = ConnectionManager::new("sqlite::memory:", 1, 5);

        let first = manager.pool().await.expect("open pool");
        first.close().await;
        assert!(first.is_closed());

        let second = manager.pool().await.expect("reopen pool");
        assert!(!second.is_closed());
        sqlx::query("SELECT 1").execute(&second).await.expect("query on reopened pool");
    }

    #[tokio::test]
    async fn borrowed_pool_cannot_reconnect() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        let manager = ConnectionManager::from_pool(pool.clone());

        assert!(manager.pool().await.is_ok());
        pool.close().await;
        assert!(matches!(manager.pool().await, Err(sqlx::Error::PoolClosed)));
    }
}
