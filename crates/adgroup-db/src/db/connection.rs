//! Connection pooling for the directory database.

use std::future::Future;
use std::pin::Pin;

use adgroup_core::config::DatabaseConfig;
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};

use crate::db::DbProvider;
use crate::error::DbResult;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection<'pool> = PooledConnection<'pool, AsyncPgConnection>;

/// ## Summary
/// Creates a pool of at most `size` connections to `database_url`.
///
/// Connections are checked on checkout so a restarted server does not hand
/// out dead connections.
///
/// ## Errors
/// Returns an error if the pool cannot be built for the URL.
#[tracing::instrument(skip(database_url), fields(pool_size = size))]
pub async fn create_pool(database_url: &str, size: u32) -> DbResult<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(size)
        .test_on_check_out(true)
        .build(manager)
        .await?;

    tracing::info!(pool_size = size, "Database pool ready");
    Ok(pool)
}

/// ## Summary
/// Creates the pool described by the `database` settings section.
///
/// ## Errors
/// Returns an error if the pool cannot be built for the configured URL.
pub async fn pool_from_config(config: &DatabaseConfig) -> DbResult<DbPool> {
    create_pool(&config.url, u32::from(config.max_connections)).await
}

impl DbProvider for DbPool {
    fn get_connection<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = DbResult<DbConnection<'a>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.get().await?) })
    }
}
