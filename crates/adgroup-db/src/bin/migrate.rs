use adgroup_core::config::load_config;
use adgroup_core::telemetry::init_tracing;
use adgroup_db::db::DbProvider;
use adgroup_db::db::connection::pool_from_config;
use adgroup_db::db::migrate::run_migrations;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = init_tracing("info")?;

    let config = load_config()?;
    filter.apply(&config.logging);

    tracing::info!("Running directory group migrations");

    let applied = run_migrations(&config.database.url).await?;

    tracing::info!(applied, "Database is up to date");

    // Confirms the configured pool settings can reach the migrated database.
    let pool = pool_from_config(&config.database).await?;
    drop(pool.get_connection().await?);

    Ok(())
}
