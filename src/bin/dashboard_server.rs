use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;

use insight_dashboard::aggregation::{Aggregator, NetworkOptions};
use insight_dashboard::api;
use insight_dashboard::config::{AppConfig, DataSource};
use insight_dashboard::db_connect;
use insight_dashboard::env_loader;
use insight_dashboard::record_store::{self, MemoryStore, PgStore, RecordStore};
use insight_dashboard::schema;

#[tokio::main]
async fn main() -> Result<()> {
    env_loader::load_env();
    env_logger::init();

    info!("Starting dashboard API server...");
    let config = AppConfig::from_env();

    let store: Arc<dyn RecordStore> = match config.data_source {
        DataSource::JsonFile => {
            let records = record_store::load_json_file(&config.json_path).await?;
            Arc::new(MemoryStore::new(records))
        }
        DataSource::Postgres => Arc::new(connect_postgres(&config).await?),
    };

    let aggregator = Aggregator::new(store).with_network_options(NetworkOptions {
        min_occurrences: config.network_min_occurrences,
    });
    api::run_api(aggregator, config.bind_addr).await;
    Ok(())
}

/// Connects, ensures the records table, and seeds it from the JSON dataset on
/// first run.
async fn connect_postgres(config: &AppConfig) -> Result<PgStore> {
    let pool = db_connect::connect().await?;
    info!("Database connection pool established.");

    let client = pool.get().await.context("Failed to get DB client for schema setup")?;
    schema::create_records_table(&client, &config.schema, &config.table).await?;
    drop(client);

    if config.json_path.exists() {
        let records = record_store::load_json_file(&config.json_path).await?;
        schema::seed_if_empty(&pool, &config.schema, &config.table, &records).await?;
    } else {
        warn!("Dataset {:?} not found, skipping seed", config.json_path);
    }

    let (total, idle, in_use) = db_connect::get_pool_status(&pool);
    info!("Pool status: total={}, idle={}, in_use={}", total, idle, in_use);
    Ok(PgStore::new(pool, config.schema.clone(), config.table.clone()))
}
