use anyhow::{Context, Result};
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use log::info;
use std::time::Duration;
use tokio_postgres::{Config, NoTls};

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

const APPLICATION_NAME: &str = "insight_dashboard";

/// Connection settings for the records database, from `POSTGRES_*`.
#[derive(Debug, Clone, PartialEq)]
pub struct PgSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl PgSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        PgSettings {
            host: lookup("POSTGRES_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("POSTGRES_PORT")
                .and_then(|p| p.trim().parse::<u16>().ok())
                .unwrap_or(5432),
            dbname: lookup("POSTGRES_DB").unwrap_or_else(|| "visualization_db".to_string()),
            user: lookup("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string()),
            password: lookup("POSTGRES_PASSWORD").unwrap_or_default(),
        }
    }

    fn to_config(&self) -> Config {
        let mut config = Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password)
            .application_name(APPLICATION_NAME)
            .connect_timeout(Duration::from_secs(10));
        config
    }
}

/// Sizing for the request-serving pool. Each API request holds one
/// connection for a single `SELECT`.
#[derive(Debug, Clone, Copy)]
pub struct PoolSizing {
    pub max_size: u32,
    pub min_idle: Option<u32>,
    pub idle_timeout: Option<Duration>,
    pub connection_timeout: Duration,
}

impl Default for PoolSizing {
    fn default() -> Self {
        PoolSizing {
            max_size: 16,
            min_idle: Some(1),
            idle_timeout: Some(Duration::from_secs(180)),
            connection_timeout: Duration::from_secs(20),
        }
    }
}

/// Connects with settings from the environment and default sizing.
pub async fn connect() -> Result<PgPool> {
    connect_with(&PgSettings::from_env(), PoolSizing::default()).await
}

/// Builds the pool and checks it with `SELECT 1` before handing it out.
pub async fn connect_with(settings: &PgSettings, sizing: PoolSizing) -> Result<PgPool> {
    info!(
        "Connecting to PostgreSQL at {}:{}/{} as {}",
        settings.host, settings.port, settings.dbname, settings.user
    );
    let manager = PostgresConnectionManager::new(settings.to_config(), NoTls);

    let pool = Pool::builder()
        .max_size(sizing.max_size)
        .min_idle(sizing.min_idle)
        .idle_timeout(sizing.idle_timeout)
        .connection_timeout(sizing.connection_timeout)
        .build(manager)
        .await
        .with_context(|| format!("Failed to build connection pool for database {}", settings.dbname))?;

    {
        let conn = pool.get().await.context("Failed to get test connection from pool")?;
        conn.query_one("SELECT 1", &[])
            .await
            .context("Test query 'SELECT 1' failed")?;
    }
    info!("Connection pool ready (max_size: {}).", sizing.max_size);
    Ok(pool)
}

/// `(total, idle, in_use)` connection counts.
pub fn get_pool_status(pool: &PgPool) -> (usize, usize, usize) {
    let state = pool.state();
    let total = state.connections as usize;
    let idle = state.idle_connections as usize;
    (total, idle, total.saturating_sub(idle))
}
