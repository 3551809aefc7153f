use log::{info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where the server loads its records from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    JsonFile,
    Postgres,
}

/// Runtime configuration, read from the environment after `.env` loading.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_source: DataSource,
    pub json_path: PathBuf,
    pub schema: String,
    pub table: String,
    pub api_url: String,
    pub request_timeout: Duration,
    /// Records a topic/sector/region value must appear in to get a network node.
    pub network_min_occurrences: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            data_source: DataSource::JsonFile,
            json_path: PathBuf::from("jsondata.json"),
            schema: "dashboard".to_string(),
            table: "records".to_string(),
            api_url: "http://127.0.0.1:5000".to_string(),
            request_timeout: Duration::from_secs(30),
            network_min_occurrences: 1,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup. Unparseable values
    /// fall back to the default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let bind_addr = parse_or("DASHBOARD_BIND_ADDR", lookup("DASHBOARD_BIND_ADDR"), defaults.bind_addr);
        let data_source = match lookup("DASHBOARD_DATA_SOURCE").as_deref().map(str::trim) {
            None | Some("") | Some("json") => DataSource::JsonFile,
            Some("postgres") | Some("pg") => DataSource::Postgres,
            Some(other) => {
                warn!("Unknown DASHBOARD_DATA_SOURCE '{}', using json", other);
                DataSource::JsonFile
            }
        };
        let timeout_secs = parse_or(
            "DASHBOARD_REQUEST_TIMEOUT_SECS",
            lookup("DASHBOARD_REQUEST_TIMEOUT_SECS"),
            defaults.request_timeout.as_secs(),
        );
        let network_min_occurrences = parse_or(
            "DASHBOARD_NETWORK_MIN_OCCURRENCES",
            lookup("DASHBOARD_NETWORK_MIN_OCCURRENCES"),
            defaults.network_min_occurrences,
        )
        .max(1);

        let config = AppConfig {
            bind_addr,
            data_source,
            json_path: lookup("DASHBOARD_JSON_PATH").map(PathBuf::from).unwrap_or(defaults.json_path),
            schema: non_empty(lookup("DASHBOARD_SCHEMA")).unwrap_or(defaults.schema),
            table: non_empty(lookup("DASHBOARD_TABLE")).unwrap_or(defaults.table),
            api_url: non_empty(lookup("DASHBOARD_API_URL"))
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            request_timeout: Duration::from_secs(timeout_secs),
            network_min_occurrences,
        };
        info!(
            "Config: bind={}, source={:?}, table={}.{}, api_url={}",
            config.bind_addr, config.data_source, config.schema, config.table, config.api_url
        );
        config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match non_empty(value) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for {}, using default", raw, key);
            default
        }),
    }
}
