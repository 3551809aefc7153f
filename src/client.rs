use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::aggregation::Aggregator;
use crate::error::DashboardError;
use crate::filter_options::{list_filter_options, OptionsScope};
use crate::filters::PredicateSet;
use crate::models::{Aggregate, DataKind, FilterOptions};

/// The dashboard's view of the aggregation API.
#[async_trait]
pub trait DashboardApi: Send + Sync + 'static {
    async fn fetch(&self, kind: DataKind, predicates: &PredicateSet) -> Result<Aggregate, DashboardError>;

    async fn fetch_filter_options(&self) -> Result<FilterOptions, DashboardError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `DashboardApi` over HTTP.
#[derive(Clone)]
pub struct HttpDashboardApi {
    client: Client,
    base_url: String,
}

impl HttpDashboardApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DashboardError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpDashboardApi {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, predicates: &PredicateSet) -> Result<T, DashboardError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, predicates);
        let response = self
            .client
            .get(&url)
            .query(&predicates.to_query_pairs())
            .send()
            .await
            .map_err(|e| DashboardError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            warn!("GET {} failed with {}: {}", url, status, message);
            return Err(DashboardError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice::<T>(&bytes)?)
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn fetch(&self, kind: DataKind, predicates: &PredicateSet) -> Result<Aggregate, DashboardError> {
        let path = kind.path();
        Ok(match kind {
            DataKind::Metrics => Aggregate::Metrics(self.get_json(path, predicates).await?),
            DataKind::Records => Aggregate::Records(self.get_json(path, predicates).await?),
            DataKind::Network => Aggregate::Network(self.get_json(path, predicates).await?),
            DataKind::TopicDistribution => Aggregate::TopicDistribution(self.get_json(path, predicates).await?),
            DataKind::TimeSeries => Aggregate::TimeSeries(self.get_json(path, predicates).await?),
            DataKind::Geo => Aggregate::Geo(self.get_json(path, predicates).await?),
        })
    }

    async fn fetch_filter_options(&self) -> Result<FilterOptions, DashboardError> {
        self.get_json("/api/filters", &PredicateSet::new()).await
    }
}

/// `DashboardApi` answered directly by an in-process aggregator, for embedding
/// the dashboard next to its data without an HTTP hop.
#[derive(Clone)]
pub struct InProcessApi {
    aggregator: Aggregator,
}

impl InProcessApi {
    pub fn new(aggregator: Aggregator) -> Self {
        InProcessApi { aggregator }
    }
}

#[async_trait]
impl DashboardApi for InProcessApi {
    async fn fetch(&self, kind: DataKind, predicates: &PredicateSet) -> Result<Aggregate, DashboardError> {
        let aggregator = &self.aggregator;
        Ok(match kind {
            DataKind::Metrics => Aggregate::Metrics(aggregator.compute_metrics(predicates).await?),
            DataKind::Records => Aggregate::Records(aggregator.query_records(predicates).await?),
            DataKind::Network => Aggregate::Network(aggregator.compute_network(predicates).await?),
            DataKind::TopicDistribution => {
                Aggregate::TopicDistribution(aggregator.compute_topic_distribution(predicates).await?)
            }
            DataKind::TimeSeries => Aggregate::TimeSeries(aggregator.compute_time_series(predicates).await?),
            DataKind::Geo => Aggregate::Geo(aggregator.compute_geo(predicates).await?),
        })
    }

    async fn fetch_filter_options(&self) -> Result<FilterOptions, DashboardError> {
        list_filter_options(self.aggregator.store().as_ref(), &OptionsScope::FullDataset).await
    }
}
