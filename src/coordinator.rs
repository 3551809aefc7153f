use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::client::DashboardApi;
use crate::error::DashboardError;
use crate::filters::PredicateSet;
use crate::models::{
    Aggregate, DataKind, FilterOptions, GeoAggregate, MetricsSummary, NetworkAggregate, Record, TimeSeriesPoint,
    TopicNode,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Overview,
    Network,
    Topics,
    TimeSeries,
    Geo,
}

/// Loading/error bookkeeping for one data slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub loading: bool,
    pub error: Option<String>,
    /// Filter generation the current data was fetched for.
    pub generation: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot<T> {
    pub status: SlotStatus,
    pub data: Option<T>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            status: SlotStatus::default(),
            data: None,
        }
    }
}

/// Everything the dashboard shows. Only `apply` mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardState {
    pub filters: PredicateSet,
    /// Identity of the latest filter change; responses tagged otherwise are stale.
    pub generation: u64,
    pub active_tab: Tab,
    pub filter_options: Slot<FilterOptions>,
    pub metrics: Slot<MetricsSummary>,
    pub records: Slot<Vec<Record>>,
    pub network: Slot<NetworkAggregate>,
    pub topic_distribution: Slot<TopicNode>,
    pub time_series: Slot<Vec<TimeSeriesPoint>>,
    pub geo: Slot<Vec<GeoAggregate>>,
    /// Transient user-visible error messages, one per failed fetch.
    pub notifications: Vec<String>,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub enum Action {
    FiltersChanged { generation: u64, filters: PredicateSet },
    FetchCompleted {
        generation: u64,
        kind: DataKind,
        outcome: Result<Aggregate, DashboardError>,
    },
    FilterOptionsRequested,
    FilterOptionsLoaded(Result<FilterOptions, DashboardError>),
    SelectTab(Tab),
    DismissNotification(usize),
    Closed,
}

impl DashboardState {
    pub fn status(&self, kind: DataKind) -> &SlotStatus {
        match kind {
            DataKind::Metrics => &self.metrics.status,
            DataKind::Records => &self.records.status,
            DataKind::Network => &self.network.status,
            DataKind::TopicDistribution => &self.topic_distribution.status,
            DataKind::TimeSeries => &self.time_series.status,
            DataKind::Geo => &self.geo.status,
        }
    }

    fn status_mut(&mut self, kind: DataKind) -> &mut SlotStatus {
        match kind {
            DataKind::Metrics => &mut self.metrics.status,
            DataKind::Records => &mut self.records.status,
            DataKind::Network => &mut self.network.status,
            DataKind::TopicDistribution => &mut self.topic_distribution.status,
            DataKind::TimeSeries => &mut self.time_series.status,
            DataKind::Geo => &mut self.geo.status,
        }
    }

    fn clear_data(&mut self, kind: DataKind) {
        match kind {
            DataKind::Metrics => self.metrics.data = None,
            DataKind::Records => self.records.data = None,
            DataKind::Network => self.network.data = None,
            DataKind::TopicDistribution => self.topic_distribution.data = None,
            DataKind::TimeSeries => self.time_series.data = None,
            DataKind::Geo => self.geo.data = None,
        }
    }

    fn store_data(&mut self, aggregate: Aggregate) {
        match aggregate {
            Aggregate::Metrics(d) => self.metrics.data = Some(d),
            Aggregate::Records(d) => self.records.data = Some(d),
            Aggregate::Network(d) => self.network.data = Some(d),
            Aggregate::TopicDistribution(d) => self.topic_distribution.data = Some(d),
            Aggregate::TimeSeries(d) => self.time_series.data = Some(d),
            Aggregate::Geo(d) => self.geo.data = Some(d),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.filter_options.status.loading || DataKind::ALL.iter().any(|kind| self.status(*kind).loading)
    }

    /// Applies one action. Returns false when the action was discarded
    /// (stale generation, or the dashboard was closed).
    pub fn apply(&mut self, action: Action) -> bool {
        if self.closed {
            return false;
        }
        match action {
            Action::FiltersChanged { generation, filters } => {
                if generation <= self.generation {
                    return false;
                }
                self.generation = generation;
                self.filters = filters;
                for kind in DataKind::ALL {
                    let status = self.status_mut(kind);
                    status.loading = true;
                    status.error = None;
                }
                true
            }
            Action::FetchCompleted {
                generation,
                kind,
                outcome,
            } => {
                if generation != self.generation {
                    return false;
                }
                let outcome = outcome.and_then(|aggregate| {
                    if aggregate.kind() == kind {
                        Ok(aggregate)
                    } else {
                        Err(DashboardError::MalformedResponse(format!(
                            "expected {:?} payload, got {:?}",
                            kind,
                            aggregate.kind()
                        )))
                    }
                });
                match outcome {
                    Ok(aggregate) => {
                        self.store_data(aggregate);
                        let status = self.status_mut(kind);
                        status.loading = false;
                        status.error = None;
                        status.generation = generation;
                        status.updated_at = Some(Utc::now());
                    }
                    Err(err) => {
                        // Never leave data from another filter set on screen
                        self.clear_data(kind);
                        let status = self.status_mut(kind);
                        status.loading = false;
                        status.error = Some(err.to_string());
                        status.generation = generation;
                        self.notifications.push(format!("Error loading {:?}: {}", kind, err));
                    }
                }
                true
            }
            Action::FilterOptionsRequested => {
                self.filter_options.status.loading = true;
                self.filter_options.status.error = None;
                true
            }
            Action::FilterOptionsLoaded(outcome) => {
                let status = &mut self.filter_options.status;
                status.loading = false;
                status.updated_at = Some(Utc::now());
                match outcome {
                    Ok(options) => {
                        status.error = None;
                        self.filter_options.data = Some(options);
                    }
                    Err(err) => {
                        status.error = Some(err.to_string());
                        self.notifications.push(format!("Error loading filter options: {}", err));
                    }
                }
                true
            }
            Action::SelectTab(tab) => {
                self.active_tab = tab;
                true
            }
            Action::DismissNotification(index) => {
                if index < self.notifications.len() {
                    self.notifications.remove(index);
                    true
                } else {
                    false
                }
            }
            Action::Closed => {
                self.closed = true;
                true
            }
        }
    }
}

/// Drives the dashboard's fetches. Every filter change fans out one request
/// per data kind in parallel; each request is tagged with the generation of
/// the change that issued it, and superseded requests are aborted.
pub struct FetchCoordinator<A: DashboardApi> {
    api: Arc<A>,
    state: Arc<Mutex<DashboardState>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl<A: DashboardApi> FetchCoordinator<A> {
    pub fn new(api: A) -> Self {
        FetchCoordinator {
            api: Arc::new(api),
            state: Arc::new(Mutex::new(DashboardState::default())),
            in_flight: Mutex::new(Vec::new()),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Initial load: filter options once, then every data kind unfiltered.
    pub async fn init(&self) -> u64 {
        self.load_filter_options().await;
        self.apply_filters(PredicateSet::new()).await
    }

    async fn load_filter_options(&self) {
        self.state.lock().await.apply(Action::FilterOptionsRequested);
        let api = self.api.clone();
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            let outcome = api.fetch_filter_options().await;
            if let Err(e) = &outcome {
                warn!("Filter options fetch failed: {}", e);
            }
            state.lock().await.apply(Action::FilterOptionsLoaded(outcome));
        });
        self.background.lock().await.push(handle);
    }

    /// Switches to `filters` and re-fetches everything for them. Returns the
    /// generation assigned to this change.
    pub async fn apply_filters(&self, filters: PredicateSet) -> u64 {
        // Held for the whole dispatch so overlapping changes abort and spawn in order
        let mut in_flight = self.in_flight.lock().await;

        let generation = {
            let mut state = self.state.lock().await;
            let generation = state.generation + 1;
            if !state.apply(Action::FiltersChanged {
                generation,
                filters: filters.clone(),
            }) {
                debug!("Filter change ignored, dashboard closed");
                return state.generation;
            }
            generation
        };

        for handle in in_flight.drain(..) {
            handle.abort();
        }

        info!("Dispatching generation {} for {:?}", generation, filters);
        for kind in DataKind::ALL {
            let api = self.api.clone();
            let state = self.state.clone();
            let filters = filters.clone();
            in_flight.push(tokio::spawn(async move {
                let outcome = api.fetch(kind, &filters).await;
                if let Err(e) = &outcome {
                    warn!("Fetch of {:?} for generation {} failed: {}", kind, generation, e);
                }
                let applied = state.lock().await.apply(Action::FetchCompleted {
                    generation,
                    kind,
                    outcome,
                });
                if !applied {
                    debug!("Discarded stale {:?} response for generation {}", kind, generation);
                }
            }));
        }
        generation
    }

    /// Re-issues every data fetch for the current filters.
    pub async fn refresh(&self) -> u64 {
        let filters = self.state.lock().await.filters.clone();
        self.apply_filters(filters).await
    }

    pub async fn select_tab(&self, tab: Tab) {
        self.state.lock().await.apply(Action::SelectTab(tab));
    }

    pub async fn dismiss_notification(&self, index: usize) -> bool {
        self.state.lock().await.apply(Action::DismissNotification(index))
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.lock().await.clone()
    }

    /// Waits until every outstanding fetch has finished or been aborted.
    pub async fn settle(&self) {
        loop {
            let mut handles = std::mem::take(&mut *self.in_flight.lock().await);
            handles.append(&mut *self.background.lock().await);
            if handles.is_empty() {
                return;
            }
            for result in join_all(handles).await {
                if let Err(e) = result {
                    if !e.is_cancelled() {
                        warn!("Fetch task failed: {}", e);
                    }
                }
            }
        }
    }

    /// Abandons in-flight requests. No state write happens after this returns.
    pub async fn shutdown(&self) {
        let mut in_flight = self.in_flight.lock().await;
        for handle in in_flight.drain(..).chain(self.background.lock().await.drain(..)) {
            handle.abort();
        }
        self.state.lock().await.apply(Action::Closed);
        info!("Dashboard coordinator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Aggregator;
    use crate::client::InProcessApi;
    use crate::filters::FilterField;
    use crate::record_store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;

    fn records() -> Vec<Record> {
        let mut out = Vec::new();
        for (sector, intensity) in [("Energy", 1.0), ("Energy", 3.0), ("Retail", 10.0)] {
            out.push(Record {
                sector: sector.to_string(),
                topic: "oil".to_string(),
                country: "India".to_string(),
                end_year: "2020".to_string(),
                intensity,
                ..Default::default()
            });
        }
        out
    }

    /// In-process API with per-filter-set latency and injectable failures.
    struct SlowApi {
        inner: InProcessApi,
        slow_filters: PredicateSet,
        slow_delay: Duration,
        failing: HashSet<DataKind>,
    }

    impl SlowApi {
        fn new(slow_filters: PredicateSet, slow_delay: Duration) -> Self {
            let store = Arc::new(MemoryStore::new(records()));
            SlowApi {
                inner: InProcessApi::new(Aggregator::new(store)),
                slow_filters,
                slow_delay,
                failing: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl DashboardApi for SlowApi {
        async fn fetch(&self, kind: DataKind, predicates: &PredicateSet) -> Result<Aggregate, DashboardError> {
            if *predicates == self.slow_filters {
                tokio::time::sleep(self.slow_delay).await;
            } else {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            if self.failing.contains(&kind) {
                return Err(DashboardError::HttpStatus {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            self.inner.fetch(kind, predicates).await
        }

        async fn fetch_filter_options(&self) -> Result<FilterOptions, DashboardError> {
            self.inner.fetch_filter_options().await
        }
    }

    #[tokio::test]
    async fn newer_filter_change_wins_over_slower_stale_one() {
        let energy = PredicateSet::new().with(FilterField::Sector, "Energy");
        let retail = PredicateSet::new().with(FilterField::Sector, "Retail");
        let coordinator = FetchCoordinator::new(SlowApi::new(energy.clone(), Duration::from_millis(200)));

        coordinator.apply_filters(energy).await;
        let latest = coordinator.apply_filters(retail.clone()).await;
        coordinator.settle().await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        let state = coordinator.snapshot().await;
        assert_eq!(state.generation, latest);
        assert_eq!(state.filters, retail);
        let metrics = state.metrics.data.as_ref().unwrap();
        assert_eq!(metrics.total_records, 1);
        assert_eq!(metrics.avg_intensity, 10.0);
        for kind in DataKind::ALL {
            assert!(!state.status(kind).loading);
            assert_eq!(state.status(kind).generation, latest);
        }
    }

    #[tokio::test]
    async fn one_failing_kind_does_not_blank_the_others() {
        let mut api = SlowApi::new(PredicateSet::new().with(FilterField::City, "nowhere"), Duration::ZERO);
        api.failing.insert(DataKind::Geo);
        let coordinator = FetchCoordinator::new(api);

        coordinator.init().await;
        coordinator.settle().await;

        let state = coordinator.snapshot().await;
        assert!(state.geo.data.is_none());
        assert!(state.geo.status.error.as_deref().unwrap().contains("boom"));
        assert_eq!(state.metrics.data.as_ref().unwrap().total_records, 3);
        assert!(state.network.data.is_some());
        assert!(state.filter_options.data.is_some());
        assert_eq!(state.notifications.len(), 1);
        assert!(!state.is_loading());

        assert!(coordinator.dismiss_notification(0).await);
        assert!(coordinator.snapshot().await.notifications.is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_state_writes() {
        let slow = PredicateSet::new();
        let coordinator = FetchCoordinator::new(SlowApi::new(slow.clone(), Duration::from_millis(100)));
        coordinator.apply_filters(slow).await;
        coordinator.shutdown().await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        let state = coordinator.snapshot().await;
        assert!(state.closed);
        assert!(state.metrics.data.is_none());
        assert!(!coordinator.snapshot().await.apply(Action::SelectTab(Tab::Geo)));
    }

    #[test]
    fn stale_generation_responses_are_discarded() {
        let mut state = DashboardState::default();
        assert!(state.apply(Action::FiltersChanged {
            generation: 1,
            filters: PredicateSet::new()
        }));
        assert!(state.apply(Action::FiltersChanged {
            generation: 2,
            filters: PredicateSet::new().with(FilterField::Region, "Asia")
        }));
        let stale = Action::FetchCompleted {
            generation: 1,
            kind: DataKind::Metrics,
            outcome: Ok(Aggregate::Metrics(MetricsSummary {
                total_records: 99,
                ..Default::default()
            })),
        };
        assert!(!state.apply(stale));
        assert!(state.metrics.data.is_none());
        assert!(state.metrics.status.loading);

        // an older change arriving late never rolls the generation back
        assert!(!state.apply(Action::FiltersChanged {
            generation: 1,
            filters: PredicateSet::new()
        }));
        assert_eq!(state.generation, 2);
    }

    #[test]
    fn mismatched_payload_is_a_malformed_response() {
        let mut state = DashboardState::default();
        state.apply(Action::FiltersChanged {
            generation: 1,
            filters: PredicateSet::new(),
        });
        state.apply(Action::FetchCompleted {
            generation: 1,
            kind: DataKind::Geo,
            outcome: Ok(Aggregate::Records(vec![])),
        });
        assert!(state.geo.status.error.as_deref().unwrap().starts_with("Malformed response"));
        assert!(state.records.data.is_none());
    }

    #[test]
    fn tab_selection_goes_through_the_reducer() {
        let mut state = DashboardState::default();
        assert_eq!(state.active_tab, Tab::Overview);
        state.apply(Action::SelectTab(Tab::Network));
        assert_eq!(state.active_tab, Tab::Network);
    }
}
