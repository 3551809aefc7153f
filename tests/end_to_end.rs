use std::sync::Arc;
use std::time::Duration;

use insight_dashboard::aggregation::Aggregator;
use insight_dashboard::api;
use insight_dashboard::client::{DashboardApi, HttpDashboardApi};
use insight_dashboard::coordinator::FetchCoordinator;
use insight_dashboard::error::DashboardError;
use insight_dashboard::filters::{FilterField, PredicateSet};
use insight_dashboard::models::{Aggregate, DataKind, Record};
use insight_dashboard::record_store::MemoryStore;
use insight_dashboard::render::{render_dashboard, ChartDimensions};

fn records() -> Vec<Record> {
    ["Energy", "Energy", "Retail"]
        .iter()
        .enumerate()
        .map(|(i, sector)| Record {
            sector: sector.to_string(),
            topic: "oil".to_string(),
            region: "Asia".to_string(),
            country: "India".to_string(),
            end_year: "2020".to_string(),
            pestle: "Economic".to_string(),
            intensity: (i + 1) as f64,
            ..Default::default()
        })
        .collect()
}

fn spawn_server() -> String {
    let routes = api::routes(Aggregator::new(Arc::new(MemoryStore::new(records()))));
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{}", addr)
}

#[tokio::test]
async fn http_client_decodes_every_kind() {
    let api = HttpDashboardApi::new(spawn_server(), Duration::from_secs(5)).unwrap();
    let energy = PredicateSet::new().with(FilterField::Sector, "Energy");
    for kind in DataKind::ALL {
        let aggregate = api.fetch(kind, &energy).await.unwrap();
        assert_eq!(aggregate.kind(), kind);
    }
    match api.fetch(DataKind::Metrics, &energy).await.unwrap() {
        Aggregate::Metrics(m) => {
            assert_eq!(m.total_records, 2);
            assert_eq!(m.avg_intensity, 1.5);
        }
        other => panic!("unexpected payload {:?}", other),
    }
    assert_eq!(api.fetch_filter_options().await.unwrap().sectors, vec!["Energy", "Retail"]);
}

#[tokio::test]
async fn unreachable_server_is_a_network_failure() {
    let api = HttpDashboardApi::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = api.fetch(DataKind::Metrics, &PredicateSet::new()).await.unwrap_err();
    assert!(matches!(err, DashboardError::NetworkFailure(_)), "{:?}", err);
}

#[tokio::test]
async fn coordinator_renders_a_filtered_dashboard_over_http() {
    let api = HttpDashboardApi::new(spawn_server(), Duration::from_secs(5)).unwrap();
    let coordinator = FetchCoordinator::new(api);
    coordinator.init().await;
    let generation = coordinator
        .apply_filters(PredicateSet::new().with(FilterField::Sector, "Retail"))
        .await;
    coordinator.settle().await;

    let state = coordinator.snapshot().await;
    assert_eq!(state.generation, generation);
    assert!(state.notifications.is_empty(), "{:?}", state.notifications);

    let view = render_dashboard(&state, &ChartDimensions::default());
    assert_eq!(view.metrics.unwrap().total_records, 1);
    assert_eq!(view.record_count, Some(1));
    assert_eq!(view.geo.unwrap()[0].country, "India");
    assert_eq!(view.time_series.unwrap().points.len(), 1);
    assert!(!view.treemap.unwrap().is_empty());
    assert_eq!(view.network.unwrap().nodes.len(), 3);
}
