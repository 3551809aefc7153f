use log::{error, info, warn};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

use crate::aggregation::Aggregator;
use crate::error::DashboardError;
use crate::filter_options::{list_filter_options, OptionsScope};
use crate::filters::PredicateSet;

type Query = HashMap<String, String>;

/// Starts the HTTP API and runs until the process exits.
pub async fn run_api(aggregator: Aggregator, address: SocketAddr) {
    info!("Starting dashboard API server at: {}", address);
    warp::serve(routes(aggregator)).run(address).await;
}

/// All `/api/*` routes with CORS, request logging and JSON error bodies.
pub fn routes(aggregator: Aggregator) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let log = warp::log::custom(|info| {
        info!(
            "method: {}, path: {}, status: {}, elapsed: {:?}",
            info.method(),
            info.path(),
            info.status().as_u16(),
            info.elapsed(),
        );
    });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    // GET /api/data
    let data = warp::path!("api" / "data")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_aggregator(aggregator.clone()))
        .and_then(data_handler);

    // GET /api/metrics
    let metrics = warp::path!("api" / "metrics")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_aggregator(aggregator.clone()))
        .and_then(metrics_handler);

    // GET /api/filters
    let filters = warp::path!("api" / "filters")
        .and(warp::get())
        .and(with_aggregator(aggregator.clone()))
        .and_then(filters_handler);

    // GET /api/network
    let network = warp::path!("api" / "network")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_aggregator(aggregator.clone()))
        .and_then(network_handler);

    // GET /api/topic-distribution
    let topic_distribution = warp::path!("api" / "topic-distribution")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_aggregator(aggregator.clone()))
        .and_then(topic_distribution_handler);

    // GET /api/timeseries
    let timeseries = warp::path!("api" / "timeseries")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_aggregator(aggregator.clone()))
        .and_then(timeseries_handler);

    // GET /api/geo
    let geo = warp::path!("api" / "geo")
        .and(warp::get())
        .and(warp::query::<Query>())
        .and(with_aggregator(aggregator))
        .and_then(geo_handler);

    data.or(metrics)
        .or(filters)
        .or(network)
        .or(topic_distribution)
        .or(timeseries)
        .or(geo)
        .with(cors)
        .recover(handle_rejection)
        .with(log)
}

fn with_aggregator(aggregator: Aggregator) -> impl Filter<Extract = (Aggregator,), Error = Infallible> + Clone {
    warp::any().map(move || aggregator.clone())
}

fn error_reply(err: &DashboardError) -> WithStatus<Json> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Rejected request: {}", err);
    }
    warp::reply::with_status(warp::reply::json(&json!({ "error": err.to_string() })), status)
}

fn respond<T: Serialize>(result: Result<T, DashboardError>) -> WithStatus<Json> {
    match result {
        Ok(body) => warp::reply::with_status(warp::reply::json(&body), StatusCode::OK),
        Err(err) => error_reply(&err),
    }
}

macro_rules! predicates_or_reply {
    ($query:expr) => {
        match PredicateSet::from_query(&$query) {
            Ok(predicates) => predicates,
            Err(err) => return Ok(error_reply(&err)),
        }
    };
}

async fn data_handler(query: Query, aggregator: Aggregator) -> Result<WithStatus<Json>, Rejection> {
    let predicates = predicates_or_reply!(query);
    Ok(respond(aggregator.query_records(&predicates).await))
}

async fn metrics_handler(query: Query, aggregator: Aggregator) -> Result<WithStatus<Json>, Rejection> {
    let predicates = predicates_or_reply!(query);
    Ok(respond(aggregator.compute_metrics(&predicates).await))
}

async fn filters_handler(aggregator: Aggregator) -> Result<WithStatus<Json>, Rejection> {
    Ok(respond(
        list_filter_options(aggregator.store().as_ref(), &OptionsScope::FullDataset).await,
    ))
}

async fn network_handler(query: Query, aggregator: Aggregator) -> Result<WithStatus<Json>, Rejection> {
    let predicates = predicates_or_reply!(query);
    Ok(respond(aggregator.compute_network(&predicates).await))
}

async fn topic_distribution_handler(query: Query, aggregator: Aggregator) -> Result<WithStatus<Json>, Rejection> {
    let predicates = predicates_or_reply!(query);
    Ok(respond(aggregator.compute_topic_distribution(&predicates).await))
}

async fn timeseries_handler(query: Query, aggregator: Aggregator) -> Result<WithStatus<Json>, Rejection> {
    let predicates = predicates_or_reply!(query);
    Ok(respond(aggregator.compute_time_series(&predicates).await))
}

async fn geo_handler(query: Query, aggregator: Aggregator) -> Result<WithStatus<Json>, Rejection> {
    let predicates = predicates_or_reply!(query);
    Ok(respond(aggregator.compute_geo(&predicates).await))
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else if let Some(e) = err.find::<warp::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, e.to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        code,
    ))
}
