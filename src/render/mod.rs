//! Pure reshaping of aggregates into the inputs chart primitives expect.
//!
//! Nothing here aggregates or mutates shared state: every function maps one
//! aggregate shape plus chart dimensions to a render model.

pub mod geo;
pub mod network;
pub mod timeseries;
pub mod treemap;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::coordinator::{DashboardState, Tab};
use crate::filters::PredicateSet;
use crate::models::{DataKind, MetricsSummary};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margin {
    pub fn uniform(size: f64) -> Self {
        Margin {
            top: size,
            right: size,
            bottom: size,
            left: size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartDimensions {
    pub width: f64,
    pub height: f64,
    pub margin: Margin,
}

impl ChartDimensions {
    pub fn new(width: f64, height: f64) -> Self {
        ChartDimensions {
            width,
            height,
            margin: Margin::uniform(20.0),
        }
    }

    pub fn with_margin(mut self, margin: Margin) -> Self {
        self.margin = margin;
        self
    }

    pub fn inner_width(&self) -> f64 {
        (self.width - self.margin.left - self.margin.right).max(0.0)
    }

    pub fn inner_height(&self) -> f64 {
        (self.height - self.margin.top - self.margin.bottom).max(0.0)
    }
}

impl Default for ChartDimensions {
    fn default() -> Self {
        ChartDimensions::new(800.0, 600.0)
    }
}

/// Linear map of `value` from `[d0, d1]` onto `[r0, r1]`. A degenerate
/// domain maps everything to the middle of the range.
pub fn scale_linear(value: f64, (d0, d1): (f64, f64), (r0, r1): (f64, f64)) -> f64 {
    if (d1 - d0).abs() < f64::EPSILON {
        return (r0 + r1) / 2.0;
    }
    r0 + (value - d0) / (d1 - d0) * (r1 - r0)
}

/// Every chart's render model for one dashboard state. Slots that have no
/// data yet render as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub generation: u64,
    pub filters: PredicateSet,
    pub active_tab: Tab,
    pub metrics: Option<MetricsSummary>,
    pub record_count: Option<usize>,
    pub network: Option<network::ForceGraphInput>,
    pub treemap: Option<Vec<treemap::TreemapTile>>,
    pub time_series: Option<timeseries::LineChartInput>,
    pub geo: Option<Vec<geo::GeoPoint>>,
    pub errors: BTreeMap<DataKind, String>,
    pub notifications: Vec<String>,
}

pub fn render_dashboard(state: &DashboardState, dims: &ChartDimensions) -> DashboardView {
    let errors = DataKind::ALL
        .iter()
        .filter_map(|kind| state.status(*kind).error.clone().map(|e| (*kind, e)))
        .collect();

    DashboardView {
        generation: state.generation,
        filters: state.filters.clone(),
        active_tab: state.active_tab,
        metrics: state.metrics.data.clone(),
        record_count: state.records.data.as_ref().map(Vec::len),
        network: state.network.data.as_ref().map(|n| network::render_network(n, dims)),
        treemap: state
            .topic_distribution
            .data
            .as_ref()
            .map(|t| treemap::render_treemap(t, dims)),
        time_series: state
            .time_series
            .data
            .as_ref()
            .map(|s| timeseries::render_time_series(s, timeseries::SeriesMetric::default(), dims)),
        geo: state.geo.data.as_ref().map(|g| geo::render_geo(g, dims)),
        errors,
        notifications: state.notifications.clone(),
    }
}
