use serde::{Deserialize, Serialize};

use super::{scale_linear, ChartDimensions};
use crate::models::TimeSeriesPoint;

/// Which per-year figure the line plots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMetric {
    #[default]
    AverageIntensity,
    Intensity,
    Likelihood,
    Relevance,
    Count,
}

impl SeriesMetric {
    pub fn value_of(&self, point: &TimeSeriesPoint) -> f64 {
        match self {
            SeriesMetric::AverageIntensity => point.avg_intensity,
            SeriesMetric::Intensity => point.intensity,
            SeriesMetric::Likelihood => point.likelihood,
            SeriesMetric::Relevance => point.relevance,
            SeriesMetric::Count => point.count as f64,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SeriesMetric::AverageIntensity => "Average Intensity",
            SeriesMetric::Intensity => "Total Intensity",
            SeriesMetric::Likelihood => "Total Likelihood",
            SeriesMetric::Relevance => "Total Relevance",
            SeriesMetric::Count => "Records",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub year: f64,
    pub label: String,
    pub value: f64,
    pub count: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineChartInput {
    pub metric: SeriesMetric,
    pub y_axis_label: String,
    pub points: Vec<LinePoint>,
    pub x_domain: (f64, f64),
    pub y_domain: (f64, f64),
    /// Years that could not be placed on the time axis.
    pub skipped: Vec<String>,
}

/// Time-scaled line input. Points are sorted ascending by numeric year; the
/// y axis runs from 0 to the largest plotted value.
pub fn render_time_series(series: &[TimeSeriesPoint], metric: SeriesMetric, dims: &ChartDimensions) -> LineChartInput {
    let mut skipped = Vec::new();
    let mut placed: Vec<(f64, &TimeSeriesPoint)> = Vec::with_capacity(series.len());
    for point in series {
        match point.year.trim().parse::<f64>() {
            Ok(year) if year.is_finite() => placed.push((year, point)),
            _ => skipped.push(point.year.clone()),
        }
    }
    placed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let x_domain = match (placed.first(), placed.last()) {
        (Some(first), Some(last)) => (first.0, last.0),
        _ => (0.0, 0.0),
    };
    let y_max = placed
        .iter()
        .map(|(_, p)| metric.value_of(p))
        .fold(0.0_f64, f64::max);
    let y_domain = (0.0, y_max);

    let x_range = (dims.margin.left, dims.margin.left + dims.inner_width());
    let y_bottom = dims.margin.top + dims.inner_height();
    let y_range = (y_bottom, dims.margin.top);

    let points = placed
        .into_iter()
        .map(|(year, p)| {
            let value = metric.value_of(p);
            LinePoint {
                year,
                label: p.year.clone(),
                value,
                count: p.count,
                x: scale_linear(year, x_domain, x_range),
                y: if y_max > 0.0 { scale_linear(value, y_domain, y_range) } else { y_bottom },
            }
        })
        .collect();

    LineChartInput {
        metric,
        y_axis_label: metric.label().to_string(),
        points,
        x_domain,
        y_domain,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Margin;

    fn point(year: &str, intensity: f64, count: usize) -> TimeSeriesPoint {
        TimeSeriesPoint {
            year: year.to_string(),
            intensity,
            likelihood: 0.0,
            relevance: 0.0,
            count,
            avg_intensity: intensity / count as f64,
        }
    }

    #[test]
    fn sorts_numerically_and_scales_to_the_chart() {
        let series = vec![point("2030", 40.0, 4), point("2018", 10.0, 1), point("2024", 20.0, 4), point("n/a", 1.0, 1)];
        let dims = ChartDimensions::new(120.0, 120.0).with_margin(Margin::uniform(10.0));
        let chart = render_time_series(&series, SeriesMetric::Intensity, &dims);

        let labels: Vec<&str> = chart.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2018", "2024", "2030"]);
        assert_eq!(chart.skipped, vec!["n/a".to_string()]);
        assert_eq!(chart.x_domain, (2018.0, 2030.0));
        assert_eq!(chart.y_domain, (0.0, 40.0));
        assert_eq!(chart.points[0].x, 10.0);
        assert_eq!(chart.points[1].x, 60.0);
        assert_eq!(chart.points[2].x, 110.0);
        assert_eq!(chart.points[2].y, 10.0);
        assert_eq!(chart.points[1].y, 60.0);
    }

    #[test]
    fn all_zero_values_sit_on_the_axis() {
        let series = vec![point("2020", 0.0, 1)];
        let dims = ChartDimensions::new(100.0, 100.0).with_margin(Margin::uniform(0.0));
        let chart = render_time_series(&series, SeriesMetric::AverageIntensity, &dims);
        assert_eq!(chart.points[0].y, 100.0);
        assert_eq!(chart.points[0].x, 50.0);
    }

    #[test]
    fn empty_series_renders_empty_chart() {
        let chart = render_time_series(&[], SeriesMetric::Count, &ChartDimensions::default());
        assert!(chart.points.is_empty());
        assert_eq!(chart.y_axis_label, "Records");
    }
}
