use serde::{Deserialize, Serialize};

use super::{scale_linear, ChartDimensions};
use crate::models::GeoAggregate;

/// Approximate country centroids as `(name, longitude, latitude)`, including
/// the aliases the dataset uses.
pub const COUNTRY_COORDINATES: &[(&str, f64, f64)] = &[
    ("United States of America", -95.7129, 37.0902),
    ("United States", -95.7129, 37.0902),
    ("USA", -95.7129, 37.0902),
    ("China", 104.1954, 35.8617),
    ("India", 78.9629, 20.5937),
    ("Russia", 105.3188, 61.5240),
    ("Brazil", -51.9253, -14.2350),
    ("Japan", 138.2529, 36.2048),
    ("Germany", 10.4515, 51.1657),
    ("United Kingdom", -3.4359, 55.3781),
    ("UK", -3.4359, 55.3781),
    ("France", 2.2137, 46.2276),
    ("Italy", 12.5674, 41.8719),
    ("Canada", -106.3468, 56.1304),
    ("Australia", 133.7751, -25.2744),
    ("South Korea", 127.7669, 35.9078),
    ("Mexico", -102.5528, 23.6345),
    ("Indonesia", 113.9213, -0.7893),
    ("Turkey", 35.2433, 38.9637),
    ("Saudi Arabia", 45.0792, 23.8859),
    ("Switzerland", 8.2275, 46.8182),
    ("Nigeria", 8.6753, 9.0820),
    ("South Africa", 22.9375, -30.5595),
    ("Egypt", 30.8025, 26.8206),
    ("Pakistan", 69.3451, 30.3753),
    ("Malaysia", 101.9758, 4.2105),
    ("Singapore", 103.8198, 1.3521),
    ("Thailand", 100.9925, 15.8700),
    ("Vietnam", 108.2772, 14.0583),
    ("Spain", -3.7492, 40.4637),
    ("Netherlands", 5.2913, 52.1326),
    ("Sweden", 18.6435, 60.1282),
    ("Norway", 8.4689, 60.4720),
    ("Denmark", 9.5018, 56.2639),
    ("Finland", 25.7482, 61.9241),
    ("Poland", 19.1451, 51.9194),
    ("Belgium", 4.4699, 50.5039),
    ("Austria", 14.5501, 47.5162),
    ("Greece", 21.8243, 39.0742),
    ("Portugal", -8.2245, 39.3999),
    ("Ireland", -8.2439, 53.4129),
    ("New Zealand", 174.8860, -40.9006),
    ("Argentina", -63.6167, -38.4161),
    ("Chile", -71.5430, -35.6751),
    ("Colombia", -74.2973, 4.5709),
    ("Peru", -75.0152, -9.1900),
    ("Venezuela", -66.5897, 6.4238),
    ("Global", 0.0, 0.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
    /// False when the country is not in the lookup and `(0, 0)` was used.
    pub resolved: bool,
}

/// Looks a country up by exact name, then case-insensitively. Unknown
/// countries fall back to `(0, 0)` with `resolved = false`.
pub fn resolve_coordinates(country: &str) -> Coordinates {
    let name = country.trim();
    COUNTRY_COORDINATES
        .iter()
        .find(|(n, _, _)| *n == name)
        .or_else(|| COUNTRY_COORDINATES.iter().find(|(n, _, _)| n.eq_ignore_ascii_case(name)))
        .map(|(_, longitude, latitude)| Coordinates {
            longitude: *longitude,
            latitude: *latitude,
            resolved: true,
        })
        .unwrap_or(Coordinates {
            longitude: 0.0,
            latitude: 0.0,
            resolved: false,
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub country: String,
    pub coordinates: Coordinates,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// Value relative to the largest value on the map, 0..=1, for the colour scale.
    pub color_intensity: f64,
    pub value: f64,
    pub count: usize,
}

pub const MIN_RADIUS: f64 = 4.0;
pub const MAX_RADIUS: f64 = 20.0;

/// Scatter input on an equirectangular projection, sized and coloured by
/// average intensity.
pub fn render_geo(aggregates: &[GeoAggregate], dims: &ChartDimensions) -> Vec<GeoPoint> {
    let max_value = aggregates.iter().map(|g| g.avg_intensity).fold(0.0_f64, f64::max);
    let value_domain = (0.0, if max_value > 0.0 { max_value } else { 1.0 });
    let x_range = (dims.margin.left, dims.margin.left + dims.inner_width());
    let y_range = (dims.margin.top, dims.margin.top + dims.inner_height());

    aggregates
        .iter()
        .map(|g| {
            let coordinates = resolve_coordinates(&g.country);
            GeoPoint {
                country: g.country.clone(),
                coordinates,
                x: scale_linear(coordinates.longitude, (-180.0, 180.0), x_range),
                y: scale_linear(coordinates.latitude, (90.0, -90.0), y_range),
                radius: scale_linear(g.avg_intensity.max(0.0), value_domain, (MIN_RADIUS, MAX_RADIUS)),
                color_intensity: scale_linear(g.avg_intensity.max(0.0), value_domain, (0.0, 1.0)),
                value: g.avg_intensity,
                count: g.count,
            }
        })
        .collect()
}
