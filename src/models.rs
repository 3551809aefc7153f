use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Placeholder the dataset uses for a missing categorical value.
pub const UNKNOWN: &str = "Unknown";

/// Returns the value when it carries information, `None` for empty or "Unknown".
pub fn known(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == UNKNOWN {
        None
    } else {
        Some(value)
    }
}

/// One observational record from the dataset. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "lenient_text")]
    pub end_year: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start_year: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub intensity: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub likelihood: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub relevance: f64,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sector: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub topic: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub region: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pestle: String,
    // Descriptive fields, carried through but never aggregated
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub insight: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub impact: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub published: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub added: String,
}

/// Numeric fields: numbers pass through, numeric strings are parsed,
/// everything else (empty string, null, garbage) loads as 0.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let number = match raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if number.is_finite() { number } else { 0.0 })
}

/// Text fields: strings pass through, numbers become their decimal text
/// (`end_year: 2027`), null loads as empty.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::String(s) => s,
        Value::Number(n) => match n.as_i64() {
            Some(0) => String::new(),
            Some(i) => i.to_string(),
            None => match n.as_f64() {
                // Whole floats (`2020.0`) read the same as their integer form
                Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    if f == 0.0 {
                        String::new()
                    } else {
                        format!("{}", f as i64)
                    }
                }
                _ => n.to_string(),
            },
        },
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_records: usize,
    pub avg_intensity: f64,
    pub avg_likelihood: f64,
    pub avg_relevance: f64,
}

/// Distinct selectable values per filter field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub end_years: Vec<String>,
    pub topics: Vec<String>,
    pub sectors: Vec<String>,
    pub regions: Vec<String>,
    pub pests: Vec<String>,
    pub sources: Vec<String>,
    pub countries: Vec<String>,
    pub cities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Topic,
    Sector,
    Region,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Topic => "topic",
            NodeType::Sector => "sector",
            NodeType::Region => "region",
        }
    }

    /// Stable node id, unique per (type, name).
    pub fn node_id(&self, name: &str) -> String {
        format!("{}:{}", self.as_str(), name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Summed intensity of the records carrying this value.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLink {
    pub source: String,
    pub target: String,
    /// Number of records in which both endpoints co-occur.
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkAggregate {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
}

/// Node of the topic distribution tree. Leaves have an empty `children`
/// list, which is always serialized so the root keeps its shape when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub name: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub children: Vec<TopicNode>,
}

impl TopicNode {
    pub fn leaf(name: impl Into<String>, value: f64) -> Self {
        TopicNode {
            name: name.into(),
            value,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub year: String,
    pub intensity: f64,
    pub likelihood: f64,
    pub relevance: f64,
    pub count: usize,
    pub avg_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoAggregate {
    pub country: String,
    pub count: usize,
    pub intensity: f64,
    pub likelihood: f64,
    pub relevance: f64,
    pub avg_intensity: f64,
}

/// The data kinds the dashboard fetches independently of one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Metrics,
    Records,
    Network,
    TopicDistribution,
    TimeSeries,
    Geo,
}

impl DataKind {
    pub const ALL: [DataKind; 6] = [
        DataKind::Metrics,
        DataKind::Records,
        DataKind::Network,
        DataKind::TopicDistribution,
        DataKind::TimeSeries,
        DataKind::Geo,
    ];

    /// Endpoint path serving this kind.
    pub fn path(&self) -> &'static str {
        match self {
            DataKind::Metrics => "/api/metrics",
            DataKind::Records => "/api/data",
            DataKind::Network => "/api/network",
            DataKind::TopicDistribution => "/api/topic-distribution",
            DataKind::TimeSeries => "/api/timeseries",
            DataKind::Geo => "/api/geo",
        }
    }
}

/// One fetched payload, tagged by kind so consumers never inspect its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Aggregate {
    Metrics(MetricsSummary),
    Records(Vec<Record>),
    Network(NetworkAggregate),
    TopicDistribution(TopicNode),
    TimeSeries(Vec<TimeSeriesPoint>),
    Geo(Vec<GeoAggregate>),
}

impl Aggregate {
    pub fn kind(&self) -> DataKind {
        match self {
            Aggregate::Metrics(_) => DataKind::Metrics,
            Aggregate::Records(_) => DataKind::Records,
            Aggregate::Network(_) => DataKind::Network,
            Aggregate::TopicDistribution(_) => DataKind::TopicDistribution,
            Aggregate::TimeSeries(_) => DataKind::TimeSeries,
            Aggregate::Geo(_) => DataKind::Geo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_decodes_mixed_field_types() {
        let raw = r#"{
            "end_year": 2027, "start_year": "", "intensity": "", "likelihood": 3,
            "relevance": "2", "sector": "Energy", "topic": "oil", "region": null,
            "country": "India", "pestle": "Economic", "title": "t"
        }"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(record.end_year, "2027");
        assert_eq!(record.start_year, "");
        assert_eq!(record.intensity, 0.0);
        assert_eq!(record.likelihood, 3.0);
        assert_eq!(record.relevance, 2.0);
        assert_eq!(record.region, "");
        assert_eq!(record.city, "");
    }

    #[test]
    fn whole_float_years_match_integer_years() {
        let records: Vec<Record> =
            serde_json::from_str(r#"[{"end_year": 2020}, {"end_year": 2020.0}, {"end_year": 2020.5}, {"end_year": 0.0}]"#)
                .unwrap();
        let years: Vec<&str> = records.iter().map(|r| r.end_year.as_str()).collect();
        assert_eq!(years, vec!["2020", "2020", "2020.5", ""]);
    }

    #[test]
    fn known_skips_placeholders() {
        assert_eq!(known("Energy"), Some("Energy"));
        assert_eq!(known(""), None);
        assert_eq!(known("  "), None);
        assert_eq!(known(UNKNOWN), None);
    }

    #[test]
    fn aggregate_serializes_with_kind_tag() {
        let payload = Aggregate::Metrics(MetricsSummary::default());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "metrics");
        assert_eq!(json["data"]["total_records"], 0);
        assert_eq!(payload.kind(), DataKind::Metrics);
    }
}
