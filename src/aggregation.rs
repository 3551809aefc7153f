use log::debug;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::DashboardError;
use crate::filters::PredicateSet;
use crate::models::{
    known, GeoAggregate, MetricsSummary, NetworkAggregate, NetworkLink, NetworkNode, NodeType, Record,
    TimeSeriesPoint, TopicNode,
};
use crate::record_store::RecordStore;

pub const TOPIC_ROOT: &str = "All Topics";
pub const OTHER_CATEGORY: &str = "Other";

/// Rounds to two decimal places, the precision the API reports averages at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Counts and field averages. All averages are 0 for an empty slice.
pub fn summarize(records: &[Record]) -> MetricsSummary {
    let total = records.len();
    let (intensity, likelihood, relevance) = records.iter().fold((0.0, 0.0, 0.0), |acc, r| {
        (acc.0 + r.intensity, acc.1 + r.likelihood, acc.2 + r.relevance)
    });
    MetricsSummary {
        total_records: total,
        avg_intensity: round2(mean(intensity, total)),
        avg_likelihood: round2(mean(likelihood, total)),
        avg_relevance: round2(mean(relevance, total)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkOptions {
    /// Categorical values seen in fewer records than this get no node.
    pub min_occurrences: usize,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        NetworkOptions { min_occurrences: 1 }
    }
}

fn categories(record: &Record) -> [(NodeType, &str); 3] {
    [
        (NodeType::Topic, record.topic.as_str()),
        (NodeType::Sector, record.sector.as_str()),
        (NodeType::Region, record.region.as_str()),
    ]
}

/// Co-occurrence graph of topic, sector and region values.
///
/// Node value is the summed intensity of the records carrying the value; a
/// link's weight is the number of records in which both endpoints appear.
pub fn build_network(records: &[Record], options: &NetworkOptions) -> NetworkAggregate {
    let mut occurrences: HashMap<(NodeType, &str), usize> = HashMap::new();
    for record in records {
        for (node_type, value) in categories(record) {
            if let Some(name) = known(value) {
                *occurrences.entry((node_type, name)).or_insert(0) += 1;
            }
        }
    }

    let mut graph = UnGraph::<NetworkNode, f64>::new_undirected();
    let mut node_map: HashMap<(NodeType, &str), NodeIndex> = HashMap::new();

    for record in records {
        let mut present: Vec<NodeIndex> = Vec::with_capacity(3);
        for (node_type, value) in categories(record) {
            let Some(name) = known(value) else { continue };
            if occurrences.get(&(node_type, name)).copied().unwrap_or(0) < options.min_occurrences {
                continue;
            }
            let idx = *node_map.entry((node_type, name)).or_insert_with(|| {
                graph.add_node(NetworkNode {
                    id: node_type.node_id(name),
                    name: name.to_string(),
                    node_type,
                    value: 0.0,
                })
            });
            graph[idx].value += record.intensity;
            present.push(idx);
        }

        for i in 0..present.len() {
            for j in (i + 1)..present.len() {
                let (a, b) = (present[i], present[j]);
                match graph.find_edge(a, b) {
                    Some(edge) => graph[edge] += 1.0,
                    None => {
                        graph.add_edge(a, b, 1.0);
                    }
                }
            }
        }
    }

    let links = graph
        .edge_references()
        .map(|edge| NetworkLink {
            source: graph[edge.source()].id.clone(),
            target: graph[edge.target()].id.clone(),
            weight: *edge.weight(),
        })
        .collect();
    let nodes = graph.node_indices().map(|idx| graph[idx].clone()).collect();

    debug!(
        "Built network with {} nodes and {} links from {} records",
        graph.node_count(),
        graph.edge_count(),
        records.len()
    );
    NetworkAggregate { nodes, links }
}

// Starts from +0.0: an empty `f64` sum is -0.0
fn sum_values(nodes: &[TopicNode]) -> f64 {
    nodes.iter().fold(0.0, |acc, node| acc + node.value)
}

/// Two-level hierarchy: root, one node per topic, one leaf per PESTLE
/// category within the topic. Leaf values are summed intensity and every
/// parent's value is the sum of its children.
pub fn build_topic_distribution(records: &[Record]) -> TopicNode {
    let mut topics: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for record in records {
        let Some(topic) = known(&record.topic) else { continue };
        let category = known(&record.pestle).unwrap_or(OTHER_CATEGORY);
        *topics.entry(topic).or_default().entry(category).or_insert(0.0) += record.intensity;
    }

    let children: Vec<TopicNode> = topics
        .into_iter()
        .map(|(topic, categories)| {
            let leaves: Vec<TopicNode> = categories
                .into_iter()
                .map(|(category, value)| TopicNode::leaf(category, value))
                .collect();
            TopicNode {
                name: topic.to_string(),
                value: sum_values(&leaves),
                children: leaves,
            }
        })
        .collect();

    TopicNode {
        name: TOPIC_ROOT.to_string(),
        value: sum_values(&children),
        children,
    }
}

#[derive(Default)]
struct Totals {
    intensity: f64,
    likelihood: f64,
    relevance: f64,
    count: usize,
}

impl Totals {
    fn add(&mut self, record: &Record) {
        self.intensity += record.intensity;
        self.likelihood += record.likelihood;
        self.relevance += record.relevance;
        self.count += 1;
    }
}

fn group_totals<'a, F>(records: &'a [Record], key: F) -> BTreeMap<&'a str, Totals>
where
    F: Fn(&'a Record) -> &'a str,
{
    let mut groups: BTreeMap<&str, Totals> = BTreeMap::new();
    for record in records {
        if let Some(k) = known(key(record)) {
            groups.entry(k).or_default().add(record);
        }
    }
    groups
}

/// One point per distinct known end year, ascending by year text.
pub fn build_time_series(records: &[Record]) -> Vec<TimeSeriesPoint> {
    group_totals(records, |r| r.end_year.as_str())
        .into_iter()
        .map(|(year, t)| TimeSeriesPoint {
            year: year.to_string(),
            intensity: t.intensity,
            likelihood: t.likelihood,
            relevance: t.relevance,
            count: t.count,
            avg_intensity: round2(mean(t.intensity, t.count)),
        })
        .collect()
}

/// One aggregate per distinct known country. Coordinates are resolved by the renderer.
pub fn build_geo(records: &[Record]) -> Vec<GeoAggregate> {
    group_totals(records, |r| r.country.as_str())
        .into_iter()
        .map(|(country, t)| GeoAggregate {
            country: country.to_string(),
            count: t.count,
            intensity: t.intensity,
            likelihood: t.likelihood,
            relevance: t.relevance,
            avg_intensity: round2(mean(t.intensity, t.count)),
        })
        .collect()
}

/// Aggregation layer over a record store. Every operation filters first,
/// then aggregates the matching records.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn RecordStore>,
    network_options: NetworkOptions,
}

impl Aggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Aggregator {
            store,
            network_options: NetworkOptions::default(),
        }
    }

    pub fn with_network_options(mut self, options: NetworkOptions) -> Self {
        self.network_options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn query_records(&self, predicates: &PredicateSet) -> Result<Vec<Record>, DashboardError> {
        let records = self.store.fetch(predicates).await?;
        debug!("{} records match {:?}", records.len(), predicates);
        Ok(records)
    }

    pub async fn compute_metrics(&self, predicates: &PredicateSet) -> Result<MetricsSummary, DashboardError> {
        Ok(summarize(&self.query_records(predicates).await?))
    }

    pub async fn compute_network(&self, predicates: &PredicateSet) -> Result<NetworkAggregate, DashboardError> {
        Ok(build_network(&self.query_records(predicates).await?, &self.network_options))
    }

    pub async fn compute_topic_distribution(&self, predicates: &PredicateSet) -> Result<TopicNode, DashboardError> {
        Ok(build_topic_distribution(&self.query_records(predicates).await?))
    }

    pub async fn compute_time_series(&self, predicates: &PredicateSet) -> Result<Vec<TimeSeriesPoint>, DashboardError> {
        Ok(build_time_series(&self.query_records(predicates).await?))
    }

    pub async fn compute_geo(&self, predicates: &PredicateSet) -> Result<Vec<GeoAggregate>, DashboardError> {
        Ok(build_geo(&self.query_records(predicates).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterField;
    use crate::record_store::MemoryStore;
    use std::collections::HashSet;

    fn rec(topic: &str, sector: &str, region: &str, intensity: f64) -> Record {
        Record {
            topic: topic.to_string(),
            sector: sector.to_string(),
            region: region.to_string(),
            intensity,
            ..Default::default()
        }
    }

    fn dataset() -> Vec<Record> {
        let mut records = vec![
            rec("oil", "Energy", "Asia", 1.0),
            rec("gas", "Energy", "Europe", 2.0),
            rec("oil", "Energy", "Asia", 3.0),
            rec("", "Energy", "", 4.0),
        ];
        for i in 0..6 {
            records.push(rec("growth", "Retail", "World", i as f64));
        }
        records[0].end_year = "2020".into();
        records[1].end_year = "2021".into();
        records[2].end_year = "2020".into();
        records[3].end_year = "Unknown".into();
        records[0].country = "India".into();
        records[2].country = "India".into();
        records[1].country = "".into();
        records[0].pestle = "Economic".into();
        records[2].pestle = "Industries".into();
        records
    }

    #[tokio::test]
    async fn sector_filter_metrics_scenario() {
        let aggregator = Aggregator::new(Arc::new(MemoryStore::new(dataset())));
        let predicates = PredicateSet::new().with(FilterField::Sector, "Energy");
        let metrics = aggregator.compute_metrics(&predicates).await.unwrap();
        assert_eq!(metrics.total_records, 4);
        assert_eq!(metrics.avg_intensity, 2.5);
        let records = aggregator.query_records(&predicates).await.unwrap();
        assert_eq!(metrics.total_records, records.len());
    }

    #[tokio::test]
    async fn empty_dataset_yields_zero_metrics_and_empty_aggregates() {
        let aggregator = Aggregator::new(Arc::new(MemoryStore::new(vec![])));
        let all = PredicateSet::new();
        assert_eq!(aggregator.compute_metrics(&all).await.unwrap(), MetricsSummary::default());
        assert!(aggregator.query_records(&all).await.unwrap().is_empty());
        assert_eq!(aggregator.compute_network(&all).await.unwrap(), NetworkAggregate::default());
        let tree = aggregator.compute_topic_distribution(&all).await.unwrap();
        assert!(tree.children.is_empty());
        assert!(tree.value == 0.0 && tree.value.is_sign_positive());
        let body = serde_json::to_string(&tree).unwrap();
        assert_eq!(body, r#"{"name":"All Topics","value":0.0,"children":[]}"#);
        assert!(aggregator.compute_time_series(&all).await.unwrap().is_empty());
        assert!(aggregator.compute_geo(&all).await.unwrap().is_empty());
    }

    #[test]
    fn averages_are_never_nan() {
        let metrics = summarize(&[]);
        assert!(!metrics.avg_intensity.is_nan());
        assert_eq!(metrics.avg_relevance, 0.0);
    }

    #[test]
    fn network_links_reference_existing_nodes() {
        let network = build_network(&dataset(), &NetworkOptions::default());
        let ids: HashSet<&str> = network.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(!network.links.is_empty());
        for link in &network.links {
            assert!(ids.contains(link.source.as_str()), "missing source {}", link.source);
            assert!(ids.contains(link.target.as_str()), "missing target {}", link.target);
        }
    }

    #[test]
    fn network_accumulates_values_and_weights() {
        let network = build_network(&dataset(), &NetworkOptions::default());
        let oil = network.nodes.iter().find(|n| n.id == "topic:oil").unwrap();
        assert_eq!(oil.value, 4.0);
        let energy = network.nodes.iter().find(|n| n.id == "sector:Energy").unwrap();
        assert_eq!(energy.value, 10.0);

        let oil_energy = network
            .links
            .iter()
            .find(|l| {
                (l.source == "topic:oil" && l.target == "sector:Energy")
                    || (l.source == "sector:Energy" && l.target == "topic:oil")
            })
            .unwrap();
        assert_eq!(oil_energy.weight, 2.0);
        // unordered pairs: one link per pair, never one per direction
        let growth_links = network
            .links
            .iter()
            .filter(|l| l.source == "topic:growth" || l.target == "topic:growth")
            .count();
        assert_eq!(growth_links, 2);
    }

    #[test]
    fn network_min_occurrences_drops_rare_values_and_their_links() {
        let network = build_network(&dataset(), &NetworkOptions { min_occurrences: 2 });
        assert!(network.nodes.iter().all(|n| n.id != "topic:gas"));
        assert!(network.nodes.iter().all(|n| n.id != "region:Europe"));
        assert!(network
            .links
            .iter()
            .all(|l| l.source != "topic:gas" && l.target != "topic:gas"));
    }

    fn assert_sums(node: &TopicNode) {
        if node.is_leaf() {
            return;
        }
        let sum: f64 = node.children.iter().map(|c| c.value).sum();
        assert!((node.value - sum).abs() < 1e-9, "{} = {} but children sum to {}", node.name, node.value, sum);
        node.children.iter().for_each(assert_sums);
    }

    #[test]
    fn topic_distribution_parents_sum_children() {
        let tree = build_topic_distribution(&dataset());
        assert_eq!(tree.name, TOPIC_ROOT);
        assert_sums(&tree);
        let oil = tree.children.iter().find(|c| c.name == "oil").unwrap();
        let names: Vec<&str> = oil.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Economic", "Industries"]);
        let growth = tree.children.iter().find(|c| c.name == "growth").unwrap();
        assert_eq!(growth.children[0].name, OTHER_CATEGORY);
        assert_eq!(growth.value, 15.0);
    }

    #[test]
    fn time_series_partitions_by_known_year() {
        let records = dataset();
        let series = build_time_series(&records);
        let years: Vec<&str> = series.iter().map(|p| p.year.as_str()).collect();
        assert_eq!(years, vec!["2020", "2021"]);
        let known_year_records = records.iter().filter(|r| known(&r.end_year).is_some()).count();
        assert_eq!(series.iter().map(|p| p.count).sum::<usize>(), known_year_records);
        assert_eq!(series[0].intensity, 4.0);
        assert_eq!(series[0].avg_intensity, 2.0);
    }

    #[test]
    fn geo_groups_known_countries() {
        let geo = build_geo(&dataset());
        assert_eq!(geo.len(), 1);
        assert_eq!(geo[0].country, "India");
        assert_eq!(geo[0].count, 2);
        assert_eq!(geo[0].intensity, 4.0);
    }
}
