use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::ChartDimensions;
use crate::models::{NetworkAggregate, NodeType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceNode {
    pub id: String,
    pub name: String,
    pub group: NodeType,
    pub value: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceLink {
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub stroke_width: f64,
}

/// Input for a force-directed layout centred in the chart area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceGraphInput {
    pub nodes: Vec<ForceNode>,
    pub links: Vec<ForceLink>,
    pub neighbors: BTreeMap<String, BTreeSet<String>>,
    pub center: (f64, f64),
}

impl ForceGraphInput {
    /// Ids to keep highlighted while `id` is hovered: the node and its neighbours.
    pub fn highlight(&self, id: &str) -> BTreeSet<String> {
        let mut ids = self.neighbors.get(id).cloned().unwrap_or_default();
        if self.neighbors.contains_key(id) {
            ids.insert(id.to_string());
        }
        ids
    }
}

pub fn node_radius(value: f64) -> f64 {
    value.max(0.0).sqrt() * 3.0 + 5.0
}

pub fn render_network(aggregate: &NetworkAggregate, dims: &ChartDimensions) -> ForceGraphInput {
    let nodes: Vec<ForceNode> = aggregate
        .nodes
        .iter()
        .map(|n| ForceNode {
            id: n.id.clone(),
            name: n.name.clone(),
            group: n.node_type,
            value: n.value,
            radius: node_radius(n.value),
        })
        .collect();

    let mut neighbors: BTreeMap<String, BTreeSet<String>> =
        nodes.iter().map(|n| (n.id.clone(), BTreeSet::new())).collect();

    // A link with a dangling endpoint would crash the layout; drop it
    let links: Vec<ForceLink> = aggregate
        .links
        .iter()
        .filter(|l| neighbors.contains_key(&l.source) && neighbors.contains_key(&l.target))
        .map(|l| ForceLink {
            source: l.source.clone(),
            target: l.target.clone(),
            weight: l.weight,
            stroke_width: l.weight.max(1.0).sqrt(),
        })
        .collect();

    for link in &links {
        if let Some(set) = neighbors.get_mut(&link.source) {
            set.insert(link.target.clone());
        }
        if let Some(set) = neighbors.get_mut(&link.target) {
            set.insert(link.source.clone());
        }
    }

    ForceGraphInput {
        nodes,
        links,
        neighbors,
        center: (
            dims.margin.left + dims.inner_width() / 2.0,
            dims.margin.top + dims.inner_height() / 2.0,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NetworkLink, NetworkNode};

    fn node(node_type: NodeType, name: &str, value: f64) -> NetworkNode {
        NetworkNode {
            id: node_type.node_id(name),
            name: name.to_string(),
            node_type,
            value,
        }
    }

    fn link(source: &str, target: &str, weight: f64) -> NetworkLink {
        NetworkLink {
            source: source.to_string(),
            target: target.to_string(),
            weight,
        }
    }

    #[test]
    fn sizes_and_adjacency() {
        let aggregate = NetworkAggregate {
            nodes: vec![
                node(NodeType::Topic, "oil", 16.0),
                node(NodeType::Sector, "Energy", 0.0),
                node(NodeType::Region, "Asia", 4.0),
            ],
            links: vec![
                link("topic:oil", "sector:Energy", 4.0),
                link("topic:oil", "region:Asia", 1.0),
                link("topic:oil", "region:Nowhere", 1.0),
            ],
        };
        let graph = render_network(&aggregate, &ChartDimensions::new(800.0, 600.0));

        assert_eq!(graph.nodes[0].radius, 17.0);
        assert_eq!(graph.nodes[1].radius, 5.0);
        assert_eq!(graph.links.len(), 2);
        assert_eq!(graph.links[0].stroke_width, 2.0);
        assert_eq!(graph.center, (400.0, 300.0));

        let lit = graph.highlight("sector:Energy");
        assert!(lit.contains("sector:Energy"));
        assert!(lit.contains("topic:oil"));
        assert!(!lit.contains("region:Asia"));
        assert!(graph.highlight("missing").is_empty());
    }
}
