use std::collections::HashSet;

use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use crate::models::schema::{GraphEdge, GraphNode};

/// Build the incomer/outgoer adjacency index for one traversal. GraphMap
/// admits no parallel edges, so multiple edges between the same pair of
/// nodes collapse to a single incomer, and neighbor iteration follows edge
/// insertion order.
pub fn adjacency<'a>(nodes: &'a [GraphNode], edges: &'a [GraphEdge]) -> DiGraphMap<&'a str, ()> {
    let mut graph = DiGraphMap::new();
    for node in nodes {
        graph.add_node(node.id.as_str());
    }
    for edge in edges {
        if graph.contains_node(edge.source.as_str()) && graph.contains_node(edge.target.as_str()) {
            graph.add_edge(edge.source.as_str(), edge.target.as_str(), ());
        }
    }
    graph
}

/// Ordered dependency path ending at `node`: every ancestor appears before
/// the node itself.
///
/// Restartable and cycle-safe: a node already in `visited` terminates its
/// branch, and each incomer branch recurses on its own copy of the set, so
/// siblings never suppress each other. The result is deliberately not
/// deduplicated across branches; callers that resolve several sinks dedupe
/// at the path-set level if they need to.
pub fn build_path<'a>(
    graph: &DiGraphMap<&'a str, ()>,
    node: &'a str,
    mut visited: HashSet<&'a str>,
) -> Vec<String> {
    if visited.contains(node) {
        return Vec::new();
    }
    visited.insert(node);

    if !graph.contains_node(node) {
        return Vec::new();
    }

    let incomers: Vec<&str> = graph.neighbors_directed(node, Direction::Incoming).collect();
    if incomers.is_empty() {
        return vec![node.to_string()];
    }

    let mut path = Vec::new();
    for incomer in incomers {
        path.extend(build_path(graph, incomer, visited.clone()));
    }
    path.push(node.to_string());
    path
}

/// Nodes with no outgoing edges, in node order. Isolated nodes count.
pub fn sinks<'a>(graph: &DiGraphMap<&'a str, ()>, nodes: &'a [GraphNode]) -> Vec<&'a str> {
    nodes
        .iter()
        .map(|node| node.id.as_str())
        .filter(|&id| {
            graph
                .neighbors_directed(id, Direction::Outgoing)
                .next()
                .is_none()
        })
        .collect()
}
