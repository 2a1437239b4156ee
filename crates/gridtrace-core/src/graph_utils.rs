use crate::store::TopologyStore;
use crate::{BusId, ElementId};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// Undirected multigraph view of a store: one node per bus, one edge per
/// two-terminal element.
///
/// Built on a `StableGraph` so edges can be removed without invalidating the
/// indices held by callers.
#[derive(Debug, Clone, Default)]
pub struct BusGraph {
    pub graph: StableUnGraph<BusId, ElementId>,
    index: HashMap<BusId, NodeIndex>,
}

impl BusGraph {
    pub fn node(&self, bus: &BusId) -> Option<NodeIndex> {
        self.index.get(bus).copied()
    }

    pub fn remove_edge(&mut self, edge: EdgeIndex) -> Option<ElementId> {
        self.graph.remove_edge(edge)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Build the bus graph of a store. Nodes follow bus insertion order and edges
/// follow element insertion order.
pub fn bus_graph(store: &TopologyStore) -> BusGraph {
    let mut graph = StableUnGraph::default();
    let mut index = HashMap::new();
    for bus in store.buses() {
        let node = graph.add_node(bus.id.clone());
        index.insert(bus.id.clone(), node);
    }
    for element in store.elements() {
        if let Some((from, to)) = element.endpoints() {
            if let (Some(&a), Some(&b)) = (index.get(&from.bus), index.get(&to.bus)) {
                graph.add_edge(a, b, element.id.clone());
            }
        }
    }
    BusGraph { graph, index }
}

/// Connected components of the bus graph (breadth-first search).
///
/// Components are listed in order of their first bus; buses inside a
/// component are in discovery order. Isolated buses form their own component.
pub fn connected_components(store: &TopologyStore) -> Vec<Vec<BusId>> {
    let graph = bus_graph(store);
    let mut visited = HashSet::new();
    let mut components = Vec::new();
    for bus in store.buses() {
        let Some(start) = graph.node(&bus.id) else {
            continue;
        };
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::from([start]);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(graph.graph[node].clone());
            for neighbor in graph.graph.neighbors(node) {
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        components.push(members);
    }
    components
}

/// Summary statistics of a reconstructed network
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub bus_count: usize,
    pub element_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
}

pub fn graph_stats(store: &TopologyStore) -> GraphStats {
    let graph = bus_graph(store);
    let degrees: Vec<usize> = graph
        .graph
        .node_indices()
        .map(|node| graph.graph.edges(node).count())
        .collect();
    let bus_count = degrees.len();
    GraphStats {
        bus_count,
        element_count: store.element_count(),
        edge_count: graph.edge_count(),
        connected_components: connected_components(store).len(),
        min_degree: degrees.iter().copied().min().unwrap_or(0),
        max_degree: degrees.iter().copied().max().unwrap_or(0),
        avg_degree: if bus_count == 0 {
            0.0
        } else {
            degrees.iter().sum::<usize>() as f64 / bus_count as f64
        },
    }
}

/// Export the bus graph to Graphviz DOT. Edges are labelled with element names.
pub fn render_dot(store: &TopologyStore, name: &str) -> String {
    let graph = bus_graph(store);
    let mut buffer = String::new();
    buffer.push_str(&format!("graph \"{}\" {{\n", sanitize_label(name)));
    for node in graph.graph.node_indices() {
        let bus = &graph.graph[node];
        let shape = if bus.is_source_bus() { "box" } else { "ellipse" };
        buffer.push_str(&format!(
            "  n{} [label=\"{}\", shape={}];\n",
            node.index(),
            sanitize_label(bus.as_str()),
            shape
        ));
    }
    for edge in graph.graph.edge_references() {
        let label = store
            .element(edge.weight())
            .map_or(edge.weight().as_str(), |e| e.name.as_str());
        buffer.push_str(&format!(
            "  n{} -- n{} [label=\"{}\"];\n",
            edge.source().index(),
            edge.target().index(),
            sanitize_label(label)
        ));
    }
    buffer.push('}');
    buffer
}

fn sanitize_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
