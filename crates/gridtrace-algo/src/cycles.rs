//! Cycle Resolver.
//!
//! Breaks loops in a network so it can be treated as a radial tree. Every
//! pass computes a cycle basis of the bus graph (fundamental cycles of a
//! breadth-first spanning forest) and, for each cycle, removes the first
//! trivial edge in input order. Passes repeat until no cycle is left or a
//! pass removes nothing; the remaining cycles are then reported.
//!
//! An edge is trivial when it is a line that looks openable or negligible:
//! - positive-sequence resistance missing, NaN or below `r1_threshold`
//! - switchable (a breaker or fuse was found on it)
//! - no longer than `short_line_threshold`
//! - name or line type contains one of `name_substrings`
//!
//! Transformers and other two-terminal elements are edges of the graph but
//! never trivial.
//!
//! Each successful pass strictly lowers the edge count, so the loop ends
//! after at most as many passes as the graph has edges.

use crate::Network;
use gridtrace_core::{
    bus_graph, connected_components, BusGraph, BusId, CycleConfig, Diagnostics, Element, ElementId,
    TopologyStore,
};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// A closed walk in the bus graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    pub buses: Vec<BusId>,
    pub elements: Vec<ElementId>,
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buses: Vec<&str> = self.buses.iter().map(BusId::as_str).collect();
        write!(f, "{}", buses.join(" - "))
    }
}

/// Outcome of [`resolve_cycles`]
#[derive(Debug, Clone)]
pub struct CycleResolution {
    /// The resolved network, or one network per component when removals
    /// split it
    pub networks: Vec<Network>,
    /// Elements removed to break cycles, in removal order
    pub removed: Vec<Element>,
    /// Cycles left when a pass could not remove anything
    pub unresolved: Vec<Cycle>,
    pub passes: usize,
}

impl CycleResolution {
    pub fn is_acyclic(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[derive(Debug, Clone)]
struct BasisCycle {
    nodes: Vec<NodeIndex>,
    edges: Vec<EdgeIndex>,
}

/// Fundamental cycles of a breadth-first spanning forest.
///
/// Roots are taken in node order and neighbours in edge order, so the basis
/// is stable for a given graph. Parallel edges and self loops form cycles of
/// their own.
fn cycle_basis(graph: &BusGraph) -> Vec<BasisCycle> {
    let g = &graph.graph;
    let mut parent: HashMap<NodeIndex, (NodeIndex, EdgeIndex)> = HashMap::new();
    let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
    let mut tree = HashSet::new();

    for root in g.node_indices() {
        if depth.contains_key(&root) {
            continue;
        }
        depth.insert(root, 0);
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            let mut edges: Vec<(EdgeIndex, NodeIndex)> = g
                .edges(node)
                .map(|e| {
                    let other = if e.source() == node { e.target() } else { e.source() };
                    (e.id(), other)
                })
                .collect();
            edges.sort_unstable();
            for (edge, next) in edges {
                if depth.contains_key(&next) {
                    continue;
                }
                depth.insert(next, depth[&node] + 1);
                parent.insert(next, (node, edge));
                tree.insert(edge);
                queue.push_back(next);
            }
        }
    }

    let mut cycles = Vec::new();
    for edge in g.edge_indices() {
        if tree.contains(&edge) {
            continue;
        }
        let Some((a, b)) = g.edge_endpoints(edge) else {
            continue;
        };
        let (mut x, mut y) = (a, b);
        let mut side_a = vec![x];
        let mut side_b = vec![y];
        let mut edges_a = Vec::new();
        let mut edges_b = Vec::new();
        while x != y {
            if depth[&x] >= depth[&y] {
                let (p, e) = parent[&x];
                edges_a.push(e);
                x = p;
                side_a.push(x);
            } else {
                let (p, e) = parent[&y];
                edges_b.push(e);
                y = p;
                side_b.push(y);
            }
        }
        // both sides end at the common ancestor
        side_b.pop();
        side_b.reverse();
        side_a.extend(side_b);
        edges_b.reverse();
        let mut edges = vec![edge];
        edges.extend(edges_a);
        edges.extend(edges_b);
        cycles.push(BasisCycle {
            nodes: side_a,
            edges,
        });
    }
    cycles
}

/// Whether an element is a candidate for removal from a cycle
pub fn is_trivial(element: &Element, config: &CycleConfig) -> bool {
    let Some(line) = element.line() else {
        return false;
    };
    let low_resistance = line
        .impedance
        .r1
        .map_or(true, |r| r.is_nan() || r < config.r1_threshold);
    let name = element.name.to_lowercase();
    let class = line.line_type.as_str();
    let named = config.name_substrings.iter().any(|pattern| {
        let pattern = pattern.to_lowercase();
        !pattern.is_empty() && (name.contains(&pattern) || class.contains(&pattern))
    });
    low_resistance || line.switchable || line.length <= config.short_line_threshold || named
}

fn describe(graph: &BusGraph, cycle: &BasisCycle) -> Cycle {
    let g = &graph.graph;
    Cycle {
        buses: cycle
            .nodes
            .iter()
            .filter_map(|&n| g.node_weight(n).cloned())
            .collect(),
        elements: cycle
            .edges
            .iter()
            .filter_map(|&e| g.edge_weight(e).cloned())
            .collect(),
    }
}

/// Cycles of a network as bus and element lists
pub fn find_cycles(network: &Network) -> Vec<Cycle> {
    let graph = bus_graph(&network.store);
    cycle_basis(&graph)
        .iter()
        .map(|cycle| describe(&graph, cycle))
        .collect()
}

/// Break the cycles of `network`.
///
/// Unresolved cycles are logged and recorded as a warning. When the
/// removals disconnect the network, every component is returned as its own
/// network named `<name> [component k]`.
pub fn resolve_cycles(
    network: Network,
    config: &CycleConfig,
    diagnostics: &mut Diagnostics,
) -> CycleResolution {
    let Network { name, mut store } = network;
    let components_before = connected_components(&store).len();
    let mut graph = bus_graph(&store);
    let mut removed = Vec::new();
    let mut unresolved = Vec::new();
    let mut passes = 0;

    loop {
        let cycles = cycle_basis(&graph);
        if cycles.is_empty() {
            break;
        }
        passes += 1;
        let mut cuts = 0;
        for cycle in &cycles {
            // a cut earlier in this pass already opened the cycle
            if cycle.edges.iter().any(|&e| graph.graph.edge_weight(e).is_none()) {
                continue;
            }
            let candidate = cycle
                .edges
                .iter()
                .filter_map(|&edge| {
                    let id = graph.graph.edge_weight(edge)?;
                    let element = store.element(id)?;
                    is_trivial(element, config).then(|| (store.order_of(id).unwrap_or(usize::MAX), edge))
                })
                .min();
            let Some((_, edge)) = candidate else {
                continue;
            };
            if let Some(id) = graph.remove_edge(edge) {
                if let Some(element) = store.remove_element(&id) {
                    debug!(network = %name, element = %id, name = %element.name, "opened cycle");
                    removed.push(element);
                }
                cuts += 1;
            }
        }
        if cuts == 0 {
            unresolved = cycles.iter().map(|cycle| describe(&graph, cycle)).collect();
            break;
        }
    }

    if !unresolved.is_empty() {
        let listed: Vec<String> = unresolved.iter().map(|c| format!("[{c}]")).collect();
        let message = format!(
            "{} cycles left without a removable edge: {}",
            unresolved.len(),
            listed.join(", ")
        );
        warn!(network = %name, "{message}");
        diagnostics.add_warning_with_entity("cycle", &message, &name);
    }

    let networks = split_components(name.clone(), store, components_before);
    info!(
        network = %name,
        passes,
        removed = removed.len(),
        unresolved = unresolved.len(),
        networks = networks.len(),
        "cycle resolution complete"
    );
    CycleResolution {
        networks,
        removed,
        unresolved,
        passes,
    }
}

/// Split `store` into one network per component when removals added
/// components. Buses left without any element join the first network.
fn split_components(name: String, store: TopologyStore, before: usize) -> Vec<Network> {
    let components = connected_components(&store);
    if components.len() <= before {
        return vec![Network { name, store }];
    }
    let mut networks = Vec::new();
    let mut bare = Vec::new();
    for buses in components {
        let set: HashSet<BusId> = buses.into_iter().collect();
        let sub = store.subnetwork(&set);
        if sub.element_count() == 0 {
            bare.extend(sub.buses().cloned());
            continue;
        }
        networks.push(Network {
            name: format!("{name} [component {}]", networks.len() + 1),
            store: sub,
        });
    }
    match networks.first_mut() {
        Some(first) => {
            for bus in bare {
                first.store.add_bus(bus);
            }
        }
        None => return vec![Network { name, store }],
    }
    networks
}
