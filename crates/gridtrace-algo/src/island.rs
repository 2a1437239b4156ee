//! Island Extractor.
//!
//! One island per transformer: the low-voltage network hanging off the
//! transformer's lower-voltage winding. The traversal is breadth first over
//! buses. At every bus it picks up the loads, photovoltaics and shunts
//! attached there, and the logical lines leaving it (merged through the
//! [`SegmentMerger`] when configured), whose far ends join the frontier.
//!
//! Each island contains:
//! - the transformer, its high-voltage terminal moved onto `sourcebus_<V>`
//! - a source element at that bus named `<root bus>.<transformer name>`,
//!   which is also the island name
//! - everything reached from the root bus
//!
//! Names are made unique across a run by appending ` #2`, ` #3`, ...
//!
//! # Overlap
//!
//! With [`IslandOverlap::Allow`] islands are independent and may share
//! buses; they are built in parallel when the `parallel` feature is on.
//! With [`IslandOverlap::Exclusive`] islands are built in transformer order
//! and a traversal never enters a bus claimed by an earlier island.

use crate::merger::SegmentMerger;
use crate::project::NetworkBuilder;
use crate::tracer::TraceContext;
use crate::Network;
use gridtrace_core::{
    BusId, Diagnostics, Element, ElementKind, IslandOverlap, TopologyConfig, TopologyStore,
    VoltageFilter,
};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{error, info, warn};

/// An extracted island before run-wide renaming
#[derive(Debug, Clone)]
pub struct Island {
    pub network: Network,
    pub transformer: gridtrace_core::ElementId,
    pub root: BusId,
    /// Buses reached by the traversal, root included
    pub visited: HashSet<BusId>,
}

/// Filter used for island traversal: the configured one, or LV when the
/// configuration does not restrict voltages
pub fn island_filter(config: &TopologyConfig) -> VoltageFilter {
    if config.voltage_filter.is_restrictive() {
        config.voltage_filter
    } else {
        VoltageFilter::Lv
    }
}

/// Transformers that root an island, in store order
pub fn island_transformers<'a>(
    store: &'a TopologyStore,
    config: &TopologyConfig,
) -> Vec<&'a Element> {
    let filter = island_filter(config);
    store
        .elements()
        .filter(|element| {
            element
                .transformer()
                .is_some_and(|params| filter.admits(params.windings[params.lv_winding()].nominal_kv))
        })
        .collect()
}

/// Build the island rooted at `transformer`.
///
/// `claimed` holds buses owned by earlier islands; the traversal does not
/// expand them.
pub fn extract_island(
    store: &TopologyStore,
    config: &TopologyConfig,
    transformer: &Element,
    claimed: &HashSet<BusId>,
    diagnostics: &mut Diagnostics,
) -> Option<Island> {
    let params = transformer.transformer()?;
    let (lv, hv) = (params.lv_winding(), params.hv_winding());
    let Some(root) = transformer.terminal(lv as u8 + 1).map(|t| t.bus.clone()) else {
        warn!(transformer = %transformer.id, "transformer without low-voltage terminal");
        diagnostics.add_warning_with_entity(
            "schema",
            "transformer has no low-voltage terminal",
            transformer.id.as_str(),
        );
        return None;
    };
    let hv_kv = params.windings[hv].nominal_kv;
    let name = format!("{root}.{}", transformer.name);
    info!(transformer = %transformer.name, %root, "tracing island");

    let ctx = TraceContext::new(store, config)
        .with_filter(island_filter(config))
        .with_anchor(&transformer.id);
    let mut builder = NetworkBuilder::new(store);
    let source_bus = builder.add_source_bus(hv_kv);
    let mut anchored = transformer.clone();
    for terminal in &mut anchored.terminals {
        if usize::from(terminal.number) == hv + 1 {
            terminal.bus = source_bus.clone();
        }
    }
    builder.add_element(anchored);
    builder.add_source(&source_bus, hv_kv, &name);

    let mut merger = SegmentMerger::new(ctx);
    let mut visited = HashSet::from([root.clone()]);
    let mut frontier = VecDeque::from([root.clone()]);
    if claimed.contains(&root) {
        warn!(island = %name, %root, "root bus already claimed by another island");
        frontier.clear();
    }

    while let Some(bus) = frontier.pop_front() {
        for element in store.elements_at(&bus) {
            match &element.kind {
                ElementKind::Line(_) => {
                    let Some(line) = merger.merge_from(&element.id) else {
                        continue;
                    };
                    for end in [&line.from, &line.to] {
                        if end.is_substituted() || claimed.contains(&end.bus) {
                            continue;
                        }
                        if visited.insert(end.bus.clone()) {
                            frontier.push_back(end.bus.clone());
                        }
                    }
                    builder.add_line(line);
                }
                ElementKind::Load(_)
                | ElementKind::Photovoltaic(_)
                | ElementKind::Capacitor(_)
                | ElementKind::Reactor(_) => {
                    if ctx.admits(element) && !builder.contains(element) {
                        builder.add_attached(&ctx, element, diagnostics);
                    }
                }
                ElementKind::Transformer(_) | ElementKind::Source(_) => {}
            }
        }
    }
    merger.report(diagnostics);

    let network = builder.finish(name);
    check_duplicate_names(&network, diagnostics);
    Some(Island {
        network,
        transformer: transformer.id.clone(),
        root,
        visited,
    })
}

/// Log an error when two elements of an island share a name.
///
/// Nothing is renamed; the island is returned as built.
fn check_duplicate_names(network: &Network, diagnostics: &mut Diagnostics) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for element in network.store.elements() {
        *counts.entry(element.name.as_str()).or_default() += 1;
    }
    let duplicates: Vec<String> = counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(name, count)| format!("{name} ({count})"))
        .collect();
    if !duplicates.is_empty() {
        let message = format!(
            "{} duplicate element names: {}",
            duplicates.len(),
            duplicates.join(", ")
        );
        error!(network = %network.name, "{message}");
        diagnostics.add_error_with_entity("structure", &message, &network.name);
    }
}

/// Strip a trailing ` #n` and append ` #next` until `name` is not taken
pub fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut n = 2;
    while taken.contains(&candidate) {
        let base = candidate
            .strip_suffix(&format!(" #{}", n - 1))
            .unwrap_or(&candidate)
            .to_string();
        candidate = format!("{base} #{n}");
        n += 1;
    }
    candidate
}

/// Extract all islands of a store.
///
/// Islands come back in transformer order with unique names; every rename is
/// logged as a warning.
pub fn extract_islands(
    store: &TopologyStore,
    config: &TopologyConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<Island> {
    let transformers = island_transformers(store, config);
    let mut islands = match config.island_overlap {
        IslandOverlap::Allow => extract_independent(store, config, &transformers, diagnostics),
        IslandOverlap::Exclusive => {
            let mut claimed = HashSet::new();
            let mut islands = Vec::with_capacity(transformers.len());
            for transformer in transformers {
                if let Some(island) = extract_island(store, config, transformer, &claimed, diagnostics) {
                    claimed.extend(island.visited.iter().cloned());
                    islands.push(island);
                }
            }
            islands
        }
    };

    let mut taken = HashSet::new();
    for island in &mut islands {
        let name = unique_name(&island.network.name, &taken);
        if name != island.network.name {
            let message = format!("duplicate network name {:?}, renamed to {name:?}", island.network.name);
            warn!("{message}");
            diagnostics.add_warning_with_entity("structure", &message, island.transformer.as_str());
            island.network.name = name;
        }
        taken.insert(island.network.name.clone());
    }
    info!(islands = islands.len(), "island extraction complete");
    islands
}

#[cfg(feature = "parallel")]
fn extract_independent(
    store: &TopologyStore,
    config: &TopologyConfig,
    transformers: &[&Element],
    diagnostics: &mut Diagnostics,
) -> Vec<Island> {
    let none = HashSet::new();
    let results: Vec<(Option<Island>, Diagnostics)> = transformers
        .par_iter()
        .map(|transformer| {
            let mut local = Diagnostics::new();
            let island = extract_island(store, config, transformer, &none, &mut local);
            (island, local)
        })
        .collect();
    let mut islands = Vec::with_capacity(results.len());
    for (island, local) in results {
        diagnostics.merge(local);
        islands.extend(island);
    }
    islands
}

#[cfg(not(feature = "parallel"))]
fn extract_independent(
    store: &TopologyStore,
    config: &TopologyConfig,
    transformers: &[&Element],
    diagnostics: &mut Diagnostics,
) -> Vec<Island> {
    let none = HashSet::new();
    transformers
        .iter()
        .filter_map(|transformer| extract_island(store, config, transformer, &none, diagnostics))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::NetworkFixture;
    use gridtrace_core::ElementId;

    fn feeder() -> TopologyStore {
        NetworkFixture::new()
            .transformer("T1", "trafo_1", "MV", 20.0, "L", 0.4)
            .load("LD1", "Load1", "L", 2.0)
            .line("1", "S1", "L", "M", 40.0, 0.1)
            .load("LD2", "Load2", "M", 3.0)
            .build()
    }

    #[test]
    fn test_island_contents() {
        let store = feeder();
        let config = TopologyConfig::default();
        let islands = extract_islands(&store, &config, &mut Diagnostics::new());
        assert_eq!(islands.len(), 1);
        let island = &islands[0];
        assert_eq!(island.network.name, "L.trafo_1");
        assert_eq!(island.root.as_str(), "L");
        let s = &island.network.store;
        for id in ["T1", "LD1", "LD2", "1"] {
            assert!(s.contains_element(&ElementId::from(id)), "missing {id}");
        }
        for bus in ["L", "M", "sourcebus_20000"] {
            assert!(s.contains_bus(&BusId::from(bus)), "missing bus {bus}");
        }
        assert!(!s.contains_bus(&BusId::from("MV")));
        let source = s.element(&ElementId::from("sourcebus_20000")).unwrap();
        assert_eq!(source.name, "L.trafo_1");
    }

    #[test]
    fn test_unique_name() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("a", &taken), "a");
        taken.insert("a".to_string());
        assert_eq!(unique_name("a", &taken), "a #2");
        taken.insert("a #2".to_string());
        assert_eq!(unique_name("a", &taken), "a #3");
    }

    #[test]
    fn test_duplicate_island_names_are_renamed() {
        let store = NetworkFixture::new()
            .transformer("T1", "trafo", "MV", 20.0, "L", 0.4)
            .transformer("T2", "trafo", "MV", 20.0, "L", 0.4)
            .load("LD1", "Load1", "L", 2.0)
            .build();
        let config = TopologyConfig::default();
        let mut diagnostics = Diagnostics::new();
        let islands = extract_islands(&store, &config, &mut diagnostics);
        let names: Vec<&str> = islands.iter().map(|i| i.network.name.as_str()).collect();
        assert_eq!(names, ["L.trafo", "L.trafo #2"]);
        assert_eq!(diagnostics.warning_count(), 1);
        // parallel transformers share the bus, so both islands hold the load
        assert!(islands[1].network.store.contains_element(&ElementId::from("LD1")));
    }

    #[test]
    fn test_exclusive_overlap_stops_at_claimed_buses() {
        let store = NetworkFixture::new()
            .transformer("T1", "t1", "MV", 20.0, "L1", 0.4)
            .transformer("T2", "t2", "MV", 20.0, "L2", 0.4)
            .line("1", "S1", "L1", "M", 40.0, 0.1)
            .line("2", "S2", "M", "L2", 40.0, 0.2)
            .load("LD", "Load", "M", 1.0)
            .build();
        let config = TopologyConfig {
            island_overlap: IslandOverlap::Exclusive,
            ..TopologyConfig::default()
        };
        let islands = extract_islands(&store, &config, &mut Diagnostics::new());
        assert_eq!(islands.len(), 2);
        assert!(islands[0].network.store.contains_element(&ElementId::from("LD")));
        assert!(!islands[1].network.store.contains_element(&ElementId::from("LD")));

        let shared = TopologyConfig::default();
        let islands = extract_islands(&store, &shared, &mut Diagnostics::new());
        assert!(islands[1].network.store.contains_element(&ElementId::from("LD")));
    }

    #[test]
    fn test_duplicate_element_names_are_reported() {
        let store = NetworkFixture::new()
            .transformer("T1", "trafo_1", "MV", 20.0, "L", 0.4)
            .load("LD1", "House", "L", 2.0)
            .load("LD2", "House", "L", 3.0)
            .build();
        let mut diagnostics = Diagnostics::new();
        let islands = extract_islands(&store, &TopologyConfig::default(), &mut diagnostics);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].network.store.element_count(), 4);
        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics.issues[0].message.contains("House (2)"));
    }

    #[test]
    fn test_high_voltage_transformers_root_no_island() {
        let store = NetworkFixture::new()
            .transformer("T0", "t0", "HV", 110.0, "MV", 20.0)
            .transformer("T1", "t1", "MV", 20.0, "L", 0.4)
            .build();
        let ids: Vec<&str> = island_transformers(&store, &TopologyConfig::default())
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, ["T1"]);
    }
}
