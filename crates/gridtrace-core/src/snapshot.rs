//! Serialisable view of a store handed to writers.
//!
//! Every two-terminal element carries its `from`/`to` buses; single-terminal
//! elements carry `bus`. Every bus referenced by a terminal is present in
//! `buses`.

use crate::element::{Element, ElementKind};
use crate::phase::PhaseSet;
use crate::store::TopologyStore;
use crate::units::Kilovolts;
use crate::{Bus, BusId, ElementId};
use serde::{Deserialize, Serialize};

pub type BusSnapshot = Bus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: ElementId,
    pub name: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_kv: Option<Kilovolts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<PhaseSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<BusId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<BusId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<BusId>,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl From<&Element> for ElementSnapshot {
    fn from(element: &Element) -> Self {
        let (bus, from, to) = match element.endpoints() {
            Some((a, b)) => (None, Some(a.bus.clone()), Some(b.bus.clone())),
            None => (element.primary_terminal().map(|t| t.bus.clone()), None, None),
        };
        Self {
            id: element.id.clone(),
            name: element.name.clone(),
            enabled: element.enabled,
            voltage_kv: element.voltage_kv,
            phases: element.primary_terminal().and_then(|t| t.phases().ok()),
            bus,
            from,
            to,
            kind: element.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub name: String,
    pub buses: Vec<BusSnapshot>,
    pub elements: Vec<ElementSnapshot>,
}

impl NetworkSnapshot {
    pub fn capture(name: impl Into<String>, store: &TopologyStore) -> Self {
        Self {
            name: name.into(),
            buses: store.buses().cloned().collect(),
            elements: store.elements().map(ElementSnapshot::from).collect(),
        }
    }

    /// Buses referenced by an element but missing from the bus list
    pub fn orphan_references(&self) -> Vec<&BusId> {
        let known: std::collections::HashSet<&BusId> = self.buses.iter().map(|b| &b.id).collect();
        self.elements
            .iter()
            .flat_map(|e| [e.bus.as_ref(), e.from.as_ref(), e.to.as_ref()])
            .flatten()
            .filter(|bus| !known.contains(bus))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{LineParams, LoadParams, Terminal};

    #[test]
    fn test_capture_sets_endpoints() {
        let mut store = TopologyStore::new();
        store.add_element(
            Element::new("1", "S1", ElementKind::Line(LineParams::default()))
                .with_terminal(Terminal::new(1, "a", 7))
                .with_terminal(Terminal::new(2, "b", 7)),
        );
        store.add_element(
            Element::new("2", "L", ElementKind::Load(LoadParams::default()))
                .with_terminal(Terminal::new(1, "b", 1)),
        );

        let snapshot = NetworkSnapshot::capture("net", &store);
        assert_eq!(snapshot.buses.len(), 2);
        assert_eq!(snapshot.elements[0].from, Some(BusId::from("a")));
        assert_eq!(snapshot.elements[0].to, Some(BusId::from("b")));
        assert_eq!(snapshot.elements[1].bus, Some(BusId::from("b")));
        assert_eq!(snapshot.elements[1].phases, Some(PhaseSet::A));
        assert!(snapshot.orphan_references().is_empty());
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut store = TopologyStore::new();
        store.add_element(
            Element::new("1", "S1", ElementKind::Line(LineParams::default()))
                .with_terminal(Terminal::new(1, "a", 7))
                .with_terminal(Terminal::new(2, "b", 7)),
        );
        let snapshot = NetworkSnapshot::capture("net", &store);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"type\":\"line\""));
        let back: NetworkSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
