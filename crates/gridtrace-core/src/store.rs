//! In-memory topology store.
//!
//! Buses and elements are kept in insertion order so every traversal built on
//! top of the store sees records in the order they were read. Each bus keeps
//! the list of terminals attached to it, which is what the tracer and merger
//! query when they look "through" a bus.
//!
//! # Example
//!
//! ```
//! use gridtrace_core::{Element, ElementKind, LineParams, Terminal, TopologyStore, BusId};
//!
//! let mut store = TopologyStore::new();
//! store.add_element(
//!     Element::new("10", "L10", ElementKind::Line(LineParams::default()))
//!         .with_terminal(Terminal::new(1, "X", 7))
//!         .with_terminal(Terminal::new(2, "Y", 7)),
//! );
//!
//! // Buses are created on first reference
//! assert_eq!(store.bus_count(), 2);
//! assert_eq!(store.terminals_of(&BusId::from("Y")).len(), 1);
//! ```

use crate::element::{Element, Terminal};
use crate::{Bus, BusId, ElementId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attachment {
    slot: usize,
    terminal: u8,
}

#[derive(Debug, Clone)]
struct BusEntry {
    bus: Bus,
    attached: Vec<Attachment>,
}

/// A terminal together with the element that owns it
#[derive(Debug, Clone, Copy)]
pub struct TerminalRef<'a> {
    pub element: &'a Element,
    pub terminal: &'a Terminal,
}

/// Lookup key for [`TopologyStore::terminals_of`]
#[derive(Debug, Clone, Copy)]
pub enum TopologyKey<'a> {
    Element(&'a ElementId),
    Bus(&'a BusId),
}

impl<'a> From<&'a ElementId> for TopologyKey<'a> {
    fn from(id: &'a ElementId) -> Self {
        TopologyKey::Element(id)
    }
}

impl<'a> From<&'a BusId> for TopologyKey<'a> {
    fn from(id: &'a BusId) -> Self {
        TopologyKey::Bus(id)
    }
}

/// Graph of buses and the elements connecting them, owned by one run.
#[derive(Debug, Clone, Default)]
pub struct TopologyStore {
    buses: Vec<BusEntry>,
    bus_slots: HashMap<BusId, usize>,
    elements: Vec<Option<Element>>,
    element_slots: HashMap<ElementId, usize>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bus, or update the attributes of an existing one.
    ///
    /// Attributes set on `bus` overwrite the stored ones; attributes left as
    /// `None` keep their previous value. Returns `true` when the bus is new.
    pub fn add_bus(&mut self, bus: Bus) -> bool {
        match self.bus_slots.get(&bus.id) {
            Some(&slot) => {
                self.buses[slot].bus.merge_from(bus);
                false
            }
            None => {
                self.bus_slots.insert(bus.id.clone(), self.buses.len());
                self.buses.push(BusEntry {
                    bus,
                    attached: Vec::new(),
                });
                true
            }
        }
    }

    fn ensure_bus(&mut self, id: &BusId) -> usize {
        if let Some(&slot) = self.bus_slots.get(id) {
            return slot;
        }
        self.add_bus(Bus::new(id.clone()));
        self.buses.len() - 1
    }

    /// Insert an element and attach its terminals.
    ///
    /// Terminals may reference buses that were never declared; those buses
    /// are created on the spot. An element with an id already in the store
    /// replaces the previous one, which is returned.
    pub fn add_element(&mut self, element: Element) -> Option<Element> {
        let previous = self.remove_element(&element.id);
        let slot = self.elements.len();
        for terminal in &element.terminals {
            let bus_slot = self.ensure_bus(&terminal.bus);
            self.buses[bus_slot].attached.push(Attachment {
                slot,
                terminal: terminal.number,
            });
        }
        self.element_slots.insert(element.id.clone(), slot);
        self.elements.push(Some(element));
        previous
    }

    /// Remove an element and detach its terminals from their buses.
    pub fn remove_element(&mut self, id: &ElementId) -> Option<Element> {
        let slot = self.element_slots.remove(id)?;
        let element = self.elements[slot].take()?;
        for terminal in &element.terminals {
            if let Some(&bus_slot) = self.bus_slots.get(&terminal.bus) {
                self.buses[bus_slot].attached.retain(|a| a.slot != slot);
            }
        }
        Some(element)
    }

    /// Terminals of an element, or all terminals attached to a bus.
    ///
    /// Unknown keys yield an empty list.
    pub fn terminals_of<'k>(&self, key: impl Into<TopologyKey<'k>>) -> Vec<TerminalRef<'_>> {
        match key.into() {
            TopologyKey::Element(id) => self
                .element(id)
                .map(|element| {
                    element
                        .terminals
                        .iter()
                        .map(|terminal| TerminalRef { element, terminal })
                        .collect()
                })
                .unwrap_or_default(),
            TopologyKey::Bus(id) => self.attachments(id).collect(),
        }
    }

    fn attachments<'a>(&'a self, bus: &BusId) -> impl Iterator<Item = TerminalRef<'a>> + 'a {
        let attached = self
            .bus_slots
            .get(bus)
            .map(|&slot| self.buses[slot].attached.as_slice())
            .unwrap_or(&[]);
        attached.iter().filter_map(move |a| {
            let element = self.elements[a.slot].as_ref()?;
            let terminal = element.terminal(a.terminal)?;
            Some(TerminalRef { element, terminal })
        })
    }

    /// Number of terminals attached to a bus
    pub fn degree(&self, bus: &BusId) -> usize {
        self.bus_slots
            .get(bus)
            .map_or(0, |&slot| self.buses[slot].attached.len())
    }

    /// Distinct elements attached to a bus, in insertion order
    pub fn elements_at(&self, bus: &BusId) -> Vec<&Element> {
        let mut seen = HashSet::new();
        self.attachments(bus)
            .filter(|r| seen.insert(&r.element.id))
            .map(|r| r.element)
            .collect()
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        let slot = *self.element_slots.get(id)?;
        self.elements[slot].as_ref()
    }

    pub fn bus(&self, id: &BusId) -> Option<&Bus> {
        self.bus_slots.get(id).map(|&slot| &self.buses[slot].bus)
    }

    pub fn contains_bus(&self, id: &BusId) -> bool {
        self.bus_slots.contains_key(id)
    }

    pub fn contains_element(&self, id: &ElementId) -> bool {
        self.element_slots.contains_key(id)
    }

    /// Position of an element in insertion order, stable across removals
    pub fn order_of(&self, id: &ElementId) -> Option<usize> {
        self.element_slots.get(id).copied()
    }

    pub fn buses(&self) -> impl Iterator<Item = &Bus> {
        self.buses.iter().map(|entry| &entry.bus)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().flatten()
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    pub fn element_count(&self) -> usize {
        self.element_slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty() && self.element_slots.is_empty()
    }

    /// Buses of terminal 1 and terminal 2 of a two-terminal element
    pub fn from_to(&self, id: &ElementId) -> Option<(&BusId, &BusId)> {
        let (from, to) = self.element(id)?.endpoints()?;
        Some((&from.bus, &to.bus))
    }

    /// Copy of the part of the store spanned by `buses`.
    ///
    /// Elements are kept when every terminal lies inside the set. Order of
    /// buses and elements is preserved.
    pub fn subnetwork(&self, buses: &HashSet<BusId>) -> TopologyStore {
        let mut sub = TopologyStore::new();
        for entry in self.buses.iter().filter(|e| buses.contains(&e.bus.id)) {
            sub.add_bus(entry.bus.clone());
        }
        for element in self.elements() {
            if element.terminals.iter().all(|t| buses.contains(&t.bus)) {
                sub.add_element(element.clone());
            }
        }
        sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKind, LineParams, LoadParams};
    use crate::units::Kilovolts;

    fn segment(id: &str, from: &str, to: &str) -> Element {
        Element::new(id, format!("S{id}"), ElementKind::Line(LineParams::default()))
            .with_terminal(Terminal::new(1, from, 7))
            .with_terminal(Terminal::new(2, to, 7))
    }

    #[test]
    fn test_add_bus_is_idempotent() {
        let mut store = TopologyStore::new();
        assert!(store.add_bus(Bus::new("n1")));
        assert!(!store.add_bus(Bus::new("n1").with_nominal_kv(Kilovolts(0.4))));
        assert!(!store.add_bus(Bus::new("n1")));
        assert_eq!(store.bus_count(), 1);
        let bus = store.bus(&BusId::from("n1")).unwrap();
        assert_eq!(bus.nominal_kv, Some(Kilovolts(0.4)));
    }

    #[test]
    fn test_implicit_bus_creation() {
        let mut store = TopologyStore::new();
        store.add_element(segment("1", "a", "b"));
        assert!(store.contains_bus(&BusId::from("a")));
        assert!(store.contains_bus(&BusId::from("b")));
        let ids: Vec<_> = store.buses().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_terminals_of_bus_and_element() {
        let mut store = TopologyStore::new();
        store.add_element(segment("1", "a", "b"));
        store.add_element(segment("2", "b", "c"));
        store.add_element(
            Element::new("3", "load", ElementKind::Load(LoadParams::default()))
                .with_terminal(Terminal::new(1, "b", 7)),
        );

        // temporary keys: the results borrow the store only
        let at_b = store.terminals_of(&BusId::from("b"));
        let owners: Vec<_> = at_b.iter().map(|r| r.element.id.as_str()).collect();
        assert_eq!(owners, ["1", "2", "3"]);

        let of_two = store.terminals_of(&ElementId::from("2"));
        assert_eq!(of_two.len(), 2);
        assert_eq!(of_two[0].terminal.bus, BusId::from("b"));
        assert!(store.terminals_of(&ElementId::from("99")).is_empty());
    }

    #[test]
    fn test_remove_element_detaches_terminals() {
        let mut store = TopologyStore::new();
        store.add_element(segment("1", "a", "b"));
        store.add_element(segment("2", "b", "c"));
        assert_eq!(store.degree(&BusId::from("b")), 2);

        let removed = store.remove_element(&ElementId::from("1")).unwrap();
        assert_eq!(removed.name, "S1");
        assert_eq!(store.degree(&BusId::from("b")), 1);
        assert_eq!(store.degree(&BusId::from("a")), 0);
        // buses are never deleted
        assert!(store.contains_bus(&BusId::from("a")));
        assert_eq!(store.element_count(), 1);
        assert!(store.remove_element(&ElementId::from("1")).is_none());
    }

    #[test]
    fn test_readd_replaces_element() {
        let mut store = TopologyStore::new();
        store.add_element(segment("1", "a", "b"));
        let previous = store.add_element(segment("1", "a", "c"));
        assert!(previous.is_some());
        assert_eq!(store.element_count(), 1);
        assert_eq!(store.degree(&BusId::from("b")), 0);
        let (from, to) = store.from_to(&ElementId::from("1")).unwrap();
        assert_eq!((from.as_str(), to.as_str()), ("a", "c"));
    }

    #[test]
    fn test_elements_at_deduplicates_self_loops() {
        let mut store = TopologyStore::new();
        store.add_element(segment("1", "a", "a"));
        assert_eq!(store.degree(&BusId::from("a")), 2);
        assert_eq!(store.elements_at(&BusId::from("a")).len(), 1);
    }

    #[test]
    fn test_subnetwork() {
        let mut store = TopologyStore::new();
        store.add_element(segment("1", "a", "b"));
        store.add_element(segment("2", "b", "c"));
        store.add_element(segment("3", "d", "e"));
        let keep: HashSet<BusId> = ["a", "b", "c"].into_iter().map(BusId::from).collect();
        let sub = store.subnetwork(&keep);
        assert_eq!(sub.bus_count(), 3);
        assert_eq!(sub.element_count(), 2);
        assert!(!sub.contains_element(&ElementId::from("3")));
    }
}
