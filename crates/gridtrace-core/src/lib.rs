//! # gridtrace-core: Distribution Network Topology Model
//!
//! Data structures shared by the readers and the reconstruction algorithms.
//!
//! ## Design
//!
//! A network is a set of **buses** joined by **elements**. Every element owns
//! one or two [`Terminal`]s and each terminal references exactly one bus:
//! - Two-terminal elements (line segments, logical lines, transformers) are
//!   the edges of the bus graph
//! - Single-terminal elements (loads, photovoltaics, shunts, sources) hang off
//!   one bus
//!
//! The [`TopologyStore`] owns all of them for the duration of one run. It is
//! deliberately permissive: terminals may reference buses that were never
//! declared, and those buses are created on first reference.
//!
//! ## Quick Start
//!
//! ```rust
//! use gridtrace_core::*;
//!
//! let mut store = TopologyStore::new();
//! store.add_bus(Bus::new("X").with_nominal_kv(Kilovolts(0.4)));
//!
//! let line = Element::new(
//!     "1",
//!     "S1",
//!     ElementKind::Line(LineParams {
//!         length: Metres(50.0),
//!         impedance: Impedance::series(0.4, 0.1, 0.3, 0.08),
//!         ..LineParams::default()
//!     }),
//! )
//! .with_terminal(Terminal::new(1, "X", 7))
//! .with_terminal(Terminal::new(2, "Y", 7));
//! store.add_element(line);
//!
//! let (from, to) = store.from_to(&ElementId::from("1")).unwrap();
//! assert_eq!((from.as_str(), to.as_str()), ("X", "Y"));
//! ```
//!
//! ## Modules
//!
//! - [`store`] - the topology store
//! - [`element`] - devices, terminals and parameters
//! - [`config`] - reconstruction options
//! - [`diagnostics`] - issues collected during a run
//! - [`graph_utils`] - bus graph view, components, statistics, DOT export
//! - [`snapshot`] - serialisable view handed to writers

use serde::{Deserialize, Serialize};

pub mod config;
pub mod diagnostics;
pub mod element;
pub mod error;
pub mod graph_utils;
pub mod phase;
pub mod snapshot;
pub mod store;
pub mod units;

pub use config::{CycleConfig, IslandOverlap, TopologyConfig, VoltageFilter};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use element::{
    compact_name, Breaker, Element, ElementKind, Impedance, LineParams, LineType, LoadParams, PhaseLoad,
    PhotovoltaicParams, ShuntParams, SourceParams, Terminal, TransformerParams, Winding,
    WindingConnection, CAPACITANCE_EPSILON, IMPEDANCE_EPSILON,
};
pub use error::{TopologyError, TopologyResult};
pub use graph_utils::{bus_graph, connected_components, graph_stats, render_dot, BusGraph, GraphStats};
pub use phase::{Phase, PhaseSet};
pub use snapshot::{BusSnapshot, ElementSnapshot, NetworkSnapshot};
pub use store::{TerminalRef, TopologyKey, TopologyStore};
pub use units::{KilovoltAmperes, Kilovars, Kilovolts, Kilometres, Kilowatts, Metres};

/// Prefix of synthetic buses standing in for the far side of a transformer
pub const SOURCE_BUS_PREFIX: &str = "sourcebus_";

/// External bus identifier (the `Node_ID` of the source schema)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(String);

impl BusId {
    pub fn new(value: impl Into<String>) -> Self {
        BusId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Synthetic source bus for a voltage, `sourcebus_<volts>`
    pub fn source_bus(kv: Kilovolts) -> Self {
        BusId(format!("{SOURCE_BUS_PREFIX}{}", kv.rounded_volts()))
    }

    pub fn is_source_bus(&self) -> bool {
        self.0.starts_with(SOURCE_BUS_PREFIX)
    }
}

/// External element identifier (the `Element_ID` of the source schema)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(value: impl Into<String>) -> Self {
        ElementId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_string_id {
    ($type:ty) => {
        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $type {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $type {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&$type> for $type {
            fn from(value: &$type) -> Self {
                value.clone()
            }
        }
    };
}

impl_string_id!(BusId);
impl_string_id!(ElementId);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// A node of the network where one or more devices connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_kv: Option<Kilovolts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<PhaseSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Bus {
    pub fn new(id: impl Into<BusId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            nominal_kv: None,
            phases: None,
            position: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_nominal_kv(mut self, kv: Kilovolts) -> Self {
        self.nominal_kv = Some(kv);
        self
    }

    pub fn with_phases(mut self, phases: PhaseSet) -> Self {
        self.phases = Some(phases);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Overwrite attributes that are set on `other`
    pub fn merge_from(&mut self, other: Bus) {
        if other.name.is_some() {
            self.name = other.name;
        }
        if other.nominal_kv.is_some() {
            self.nominal_kv = other.nominal_kv;
        }
        if other.phases.is_some() {
            self.phases = other.phases;
        }
        if other.position.is_some() {
            self.position = other.position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_bus_name() {
        let id = BusId::source_bus(Kilovolts(20.0));
        assert_eq!(id.as_str(), "sourcebus_20000");
        assert!(id.is_source_bus());
        assert!(!BusId::from("4711").is_source_bus());
    }

    #[test]
    fn test_bus_merge_keeps_unset_attributes() {
        let mut bus = Bus::new("n1")
            .with_nominal_kv(Kilovolts(0.4))
            .with_phases(PhaseSet::ABC);
        bus.merge_from(Bus::new("n1").with_name("Station 1"));
        assert_eq!(bus.nominal_kv, Some(Kilovolts(0.4)));
        assert_eq!(bus.name.as_deref(), Some("Station 1"));
    }

    #[test]
    fn test_id_serialization_is_transparent() {
        let json = serde_json::to_string(&ElementId::from("12")).unwrap();
        assert_eq!(json, "\"12\"");
    }
}
