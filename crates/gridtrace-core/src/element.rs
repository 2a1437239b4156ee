//! Devices, their terminals and type-specific parameters.
//!
//! Every device in the network is an [`Element`] with one or two
//! [`Terminal`]s. Two-terminal elements (line segments, merged logical lines
//! and transformers) are the edges of the bus graph; everything else hangs off
//! a single bus.

use crate::error::TopologyResult;
use crate::phase::{Phase, PhaseSet};
use crate::units::{KilovoltAmperes, Kilovars, Kilovolts, Kilowatts, Metres};
use crate::{BusId, ElementId};
use serde::{Deserialize, Serialize};

/// Breaker or fuse record attached to a terminal
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Breaker {
    pub name: String,
    /// `Flag_Variant == 1`; inactive variants are ignored for switch detection
    pub variant_active: bool,
    /// `Flag_State`; an open breaker disables the segment it sits on
    pub closed: bool,
}

/// Connection point of an element to a bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
    /// Terminal index, 1 or 2 for two-port devices
    pub number: u8,
    pub bus: BusId,
    /// Raw phase code; decoded on demand so a bad code only affects its element
    pub phase_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker: Option<Breaker>,
}

impl Terminal {
    pub fn new(number: u8, bus: impl Into<BusId>, phase_code: i64) -> Self {
        Self {
            number,
            bus: bus.into(),
            phase_code,
            breaker: None,
        }
    }

    pub fn with_breaker(mut self, breaker: Breaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn phases(&self) -> TopologyResult<PhaseSet> {
        PhaseSet::from_code(self.phase_code)
    }
}

// =============================================================================
// Line segments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Cable,
    Overhead,
    Connector,
    #[default]
    Unknown,
}

impl LineType {
    /// Decode the `Flag_LineTyp` column (1 cable, 2 overhead, 3 connector)
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => LineType::Cable,
            2 => LineType::Overhead,
            3 => LineType::Connector,
            _ => LineType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineType::Cable => "cable",
            LineType::Overhead => "overhead",
            LineType::Connector => "connector",
            LineType::Unknown => "unknown",
        }
    }
}

/// Sequence impedances and shunt capacitances of a segment.
///
/// Values stay `None` when the source row has no usable number so that the
/// cycle classifier can tell "missing" apart from "small".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Impedance {
    pub r0: Option<f64>,
    pub r1: Option<f64>,
    pub x0: Option<f64>,
    pub x1: Option<f64>,
    pub c0: Option<f64>,
    pub c1: Option<f64>,
}

/// Replacement for an exactly-zero series impedance
pub const IMPEDANCE_EPSILON: f64 = 1e-5;
/// Replacement for an exactly-zero shunt capacitance
pub const CAPACITANCE_EPSILON: f64 = 1e-4;

impl Impedance {
    pub fn series(r0: f64, r1: f64, x0: f64, x1: f64) -> Self {
        Self {
            r0: Some(r0),
            r1: Some(r1),
            x0: Some(x0),
            x1: Some(x1),
            c0: None,
            c1: None,
        }
    }

    pub fn with_capacitance(mut self, c0: f64, c1: f64) -> Self {
        self.c0 = Some(c0);
        self.c1 = Some(c1);
        self
    }

    /// Exact equality of R0, R1, X0 and X1, the merge criterion for segments
    pub fn same_series(&self, other: &Impedance) -> bool {
        self.r0 == other.r0 && self.r1 == other.r1 && self.x0 == other.x0 && self.x1 == other.x1
    }

    /// Replace exact zeros so downstream solvers never see a singular branch.
    pub fn stabilized(&self) -> Self {
        let series = |v: Option<f64>| v.map(|x| if x == 0.0 { IMPEDANCE_EPSILON } else { x });
        let shunt = |v: Option<f64>| v.map(|x| if x == 0.0 { CAPACITANCE_EPSILON } else { x });
        Self {
            r0: series(self.r0),
            r1: series(self.r1),
            x0: series(self.x0),
            x1: series(self.x1),
            c0: shunt(self.c0),
            c1: shunt(self.c1),
        }
    }
}

/// Raw segment or merged logical line
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineParams {
    pub length: Metres,
    pub impedance: Impedance,
    pub line_type: LineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_kv: Option<Kilovolts>,
    /// Derived from an active breaker record on one of the terminals
    #[serde(default)]
    pub switchable: bool,
    /// Segments folded into this logical line, in walk order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ElementId>,
}

/// Device name with all whitespace removed, the form used in generated names
pub fn compact_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

// =============================================================================
// Single-bus devices
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseLoad {
    pub phase: Phase,
    pub p: Kilowatts,
    pub q: Kilovars,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadParams {
    pub phase_loads: Vec<PhaseLoad>,
}

impl LoadParams {
    pub fn total_p(&self) -> Kilowatts {
        self.phase_loads.iter().map(|l| l.p).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhotovoltaicParams {
    pub p: Kilowatts,
    pub q: Kilovars,
}

/// Shunt capacitor or reactor rating
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShuntParams {
    pub q: Kilovars,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_kv: Option<Kilovolts>,
    pub connection: WindingConnection,
    pub is_sourcebus: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_angle: Option<f64>,
}

// =============================================================================
// Transformers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindingConnection {
    #[serde(rename = "D")]
    Delta,
    #[default]
    #[serde(rename = "Y")]
    Wye,
    #[serde(rename = "Z")]
    Zigzag,
    #[serde(rename = "N")]
    Neutral,
}

use WindingConnection::{Delta as D, Neutral as N, Wye as Y, Zigzag as Z};

/// Winding connections of the 81 Sincal vector groups, `[primary, secondary]`
#[rustfmt::skip]
static VECTOR_GROUPS: [[WindingConnection; 2]; 81] = [
    [D, D], [D, Z], [D, Z], [Y, Y], [Y, Y], [Y, Y], [Y, Y], [Z, D], [Z, D], [D, N],
    [D, Z], [D, Z], [Y, D], [Y, D], [Y, Z], [Y, Z], [Y, Z], [Z, D], [Z, D], [Z, Y],
    [Z, Y], [Z, Y], [D, Y], [D, Y], [Y, D], [Y, D], [Y, Z], [Y, Z], [Y, Z], [Y, Z],
    [Z, Y], [Z, Y], [Z, Y], [Z, Y], [D, D], [D, Z], [D, Z], [Y, Y], [Y, Y], [Y, Y],
    [Y, Y], [Z, D], [Z, D], [D, Y], [D, Y], [D, Z], [D, Z], [Y, D], [Y, D], [Y, Z],
    [Y, Z], [Y, D], [Z, D], [Z, D], [Z, Y], [Z, Y], [Z, Y], [D, Y], [D, Y], [Y, D],
    [Y, D], [Y, Z], [Y, Z], [Y, Z], [Y, Z], [Z, Y], [Z, Y], [Z, Y], [Z, Y], [D, Y],
    [Y, Y], [Y, Y], [D, D], [Z, Y], [Z, Y], [D, D], [D, D], [D, Y], [Y, Y], [Y, Y],
    [Y, D],
];

impl WindingConnection {
    /// Connection of `winding` (0 primary, 1 secondary) for a vector group code
    pub fn for_vector_group(group: i64, winding: usize) -> Option<Self> {
        let row = usize::try_from(group).ok()?.checked_sub(1)?;
        VECTOR_GROUPS.get(row)?.get(winding).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            D => "D",
            Y => "Y",
            Z => "Z",
            N => "N",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Winding {
    pub nominal_kv: Kilovolts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<WindingConnection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformerParams {
    pub windings: [Winding; 2],
    pub rating: KilovoltAmperes,
    /// Series reactance Z12 in ohms referred to the primary
    pub reactance: f64,
    /// No-load loss in percent of the rating
    pub load_loss: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_group: Option<i64>,
}

impl TransformerParams {
    /// Index of the low-voltage winding; equal voltages resolve to the secondary
    pub fn lv_winding(&self) -> usize {
        if self.windings[0].nominal_kv < self.windings[1].nominal_kv {
            0
        } else {
            1
        }
    }

    pub fn hv_winding(&self) -> usize {
        1 - self.lv_winding()
    }

    /// Whether any winding is delta connected
    pub fn has_delta(&self) -> bool {
        self.windings
            .iter()
            .any(|w| w.connection == Some(WindingConnection::Delta))
    }
}

// =============================================================================
// Element
// =============================================================================

/// Type tag plus type-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Line(LineParams),
    Load(LoadParams),
    Photovoltaic(PhotovoltaicParams),
    Capacitor(ShuntParams),
    Reactor(ShuntParams),
    Source(SourceParams),
    Transformer(TransformerParams),
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Line(_) => "line",
            ElementKind::Load(_) => "load",
            ElementKind::Photovoltaic(_) => "photovoltaic",
            ElementKind::Capacitor(_) => "capacitor",
            ElementKind::Reactor(_) => "reactor",
            ElementKind::Source(_) => "source",
            ElementKind::Transformer(_) => "transformer",
        }
    }
}

/// A device owned by a [`TopologyStore`](crate::store::TopologyStore)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub name: String,
    pub enabled: bool,
    /// Nominal voltage of the element's voltage level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_kv: Option<Kilovolts>,
    pub terminals: Vec<Terminal>,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    pub fn new(id: impl Into<ElementId>, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            voltage_kv: None,
            terminals: Vec::new(),
            kind,
        }
    }

    pub fn with_terminal(mut self, terminal: Terminal) -> Self {
        self.terminals.push(terminal);
        self
    }

    pub fn with_voltage(mut self, kv: Kilovolts) -> Self {
        self.voltage_kv = Some(kv);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn terminal(&self, number: u8) -> Option<&Terminal> {
        self.terminals.iter().find(|t| t.number == number)
    }

    /// First terminal by index, the one used for single-bus devices
    pub fn primary_terminal(&self) -> Option<&Terminal> {
        self.terminals.iter().min_by_key(|t| t.number)
    }

    /// Terminals 1 and 2 of a two-port element
    pub fn endpoints(&self) -> Option<(&Terminal, &Terminal)> {
        Some((self.terminal(1)?, self.terminal(2)?))
    }

    pub fn is_line(&self) -> bool {
        matches!(self.kind, ElementKind::Line(_))
    }

    pub fn is_transformer(&self) -> bool {
        matches!(self.kind, ElementKind::Transformer(_))
    }

    pub fn line(&self) -> Option<&LineParams> {
        match &self.kind {
            ElementKind::Line(params) => Some(params),
            _ => None,
        }
    }

    pub fn line_mut(&mut self) -> Option<&mut LineParams> {
        match &mut self.kind {
            ElementKind::Line(params) => Some(params),
            _ => None,
        }
    }

    pub fn transformer(&self) -> Option<&TransformerParams> {
        match &self.kind {
            ElementKind::Transformer(params) => Some(params),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_group_table() {
        assert_eq!(WindingConnection::for_vector_group(1, 0), Some(D));
        assert_eq!(WindingConnection::for_vector_group(10, 1), Some(N));
        assert_eq!(WindingConnection::for_vector_group(23, 0), Some(D));
        assert_eq!(WindingConnection::for_vector_group(23, 1), Some(Y));
        assert_eq!(WindingConnection::for_vector_group(81, 1), Some(D));
        assert_eq!(WindingConnection::for_vector_group(0, 0), None);
        assert_eq!(WindingConnection::for_vector_group(82, 0), None);
        assert_eq!(WindingConnection::for_vector_group(5, 2), None);
    }

    #[test]
    fn test_stabilized_impedance() {
        let z = Impedance::series(0.0, 0.2, 0.0, 0.08).with_capacitance(0.0, 0.3);
        let s = z.stabilized();
        assert_eq!(s.r0, Some(IMPEDANCE_EPSILON));
        assert_eq!(s.r1, Some(0.2));
        assert_eq!(s.x0, Some(IMPEDANCE_EPSILON));
        assert_eq!(s.c0, Some(CAPACITANCE_EPSILON));
        assert_eq!(s.c1, Some(0.3));
        assert_eq!(Impedance::default().stabilized().r1, None);
    }

    #[test]
    fn test_same_series_ignores_capacitance() {
        let a = Impedance::series(0.4, 0.1, 0.3, 0.08).with_capacitance(0.2, 0.2);
        let b = Impedance::series(0.4, 0.1, 0.3, 0.08);
        assert!(a.same_series(&b));
        let c = Impedance::series(0.4, 0.2, 0.3, 0.08);
        assert!(!a.same_series(&c));
    }

    #[test]
    fn test_lv_winding() {
        let mut t = TransformerParams::default();
        t.windings[0].nominal_kv = Kilovolts(20.0);
        t.windings[1].nominal_kv = Kilovolts(0.4);
        assert_eq!(t.lv_winding(), 1);
        assert_eq!(t.hv_winding(), 0);
        t.windings.swap(0, 1);
        assert_eq!(t.lv_winding(), 0);
    }

    #[test]
    fn test_element_serializes_type_tag() {
        let element = Element::new("7", "cap 7", ElementKind::Capacitor(ShuntParams::default()))
            .with_terminal(Terminal::new(1, "n1", 7));
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["type"], "capacitor");
        assert_eq!(json["terminals"][0]["bus"], "n1");
    }
}
