//! Phase sets and the integer phase codes of the source schema.

use crate::error::{TopologyError, TopologyResult};
use serde::{Deserialize, Serialize};

/// A single conductor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    A,
    B,
    C,
    N,
}

impl Phase {
    pub fn as_char(self) -> char {
        match self {
            Phase::A => 'A',
            Phase::B => 'B',
            Phase::C => 'C',
            Phase::N => 'N',
        }
    }
}

/// One of the eight phase combinations a terminal can carry.
///
/// Codes 1..=8 map to A, B, C, AB, BC, AC, ABC and N. Serialises as the
/// phase letters (`"ABC"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PhaseSet(u8);

const PHASES: [&[Phase]; 8] = [
    &[Phase::A],
    &[Phase::B],
    &[Phase::C],
    &[Phase::A, Phase::B],
    &[Phase::B, Phase::C],
    &[Phase::A, Phase::C],
    &[Phase::A, Phase::B, Phase::C],
    &[Phase::N],
];

const LABELS: [&str; 8] = ["A", "B", "C", "AB", "BC", "AC", "ABC", "N"];

impl PhaseSet {
    pub const A: PhaseSet = PhaseSet(1);
    pub const B: PhaseSet = PhaseSet(2);
    pub const C: PhaseSet = PhaseSet(3);
    pub const AB: PhaseSet = PhaseSet(4);
    pub const BC: PhaseSet = PhaseSet(5);
    pub const AC: PhaseSet = PhaseSet(6);
    pub const ABC: PhaseSet = PhaseSet(7);
    pub const N: PhaseSet = PhaseSet(8);

    /// Decode a `Flag_Terminal` style phase code.
    pub fn from_code(code: i64) -> TopologyResult<Self> {
        match code {
            1..=8 => Ok(PhaseSet(code as u8)),
            other => Err(TopologyError::UnknownPhaseCode(other)),
        }
    }

    pub fn code(self) -> i64 {
        i64::from(self.0)
    }

    pub fn phases(self) -> &'static [Phase] {
        PHASES[usize::from(self.0) - 1]
    }

    /// Number of conductors; the neutral-only set counts as one.
    pub fn len(self) -> usize {
        self.phases().len()
    }

    pub fn is_empty(self) -> bool {
        false
    }

    /// True for the three single-conductor line phases A, B and C
    pub fn is_single_phase(self) -> bool {
        matches!(self.0, 1..=3)
    }

    pub fn label(self) -> &'static str {
        LABELS[usize::from(self.0) - 1]
    }
}

impl Default for PhaseSet {
    fn default() -> Self {
        PhaseSet::ABC
    }
}

impl std::fmt::Display for PhaseSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for PhaseSet {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LABELS
            .iter()
            .position(|label| label.eq_ignore_ascii_case(s.trim()))
            .map(|idx| PhaseSet(idx as u8 + 1))
            .ok_or_else(|| TopologyError::invalid_value("phases", format!("'{s}'")))
    }
}

impl From<PhaseSet> for String {
    fn from(phases: PhaseSet) -> Self {
        phases.label().to_string()
    }
}

impl TryFrom<String> for PhaseSet {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
