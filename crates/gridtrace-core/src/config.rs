//! Reconstruction options.
//!
//! [`TopologyConfig`] is read from TOML by the binary. Every field has a
//! default, so partial files are fine:
//!
//! ```toml
//! voltage_filter = "lv"
//! include_transformers = false
//!
//! [cycles]
//! short_line_threshold = 2.5
//! ```

use crate::error::TopologyError;
use crate::units::{Kilovolts, Metres};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Voltage class admitted by a reconstruction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoltageFilter {
    /// Below 1 kV
    Lv,
    /// Below 35 kV
    Mv,
    #[default]
    None,
}

impl VoltageFilter {
    /// Exclusive upper bound on voltage-level nominal voltage
    pub fn threshold(self) -> Kilovolts {
        match self {
            VoltageFilter::Lv => Kilovolts(1.0),
            VoltageFilter::Mv => Kilovolts(35.0),
            VoltageFilter::None => Kilovolts(99_999_999.0),
        }
    }

    pub fn admits(self, kv: Kilovolts) -> bool {
        kv < self.threshold()
    }

    /// LV and MV filters cut the network at transformer boundaries
    pub fn is_restrictive(self) -> bool {
        !matches!(self, VoltageFilter::None)
    }
}

impl FromStr for VoltageFilter {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lv" => Ok(VoltageFilter::Lv),
            "mv" => Ok(VoltageFilter::Mv),
            "none" | "all" => Ok(VoltageFilter::None),
            other => Err(TopologyError::Config(format!(
                "unknown voltage filter '{other}' (expected lv, mv or none)"
            ))),
        }
    }
}

impl std::fmt::Display for VoltageFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            VoltageFilter::Lv => "lv",
            VoltageFilter::Mv => "mv",
            VoltageFilter::None => "none",
        })
    }
}

/// Whether two islands may share buses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IslandOverlap {
    /// Each island is traced independently and may reach buses of another
    #[default]
    Allow,
    /// A bus claimed by an earlier island stops later traversals
    Exclusive,
}

impl FromStr for IslandOverlap {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(IslandOverlap::Allow),
            "exclusive" => Ok(IslandOverlap::Exclusive),
            other => Err(TopologyError::Config(format!(
                "unknown island overlap policy '{other}' (expected allow or exclusive)"
            ))),
        }
    }
}

/// Edge classification for the cycle resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Lines with R1 below this (or missing) are trivial
    pub r1_threshold: f64,
    /// Lines at most this long are trivial
    pub short_line_threshold: Metres,
    /// Case-insensitive name fragments marking a line as trivial
    pub name_substrings: Vec<String>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            r1_threshold: 0.01,
            short_line_threshold: Metres(1.0),
            name_substrings: ["removable", "fuse", "switch", "connector"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Options for one reconstruction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub voltage_filter: VoltageFilter,
    /// Keep transformers that straddle the filter threshold
    pub include_transformers: bool,
    /// Collapse chains of identical segments into logical lines
    pub merge_contiguous_lines: bool,
    /// Produce one island per transformer instead of a single network
    pub separate_lv_islands: bool,
    /// Break cycles in every produced network
    pub resolve_cycles: bool,
    pub island_overlap: IslandOverlap,
    /// Accumulated length up to which the merger folds segments regardless of impedance
    pub merge_length_threshold: Metres,
    pub cycles: CycleConfig,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            voltage_filter: VoltageFilter::None,
            include_transformers: true,
            merge_contiguous_lines: true,
            separate_lv_islands: false,
            resolve_cycles: false,
            island_overlap: IslandOverlap::Allow,
            merge_length_threshold: Metres(1.0),
            cycles: CycleConfig::default(),
        }
    }
}

impl TopologyConfig {
    /// Whether endpoints next to a transformer are replaced by a source bus
    pub fn substitutes_source_buses(&self) -> bool {
        !self.include_transformers && self.voltage_filter.is_restrictive()
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        if !self.merge_length_threshold.is_finite() || self.merge_length_threshold.value() < 0.0 {
            return Err(TopologyError::Config(
                "merge_length_threshold must be a non-negative number".into(),
            ));
        }
        if !self.cycles.r1_threshold.is_finite() || !self.cycles.short_line_threshold.is_finite() {
            return Err(TopologyError::Config(
                "cycle thresholds must be finite".into(),
            ));
        }
        Ok(())
    }
}
