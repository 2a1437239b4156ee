//! Reconstruction options from a TOML file plus command line overrides.
//!
//! ```toml
//! voltage_filter = "lv"
//! separate_lv_islands = true
//! resolve_cycles = true
//!
//! [cycles]
//! name_substrings = ["fuse", "bridge"]
//! ```

use crate::cli::{FilterArg, OverlapArg};
use anyhow::{Context, Result};
use gridtrace_core::TopologyConfig;
use std::fs;
use std::path::Path;

/// Command line switches that override file values when given
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub filter: Option<FilterArg>,
    pub no_transformers: bool,
    pub no_merge: bool,
    pub separate_islands: bool,
    pub resolve_cycles: bool,
    pub island_overlap: Option<OverlapArg>,
}

pub fn load_config(path: &Path) -> Result<TopologyConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// File (or default) configuration with overrides applied, validated
pub fn resolve_config(path: Option<&Path>, overrides: &Overrides) -> Result<TopologyConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => TopologyConfig::default(),
    };
    if let Some(filter) = overrides.filter {
        config.voltage_filter = filter.into();
    }
    if overrides.no_transformers {
        config.include_transformers = false;
    }
    if overrides.no_merge {
        config.merge_contiguous_lines = false;
    }
    if overrides.separate_islands {
        config.separate_lv_islands = true;
    }
    if overrides.resolve_cycles {
        config.resolve_cycles = true;
    }
    if let Some(overlap) = overrides.island_overlap {
        config.island_overlap = overlap.into();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}
