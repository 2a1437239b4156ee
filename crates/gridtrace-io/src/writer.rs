//! Output directory writer for reconstructed networks.
//!
//! Every network lands in the output directory as:
//! - `<name>.json` - the [`NetworkSnapshot`]
//! - `<name>.dot` - a Graphviz rendering of the bus graph
//!
//! plus one `manifest.json` describing all networks and the diagnostics of
//! the run. Files are first written to a sibling `<name>.tmp` directory that
//! is renamed into place by [`OutputWriter::finish`].
//!
//! An existing output directory is only replaced when it is empty or holds a
//! `manifest.json` written by gridtrace; anything else is refused.

use anyhow::{bail, Context, Result};
use gridtrace_core::{graph_stats, render_dot, Diagnostics, GraphStats, NetworkSnapshot, TopologyStore};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One entry of `manifest.json`
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub file_stem: String,
    pub stats: GraphStats,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    generator: String,
    networks: &'a [ManifestEntry],
    diagnostics: &'a Diagnostics,
}

/// Turn a network name into a portable file stem.
///
/// Anything outside `[A-Za-z0-9._-]` becomes `_`, so `"12.trafo_5 #2"`
/// becomes `"12.trafo_5__2"`.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "network".to_string()
    } else {
        stem
    }
}

const GENERATOR: &str = "gridtrace";

/// Whether `dir` may be deleted to make room for a new output
fn is_replaceable(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(true);
    }
    if !dir.is_dir() {
        return Ok(false);
    }
    let mut entries =
        fs::read_dir(dir).with_context(|| format!("listing output directory: {}", dir.display()))?;
    if entries.next().is_none() {
        return Ok(true);
    }
    let Ok(text) = fs::read_to_string(dir.join("manifest.json")) else {
        return Ok(false);
    };
    let written_by_us = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|manifest| manifest.get("generator")?.as_str().map(str::to_owned))
        .is_some_and(|generator| generator.starts_with(GENERATOR));
    Ok(written_by_us)
}

pub struct OutputWriter {
    temp_dir: PathBuf,
    final_dir: PathBuf,
    entries: Vec<ManifestEntry>,
    stems: HashSet<String>,
}

impl OutputWriter {
    pub fn new(output_path: impl AsRef<Path>) -> Result<Self> {
        let final_dir = output_path.as_ref().to_path_buf();
        let Some(name) = final_dir.file_name() else {
            bail!(
                "output path {} does not name a directory of its own",
                final_dir.display()
            );
        };
        if !is_replaceable(&final_dir)? {
            bail!(
                "refusing to replace {}: it exists and was not written by {GENERATOR}",
                final_dir.display()
            );
        }
        let parent = final_dir.parent().unwrap_or_else(|| Path::new(""));
        let temp_dir = parent.join(format!("{}.tmp", name.to_string_lossy()));

        if temp_dir.is_dir() {
            fs::remove_dir_all(&temp_dir).with_context(|| {
                format!("cleaning up stale temp directory: {}", temp_dir.display())
            })?;
        }
        fs::create_dir_all(&temp_dir)
            .with_context(|| format!("creating temp directory: {}", temp_dir.display()))?;

        Ok(Self {
            temp_dir,
            final_dir,
            entries: Vec::new(),
            stems: HashSet::new(),
        })
    }

    /// Write the snapshot and DOT rendering of one network
    pub fn write_network(&mut self, name: &str, store: &TopologyStore) -> Result<&ManifestEntry> {
        let base = file_stem(name);
        let mut stem = base.clone();
        let mut n = 2;
        while !self.stems.insert(stem.clone()) {
            stem = format!("{base}_{n}");
            n += 1;
        }

        let snapshot = NetworkSnapshot::capture(name, store);
        let json_path = self.temp_dir.join(format!("{stem}.json"));
        let json = serde_json::to_string_pretty(&snapshot)
            .with_context(|| format!("serializing network {name}"))?;
        fs::write(&json_path, json)
            .with_context(|| format!("writing snapshot: {}", json_path.display()))?;

        let dot_path = self.temp_dir.join(format!("{stem}.dot"));
        fs::write(&dot_path, render_dot(store, name))
            .with_context(|| format!("writing graph: {}", dot_path.display()))?;

        debug!(network = name, file = %json_path.display(), "network written");
        self.entries.push(ManifestEntry {
            name: name.to_string(),
            file_stem: stem,
            stats: graph_stats(store),
        });
        self.entries
            .last()
            .context("manifest entry vanished after push")
    }

    /// Write `manifest.json` and move the directory into place
    pub fn finish(self, diagnostics: &Diagnostics) -> Result<PathBuf> {
        let manifest = Manifest {
            generator: format!("{GENERATOR} {}", env!("CARGO_PKG_VERSION")),
            networks: &self.entries,
            diagnostics,
        };
        let manifest_path = self.temp_dir.join("manifest.json");
        let json = serde_json::to_string_pretty(&manifest).context("serializing manifest to JSON")?;
        fs::write(&manifest_path, json)
            .with_context(|| format!("writing manifest: {}", manifest_path.display()))?;

        if self.final_dir.exists() {
            if !is_replaceable(&self.final_dir)? {
                bail!(
                    "refusing to replace {}: it was changed during the run",
                    self.final_dir.display()
                );
            }
            fs::remove_dir_all(&self.final_dir).with_context(|| {
                format!("removing existing output directory: {}", self.final_dir.display())
            })?;
        }
        fs::rename(&self.temp_dir, &self.final_dir).with_context(|| {
            format!(
                "atomic rename: {} -> {}",
                self.temp_dir.display(),
                self.final_dir.display()
            )
        })?;
        info!(
            networks = self.entries.len(),
            dir = %self.final_dir.display(),
            "output committed"
        );
        Ok(self.final_dir)
    }
}
