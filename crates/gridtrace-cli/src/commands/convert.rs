//! `gridtrace convert`: load, reconstruct, write.

use std::path::Path;

use anyhow::{bail, Context, Result};
use gridtrace_algo::reconstruct;
use gridtrace_cli::config::{resolve_config, Overrides};
use gridtrace_io::{load_path, OutputWriter};
use tracing::{info, warn};

pub fn handle(
    input: &Path,
    out: &Path,
    config_path: Option<&Path>,
    name: &str,
    overrides: &Overrides,
) -> Result<()> {
    if !input.exists() {
        bail!("Input '{}' is not a directory or a database file", input.display());
    }
    let config = resolve_config(config_path, overrides)?;
    info!(
        filter = %config.voltage_filter,
        islands = config.separate_lv_islands,
        cycles = config.resolve_cycles,
        "reconstructing {}",
        input.display()
    );

    let (raw, mut diagnostics) =
        load_path(input).with_context(|| format!("loading {}", input.display()))?;
    let result = reconstruct(&raw, &config, name).context("reconstructing topology")?;
    diagnostics.merge(result.diagnostics);

    for (network, cycle) in &result.unresolved {
        warn!(%network, cycle = %cycle, "cycle left open");
    }

    let mut writer = OutputWriter::new(out)?;
    for network in &result.networks {
        let entry = writer.write_network(&network.name, &network.store)?;
        println!(
            "{}: {} buses, {} elements -> {}.json",
            entry.name, entry.stats.bus_count, entry.stats.element_count, entry.file_stem
        );
    }
    let path = writer.finish(&diagnostics)?;

    println!(
        "Wrote {} network(s) to {} ({}; {} element(s) removed to break cycles)",
        result.networks.len(),
        path.display(),
        diagnostics.summary(),
        result.removed.len()
    );
    Ok(())
}
