//! `gridtrace inspect`: record counts and graph statistics of a raw database.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use gridtrace_cli::OutputFormat;
use gridtrace_core::{graph_stats, GraphStats};
use gridtrace_io::{build_store, open_source, LoadStats, SincalDatabase};
use serde::Serialize;
use tabwriter::TabWriter;

#[derive(Serialize)]
struct Summary {
    records: LoadStats,
    graph: GraphStats,
    warnings: usize,
    errors: usize,
}

pub fn handle(input: &Path, format: OutputFormat) -> Result<()> {
    let source = open_source(input).with_context(|| format!("opening {}", input.display()))?;
    let db = SincalDatabase::open(source.as_ref())?;
    let mut diagnostics = db.diagnostics().clone();
    let (store, records) = build_store(&db, &mut diagnostics);
    let summary = Summary {
        records,
        graph: graph_stats(&store),
        warnings: diagnostics.warning_count(),
        errors: diagnostics.error_count(),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Plain => print_table(&summary)?,
    }
    Ok(())
}

fn print_table(summary: &Summary) -> Result<()> {
    let r = &summary.records;
    let g = &summary.graph;
    let rows: [(&str, String); 15] = [
        ("buses", r.buses.to_string()),
        ("lines", r.lines.to_string()),
        ("transformers", r.transformers.to_string()),
        ("loads", r.loads.to_string()),
        ("photovoltaics", r.photovoltaics.to_string()),
        ("shunts", r.shunts.to_string()),
        ("sources", r.sources.to_string()),
        ("inactive", r.inactive.to_string()),
        ("skipped", r.skipped.to_string()),
        ("graph edges", g.edge_count.to_string()),
        ("components", g.connected_components.to_string()),
        ("degree min/avg/max", format!("{}/{:.2}/{}", g.min_degree, g.avg_degree, g.max_degree)),
        ("elements", g.element_count.to_string()),
        ("warnings", summary.warnings.to_string()),
        ("errors", summary.errors.to_string()),
    ];
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "ITEM\tCOUNT")?;
    for (item, value) in rows {
        writeln!(writer, "{item}\t{value}")?;
    }
    writer.flush()?;
    Ok(())
}
