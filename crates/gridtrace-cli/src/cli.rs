use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::{generate, Shell};
use gridtrace_core::{IslandOverlap, VoltageFilter};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gridtrace", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level (RUST_LOG takes precedence when set)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconstruct networks from a Sincal database and write snapshots
    Convert {
        /// Directory holding one `<Table>.csv` per Sincal table, or the SQLite database file
        #[arg(value_hint = ValueHint::AnyPath)]
        input: PathBuf,
        /// Output directory (replaced atomically)
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        out: PathBuf,
        /// TOML file with reconstruction options
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Name of the network in whole-network mode
        #[arg(long, default_value = "network")]
        name: String,
        /// Voltage band to keep
        #[arg(long, value_enum)]
        filter: Option<FilterArg>,
        /// Drop transformers that straddle the filter threshold
        #[arg(long)]
        no_transformers: bool,
        /// Keep every raw segment as its own line
        #[arg(long)]
        no_merge: bool,
        /// One network per low-voltage island instead of the whole network
        #[arg(long)]
        separate_islands: bool,
        /// Open trivial edges until every network is radial
        #[arg(long)]
        resolve_cycles: bool,
        /// Whether islands may share buses
        #[arg(long, value_enum)]
        island_overlap: Option<OverlapArg>,
    },
    /// Load a Sincal database and print record and graph statistics
    Inspect {
        #[arg(value_hint = ValueHint::AnyPath)]
        input: PathBuf,
        #[arg(long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    Lv,
    Mv,
    None,
}

impl From<FilterArg> for VoltageFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Lv => VoltageFilter::Lv,
            FilterArg::Mv => VoltageFilter::Mv,
            FilterArg::None => VoltageFilter::None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OverlapArg {
    Allow,
    Exclusive,
}

impl From<OverlapArg> for IslandOverlap {
    fn from(arg: OverlapArg) -> Self {
        match arg {
            OverlapArg::Allow => IslandOverlap::Allow,
            OverlapArg::Exclusive => IslandOverlap::Exclusive,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

/// Completion script for `shell`, named after the binary
pub fn write_completions(shell: Shell, out: &mut dyn std::io::Write) {
    let mut cmd = build_cli_command();
    let bin = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn test_completions_cover_subcommands() {
        let mut buffer = Vec::new();
        write_completions(Shell::Bash, &mut buffer);
        let script = String::from_utf8(buffer).unwrap();
        assert!(script.contains("gridtrace"));
        assert!(script.contains("convert"));
        assert!(script.contains("--separate-islands"));
    }

    #[test]
    fn test_convert_flags_parse() {
        let cli = Cli::try_parse_from([
            "gridtrace",
            "convert",
            "export",
            "--out",
            "out",
            "--filter",
            "lv",
            "--separate-islands",
            "--island-overlap",
            "exclusive",
        ])
        .unwrap();
        let Commands::Convert {
            filter,
            separate_islands,
            island_overlap,
            no_merge,
            ..
        } = cli.command
        else {
            panic!("expected convert");
        };
        assert_eq!(filter, Some(FilterArg::Lv));
        assert!(separate_islands);
        assert!(!no_merge);
        assert_eq!(island_overlap, Some(OverlapArg::Exclusive));
    }
}
