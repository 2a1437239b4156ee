pub mod cli;
pub mod config;

pub use cli::{build_cli_command, write_completions, Cli, Commands, FilterArg, OverlapArg, OutputFormat};
