use anyhow::{Context, Result};
use clap::Parser;
use clap_complete::Shell;
use gridtrace_cli::config::Overrides;
use gridtrace_cli::{write_completions, Cli, Commands};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install logger: {err}");
    }

    if let Err(err) = run(cli) {
        error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert {
            input,
            out,
            config,
            name,
            filter,
            no_transformers,
            no_merge,
            separate_islands,
            resolve_cycles,
            island_overlap,
        } => {
            let overrides = Overrides {
                filter,
                no_transformers,
                no_merge,
                separate_islands,
                resolve_cycles,
                island_overlap,
            };
            commands::convert::handle(&input, &out, config.as_deref(), &name, &overrides)
        }
        Commands::Inspect { input, format } => commands::inspect::handle(&input, format),
        Commands::Completions { shell, out } => completions(shell, out.as_deref()),
    }
}

fn completions(shell: Shell, out: Option<&Path>) -> Result<()> {
    let Some(path) = out else {
        write_completions(shell, &mut io::stdout());
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut file =
        fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_completions(shell, &mut file);
    info!(?shell, file = %path.display(), "completion script written");
    Ok(())
}
