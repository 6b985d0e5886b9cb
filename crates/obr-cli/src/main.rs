//! obr - OSGi Bundle Repository CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use obr_cli::cmd::{self, Session};
use obr_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let session = Session::open(cli.config.as_deref(), &cli.repositories)?;

    match cli.command {
        Commands::Repos => cmd::repos::repos(&session),
        Commands::List { query } => cmd::list::list(&session, query.as_deref()),
        Commands::Info { resource } => cmd::info::info(&session, &resource),
        Commands::Resolve {
            targets,
            requirements,
            no_optional,
        } => cmd::resolve::resolve(&session, &targets, &requirements, no_optional),
        Commands::Deploy {
            targets,
            requirements,
            no_optional,
            start,
            dir,
            dry_run,
        } => cmd::deploy::deploy(
            &session,
            &cmd::deploy::DeployArgs {
                targets: &targets,
                requirements: &requirements,
                no_optional,
                start,
                dir: dir.as_deref(),
                dry_run,
            },
        ),
    }
}
