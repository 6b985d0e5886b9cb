//! `obr deploy`

use super::Session;
use crate::installer::{DirectoryInstaller, DryRunInstaller};
use crate::ui::{self, ConsoleReporter};
use anyhow::{Context, Result, bail};
use obr_core::DeploymentReport;
use std::path::Path;
use std::sync::Arc;

/// Arguments of `obr deploy`.
#[derive(Debug)]
pub struct DeployArgs<'a> {
    /// Resources to deploy.
    pub targets: &'a [String],
    /// Extra `namespace:filter` requirements.
    pub requirements: &'a [String],
    /// Ignore optional requirements.
    pub no_optional: bool,
    /// Start bundles after install.
    pub start: bool,
    /// Deploy directory override.
    pub dir: Option<&'a Path>,
    /// Only print what would happen.
    pub dry_run: bool,
}

/// Resolve, then install into the deploy directory in dependency order.
pub fn deploy(session: &Session, args: &DeployArgs<'_>) -> Result<()> {
    let mut resolver = session
        .resolver(args.targets, args.requirements)?
        .with_reporter(Arc::new(ConsoleReporter));
    let resolved = resolver.resolve_with(&session.options(args.no_optional));

    ui::print_resolution(&resolver);
    if !resolved {
        bail!(
            "Unable to deploy: {} unsatisfied requirement(s)",
            resolver.unsatisfied_requirements().len()
        );
    }

    if args.dry_run {
        let mut installer = DryRunInstaller::default();
        resolver.deploy(&mut installer, args.start)?;
        println!();
        println!("Dry run, nothing was installed:");
        for action in &installer.actions {
            println!("   {action}");
        }
        return Ok(());
    }

    let dir = args
        .dir
        .map(Path::to_path_buf)
        .or_else(|| session.config.deploy_dir.clone())
        .context("No deploy directory: pass --dir or set deploy-dir in obr.toml")?;
    let mut installer = DirectoryInstaller::open(&dir)
        .with_context(|| format!("Failed to open deploy directory {}", dir.display()))?;

    let report = resolver.deploy(&mut installer, args.start)?;
    finish(&report)
}

fn finish(report: &DeploymentReport) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }
    for failure in &report.failures {
        eprintln!("   {}: {}", failure.resource, failure.error);
    }
    bail!("{} resource(s) failed to deploy", report.failures.len())
}
