//! obr - OSGi Bundle Repository command line
#![allow(clippy::missing_errors_doc)]
//!
//! Loads repository descriptors named in `obr.toml` (or on the command
//! line), resolves bundles against them and deploys the result into a
//! directory.

pub mod cmd;
pub mod config;
pub mod installer;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "obr")]
#[command(author, version, about = "obr - resolve and deploy OSGi bundles")]
pub struct Cli {
    /// Config file (defaults to <config dir>/obr/obr.toml)
    #[arg(long, global = true, env = "OBR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional repository file or directory (repeatable)
    #[arg(short = 'r', long = "repository", global = true)]
    pub repositories: Vec<PathBuf>,

    /// Log resolution steps
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List configured repositories
    Repos,
    /// List available resources
    List {
        /// Only resources whose name or category contains this text
        query: Option<String>,
    },
    /// Show a resource's capabilities and requirements
    Info {
        /// Resource: name or name@version
        resource: String,
    },
    /// Resolve resources without deploying them
    Resolve {
        /// Resources: name or name@version
        targets: Vec<String>,
        /// Extra requirement as namespace:filter, e.g. 'package:(package=org.api)'
        #[arg(long = "require")]
        requirements: Vec<String>,
        /// Ignore optional requirements
        #[arg(long)]
        no_optional: bool,
    },
    /// Resolve resources and deploy them
    Deploy {
        /// Resources: name or name@version
        targets: Vec<String>,
        /// Extra requirement as namespace:filter
        #[arg(long = "require")]
        requirements: Vec<String>,
        /// Ignore optional requirements
        #[arg(long)]
        no_optional: bool,
        /// Start bundles after installing them
        #[arg(long, short = 's')]
        start: bool,
        /// Deploy directory (overrides deploy-dir from the config)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Show what would be installed without copying anything
        #[arg(long)]
        dry_run: bool,
    },
}
