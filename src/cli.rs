use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::config::BackendKind;

#[derive(Parser)]
#[command(name = "pockit")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Concurrent package installer for Termux (pip and pkg)", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install packages (the manifest when no specs are given)
    Install(InstallArgs),

    /// Uninstall packages
    Remove(RemoveArgs),

    /// Show installed versions against the manifest
    Status(StatusArgs),

    /// Manage the package manifest
    #[command(subcommand)]
    Manifest(ManifestCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
pub struct InstallArgs {
    /// Package specs, e.g. `requests>=2.28.0 flask numpy==1.26.4`
    pub specs: Vec<String>,

    /// Package tool to use (default from settings)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Manifest file to install from
    #[arg(short, long)]
    pub manifest: Option<String>,

    /// Number of parallel installs
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Attempts per package, including the first
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Dependency levels to expand (0 disables)
    #[arg(long)]
    pub depth: Option<usize>,

    /// Show what would be installed without installing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Add the given specs to the manifest
    #[arg(long)]
    pub save: bool,

    /// Exit with an error status if any package failed
    #[arg(long)]
    pub strict: bool,

    /// Upgrade pip before installing
    #[arg(long)]
    pub self_update: bool,

    /// Refresh package lists before installing (pkg backend)
    #[arg(long)]
    pub update: bool,

    /// Don't send Termux notifications
    #[arg(long)]
    pub no_notify: bool,
}

#[derive(clap::Args)]
pub struct RemoveArgs {
    /// Package names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Package tool to use (default from settings)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Remove orphaned dependencies and caches afterwards
    #[arg(long)]
    pub auto_clean: bool,

    /// Also drop the packages from the manifest
    #[arg(long)]
    pub save: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Exit with an error status if any package failed
    #[arg(long)]
    pub strict: bool,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Manifest file to check
    #[arg(short, long)]
    pub manifest: Option<String>,

    /// Package tool to query (default from settings)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum ManifestCommand {
    /// Print manifest entries
    Show {
        /// Manifest file
        #[arg(short, long)]
        manifest: Option<String>,
    },

    /// Add or update entries
    Add {
        /// Package specs
        #[arg(required = true)]
        specs: Vec<String>,

        /// Manifest file
        #[arg(short, long)]
        manifest: Option<String>,
    },

    /// Remove entries
    Rm {
        /// Package names
        #[arg(required = true)]
        names: Vec<String>,

        /// Manifest file
        #[arg(short, long)]
        manifest: Option<String>,
    },

    /// Write the default package set
    Init {
        /// Manifest file
        #[arg(short, long)]
        manifest: Option<String>,

        /// Overwrite an existing manifest
        #[arg(short, long)]
        force: bool,
    },
}
