mod cli;
mod commands;
mod config;
mod paths;
mod privilege;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use pkgkit::CancelToken;
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub cancel: CancelToken,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        cancel: install_interrupt_handler(),
    };

    match cli.command {
        Command::Install(args) => commands::install::run(&ctx, args),
        Command::Remove(args) => commands::remove::run(&ctx, args),
        Command::Status(args) => commands::status::run(&ctx, args),
        Command::Manifest(cmd) => commands::manifest::run(cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "pockit", &mut io::stdout());
            Ok(())
        }
    }
}

/// First Ctrl-C stops scheduling new packages, a second one exits.
fn install_interrupt_handler() -> CancelToken {
    let token = CancelToken::new();
    let handler_token = token.clone();
    let installed = ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        handler_token.cancel();
        eprintln!("\nInterrupted, finishing running installs (Ctrl-C again to abort)");
    });
    if let Err(e) = installed {
        log::warn!("Could not install Ctrl-C handler: {e}");
    }
    token
}
