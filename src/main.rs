use chartsmith::cli::{Cli, Commands};
use chartsmith::handle_build;
use clap::Parser;
use colored::*;
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> chartsmith::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    match cli.command {
        Commands::Build { target } => {
            handle_build(target.args(), target.is_chart(), cli.config.as_deref())?;
        }
    }
    Ok(())
}
