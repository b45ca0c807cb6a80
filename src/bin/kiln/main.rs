//! Kiln CLI - a cross-platform build-file generator

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use kiln::core::project::ProjectParseError;
use kiln::util::shell::Shell;

fn main() {
    if let Err(e) = run() {
        match e.downcast::<ProjectParseError>() {
            Ok(parse) => eprintln!("{:?}", miette::Report::new(parse)),
            Err(e) => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("kiln=debug")
    } else {
        EnvFilter::new("kiln=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let shell = Arc::new(Shell::from_flags(cli.quiet, cli.verbose, cli.color));

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, &shell),
        Commands::Build(args) => commands::build::execute(args, &shell),
        Commands::Test(args) => commands::test::execute(args, &shell),
        Commands::Targets(args) => commands::targets::execute(args, &shell),
        Commands::Cache(args) => commands::cache::execute(args, &shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
