mod cli;
mod commands;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use pingone_provider::logging;
use pingone_provider::provider::Provider;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };
    log::debug!("Verbosity {}", ctx.verbose);

    match cli.command {
        Command::Types => commands::schema::types(&offline_registry(&ctx)?),
        Command::Schema { type_name } => {
            commands::schema::describe(&ctx, &offline_registry(&ctx)?, &type_name)
        }
        Command::Validate { type_name, file } => {
            commands::plan::validate(&ctx, &offline_registry(&ctx)?, &type_name, &file)
        }
        Command::Plan(args) => commands::plan::plan(&ctx, &offline_registry(&ctx)?, &args),
        Command::Import { type_name, id } => commands::import::run(&ctx, &type_name, &id),
        Command::Config => commands::config::show(&ctx),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "pingone-provider", &mut io::stdout());
            Ok(())
        }
    }
}

/// Registry for commands that never call the API
fn offline_registry(ctx: &Context) -> Result<declarative::Registry> {
    let config = commands::load_config(ctx)?;
    Ok(Provider::offline(&config).registry())
}
