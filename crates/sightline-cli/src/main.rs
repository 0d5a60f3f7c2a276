//! CLI entry point - the composition root.
//!
//! Parses arguments, installs logging, composes the narration context via
//! bootstrap and dispatches to a handler.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use sightline_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads SIGHTLINE_* defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let json = cli.json;
    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Narrate(args) => {
            let config = CliConfig::new(&cli, args.demo.clone())?;
            let ctx = bootstrap(config).await?;
            handlers::narrate::execute(ctx, args.prompt.clone(), json).await
        }
        Commands::Listen(args) => {
            let config = CliConfig::new(&cli, args.demo.clone())?;
            let ctx = bootstrap(config).await?;
            handlers::listen::execute(ctx, json).await
        }
        Commands::Config => {
            let settings = sightline_cli::bootstrap::settings_from_cli(&cli)?;
            handlers::config::execute(&settings)
        }
    }
}
