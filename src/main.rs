use anyhow::Result;
use clap::{CommandFactory, Parser};

use sweep::cli::{Cli, Command};
use sweep::commands;
use sweep::config::Config;
use sweep::engine::Engine;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbose, cli.quiet);

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    tracing::debug!(?config, "Loaded configuration");

    // Dispatch to subcommand
    match cli.command {
        Command::List(args) => {
            let engine = Engine::from_config(&config);
            commands::list::run(args, &engine)?;
        }
        Command::Info(args) => {
            let engine = Engine::from_config(&config);
            commands::info::run(args, &engine)?;
        }
        Command::Scan(args) => {
            tracing::info!(?args, "Starting scan");
            let engine = Engine::from_config(&config);
            commands::scan::run(args, &engine, cli.quiet)?;
        }
        Command::Clean(args) => {
            tracing::info!(?args, "Starting clean");
            let engine = Engine::from_config(&config);
            commands::clean::run(args, &engine, &config, cli.quiet)?;
        }
        Command::Stats(args) => {
            commands::stats::run(args)?;
        }
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "sweep",
                &mut std::io::stdout(),
            );
        }
        Command::CleanAsRoot => {
            commands::elevated::run(&config)?;
        }
    }

    Ok(())
}

fn init_logging(verbosity: u8, quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sweep={}", level)));

    // stdout carries command output, and the helper's JSON reply
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
