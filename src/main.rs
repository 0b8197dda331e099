mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use config::LanyardConfig;
use launchkit::{Action, Client};

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: LanyardConfig,
}

impl Context {
    /// Build a service client from the loaded config.
    pub fn client(&self) -> Result<Client> {
        Ok(Client::new(self.config.settings())?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
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
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: LanyardConfig::load()?,
    };

    match cli.command {
        Command::List(args) => commands::list::run(&ctx, args).await,
        Command::Search(args) => commands::search::run(&ctx, args).await,
        Command::Info(args) => commands::info::run(&ctx, &args.label).await,
        Command::Start(args) => commands::action::run(&ctx, Action::Start, args).await,
        Command::Stop(args) => commands::action::run(&ctx, Action::Stop, args).await,
        Command::Enable(args) => commands::action::run(&ctx, Action::Enable, args).await,
        Command::Disable(args) => commands::action::run(&ctx, Action::Disable, args).await,
        Command::Unload(args) => commands::action::run(&ctx, Action::Unload, args).await,
        Command::Reload(args) => commands::action::run(&ctx, Action::Reload, args).await,
        Command::Watch(args) => commands::watch::run(&ctx, args).await,
        Command::Config => commands::config::run(&ctx),
    }
}
