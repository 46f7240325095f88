mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use cli::{Cli, Commands};
use issue_semsearch::{Config, Result};

use commands::index::cmd_index;
use commands::migrate::cmd_migrate;
use commands::notify::cmd_notify;
use commands::search::cmd_search;
use commands::status::cmd_status;
use commands::sync::cmd_sync;

fn init_logging(verbose: bool) {
    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("issue_semsearch=debug,warn")
        } else {
            EnvFilter::new("warn")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Index { issue_id } => cmd_index(&config, issue_id),
        Commands::Sync { as_login, workers } => cmd_sync(&config, &as_login, workers),
        Commands::Notify { event } => cmd_notify(&config, event),
        Commands::Search {
            query,
            as_login,
            limit,
            json,
        } => cmd_search(&config, &query, &as_login, limit, json),
        Commands::Status => cmd_status(&config),
        Commands::Migrate { yes } => cmd_migrate(&config, yes),
    }
}
