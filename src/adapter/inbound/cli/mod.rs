//! Command-line interface.
//!
//! [`execute`] loads configuration, builds the ledger and dispatches to the
//! handler of each command group.

pub mod command;
pub mod competition;
pub mod config;
pub mod output;
pub mod paths;
pub mod payout;
pub mod ticket;

use std::path::PathBuf;

use tracing::debug;

use self::command::{Cli, Commands, ConfigCommand};
use crate::application::PayoutSettings;
use crate::error::Result;
use crate::infrastructure::bootstrap::build_bookie;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::runtime;

/// Resolve and load the configuration file.
///
/// An explicit `--config` must exist. Without one, `~/.bookie/config.toml` is
/// used when present and built-in defaults otherwise.
///
/// # Errors
/// Returns an error if the file cannot be read or is invalid.
pub fn load_config(explicit: Option<&PathBuf>) -> Result<(Option<PathBuf>, Config)> {
    if let Some(path) = explicit {
        return Ok((Some(path.clone()), Config::load(path)?));
    }
    let default = paths::default_config();
    if default.exists() {
        let config = Config::load(&default)?;
        return Ok((Some(default), config));
    }
    debug!("no config file found, using defaults");
    Ok((None, Config::parse_toml("")?))
}

/// Run the parsed command line.
///
/// # Errors
/// Returns the first error raised by the command.
pub async fn execute(cli: Cli) -> Result<()> {
    output::configure(output::OutputConfig::new(cli.json, cli.quiet));
    let (path, config) = load_config(cli.config.as_ref())?;
    config.init_logging();

    match cli.command {
        Commands::Config(ConfigCommand::Check) => {
            config::execute_check(path.as_deref(), &config);
            Ok(())
        }
        Commands::Run => runtime::run(&config).await,
        Commands::Competition(command) => {
            competition::execute(&build_bookie(&config)?, command).await
        }
        Commands::Ticket(command) => ticket::execute(&build_bookie(&config)?, command).await,
        Commands::Payout(command) => {
            let settings = PayoutSettings::from(&config.payout);
            payout::execute(&build_bookie(&config)?, &settings, command).await
        }
    }
}
