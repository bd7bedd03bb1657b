//! Command-line interface definitions.
//!
//! Defines the CLI structure for the bookie binary using `clap`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::domain::CompetitionState;

/// Pari-mutuel betting ledger with Lightning payouts
#[derive(Parser, Debug)]
#[command(name = "bookie")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file [default: ~/.bookie/config.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the payout dispatcher and reservation sweeper until Ctrl-C
    Run,

    /// Manage competitions
    #[command(subcommand)]
    Competition(CompetitionCommand),

    /// Inspect tickets
    #[command(subcommand)]
    Ticket(TicketCommand),

    /// Operate the payout queue
    #[command(subcommand)]
    Payout(PayoutCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum CompetitionCommand {
    /// Open a new competition
    Create(CreateArgs),
    /// Show a competition and its tickets
    Show { id: String },
    /// List competitions by owner or by state
    List(ListCompetitionsArgs),
    /// Declare the winning choice, or -1 to cancel and refund
    Complete {
        id: String,
        #[arg(allow_negative_numbers = true)]
        winning_choice: i64,
    },
    /// Delete a competition that never took a stake, or is settled
    Delete {
        id: String,
        /// Wallet that owns the competition
        #[arg(long)]
        account: String,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Wallet that owns the competition and pays out of it
    #[arg(long)]
    pub account: String,
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub info: String,
    #[arg(long, default_value = "")]
    pub banner: String,
    /// Closing time, RFC 3339
    #[arg(long)]
    pub closes: DateTime<Utc>,
    /// Ticket capacity
    #[arg(long)]
    pub tickets: u32,
    /// Minimum stake in sats
    #[arg(long)]
    pub min_bet: u64,
    /// Maximum stake in sats
    #[arg(long)]
    pub max_bet: u64,
    /// Choice title; repeat for each choice
    #[arg(long = "choice", required = true)]
    pub choices: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ListCompetitionsArgs {
    #[arg(long, conflicts_with = "state")]
    pub account: Option<String>,
    /// OPEN, SETTLING or SETTLED
    #[arg(long, default_value = "OPEN")]
    pub state: CompetitionState,
}

#[derive(Subcommand, Debug)]
pub enum TicketCommand {
    /// Show one ticket
    Show { id: String },
    /// List tickets of an account or a competition
    List(ListTicketsArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ListTicketsArgs {
    #[arg(long)]
    pub account: Option<String>,
    #[arg(long)]
    pub competition: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PayoutCommand {
    /// Queue one ticket for payout again
    Retry { ticket: String },
    /// Queue every failed payout again
    RetryFailed {
        /// Limit to one competition
        #[arg(long)]
        competition: Option<String>,
    },
    /// Fail and re-queue payouts whose claim outlived the payment timeout
    /// plus the claim grace.
    Recover,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration and show the effective settings
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn complete_accepts_cancel_sentinel() {
        let cli = Cli::try_parse_from(["bookie", "competition", "complete", "c1", "-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Competition(CompetitionCommand::Complete {
                winning_choice: -1,
                ..
            })
        ));
    }

    #[test]
    fn create_collects_repeated_choices() {
        let cli = Cli::try_parse_from([
            "bookie",
            "competition",
            "create",
            "--account",
            "w1",
            "--name",
            "Final",
            "--closes",
            "2030-01-01T00:00:00Z",
            "--tickets",
            "10",
            "--min-bet",
            "10",
            "--max-bet",
            "100",
            "--choice",
            "Home",
            "--choice",
            "Away",
        ])
        .unwrap();
        let Commands::Competition(CompetitionCommand::Create(args)) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.choices, ["Home", "Away"]);
    }

    #[test]
    fn ticket_list_needs_a_filter() {
        assert!(Cli::try_parse_from(["bookie", "ticket", "list"]).is_err());
    }
}
