use anyhow::Context;
use bookie::adapter::inbound::cli::command::Cli;
use bookie::adapter::inbound::cli::{self, output};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();
    let json = args.json;

    match cli::execute(args).await {
        Ok(()) => Ok(()),
        Err(e) if json => {
            output::error(&e.to_string());
            std::process::exit(1);
        }
        Err(e) => Err(e).context("bookie command failed"),
    }
}
