//! onetime: share a local file through a single-use download link
//!
//! Register a file with `onetime add`, hand out the printed URL, and run
//! `onetime serve` behind your web server. The first download activates
//! the token; four hours later the link goes dead.

mod commands;
mod config;

use clap::Parser;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = cli.execute().await {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}
