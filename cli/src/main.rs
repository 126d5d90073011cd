//! Sublink CLI - Terminal driver for a Substrate-style node
//!
//! # Usage
//!
//! ```bash
//! # Read a chain constant
//! sublink -u ws://localhost:9944 constant balances existentialDeposit
//!
//! # Submit a pre-signed extrinsic and watch it to finalization
//! sublink submit 0x<signed-extrinsic> --watch
//!
//! # Run the demonstration sequence against a development node
//! sublink demo --account-key 0x<account-storage-key> --offchain-key 0x<ocw-key>
//! ```
//!
//! Exits 0 when the requested sequence completes, 1 on any failure.

use clap::Parser;

mod args;
mod commands;
mod error;

use args::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(err) = commands::run(cli).await {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
