pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Fabstir Context Vault CLI
#[derive(Parser, Debug)]
#[command(name = "vault-cli")]
#[command(version = "1.0.0")]
#[command(about = "Seal, store and unseal policy-gated contexts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seal text for a recipient and store it as a blob
    Seal(commands::SealArgs),

    /// Retrieve a sealed blob and decrypt it
    Open(commands::OpenArgs),

    /// Mint a session key and print its certificate
    ///
    /// The printed certificate is a live credential: until it expires, anyone
    /// holding it can open every context sealed for this address. It is meant
    /// for wallet-integration debugging; do not store or share it.
    Session(commands::SessionArgs),

    /// Run the whole pipeline in memory
    Demo(commands::DemoArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Seal(args) => commands::seal(args).await,
        Commands::Open(args) => commands::open(args).await,
        Commands::Session(args) => commands::session(args).await,
        Commands::Demo(args) => commands::demo(args).await,
    }
}
