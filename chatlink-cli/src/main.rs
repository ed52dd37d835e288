//! chatlink command-line client
//!
//! Joins an intPlatinum chat room from a terminal.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chatlink",
    author,
    version,
    about = "Terminal client for the intPlatinum chat room",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and chat interactively
    Connect(commands::connect::ConnectArgs),

    /// Show or clear remembered connection settings
    Settings(commands::settings::SettingsArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Connect(args) => commands::connect::run(args).await,
        Commands::Settings(args) => commands::settings::run(&args),
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
