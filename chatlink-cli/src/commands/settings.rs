//! Settings subcommand implementation

use anyhow::Result;
use chatlink::SettingsStore;
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "CHATLINK_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    action: SettingsAction,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the remembered settings
    Show,
    /// Forget the remembered settings
    Clear,
}

pub fn run(args: &SettingsArgs) -> Result<()> {
    chatlink_observability::init_minimal_logging();
    let store = super::settings_store(args.settings.clone())?;

    match args.action {
        SettingsAction::Show => {
            let settings = store.load();
            println!("file:     {}", store.path().display());
            println!("host:     {}", settings.host);
            println!("port:     {}", settings.port);
            println!("username: {}", settings.username);
            println!("remember: {}", settings.remember);
        }
        SettingsAction::Clear => {
            store.clear()?;
            println!("Cleared saved settings");
        }
    }
    Ok(())
}
