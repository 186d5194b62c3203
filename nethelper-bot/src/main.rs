//! nethelper CLI: run the bot or reset a user. Config from env (and `.env`) plus optional CLI args.

use anyhow::Result;
use clap::Parser;
use nethelper_bot::cli::{Cli, Commands};
use nethelper_bot::{reset_user, run_bot, BotConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => {
            let config = BotConfig::load(token)?;
            run_bot(config).await
        }
        Commands::ResetUser { user_id } => {
            // The token is not needed to touch storage.
            let config = BotConfig::load(Some(String::new()))?;
            if reset_user(&config, user_id).await? {
                println!("User {} reset to idle", user_id);
            } else {
                println!("User {} not found", user_id);
            }
            Ok(())
        }
    }
}
