//! CLI parser.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nethelper")]
#[command(about = "Telegram network helper bot: ping, DNS, WHOIS, TLS and external IP", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bot (config from env; token can override BOT_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Clear one user's conversation state and data.
    ResetUser {
        /// Telegram user id.
        user_id: i64,
    },
}
