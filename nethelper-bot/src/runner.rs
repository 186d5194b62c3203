//! Main entry: init logging, validate config, build components, clear stale RUNNING tags,
//! then poll until Ctrl-C.

use anyhow::{Context, Result};
use nethelper_core::init_tracing;
use nethelper_dispatcher::run_polling;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::components::{build_bot_components, open_repository, Probes};
use crate::config::BotConfig;

/// Cancels `token` on the first Ctrl-C. The in-flight dispatch still finishes.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("step: shutdown requested, finishing current event");
                token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

#[instrument(skip(config))]
pub async fn run_bot(config: BotConfig) -> Result<()> {
    config.validate()?;
    init_tracing(&config.log_file)
        .with_context(|| format!("Failed to initialize logging to {}", config.log_file))?;

    info!(
        database_url = %config.database_url,
        poll_timeout_secs = config.poll_timeout_secs,
        poll_interval_secs = ?config.poll_interval_secs,
        "Initializing bot"
    );

    let probes = Probes::system()?;
    let components = build_bot_components(&config, probes).await?;

    if config.reset_running_on_start {
        let cleared = components
            .repo
            .reset_running_states()
            .await
            .context("Failed to reset stale RUNNING states")?;
        if cleared > 0 {
            warn!(cleared = cleared, "step: stale RUNNING states cleared");
        }
    }

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    info!("Bot started, polling for updates");
    let cursor = run_polling(
        components.telegram.clone(),
        &components.dispatcher,
        config.polling_config(),
        shutdown,
    )
    .await;
    info!(cursor = cursor, "Bot stopped");
    Ok(())
}

/// Operator escape hatch: clears one user's state and data.
#[instrument(skip(config))]
pub async fn reset_user(config: &BotConfig, user_id: i64) -> Result<bool> {
    let repo = open_repository(config).await?;
    let found = repo
        .reset_user(user_id)
        .await
        .with_context(|| format!("Failed to reset user {}", user_id))?;
    Ok(found)
}
