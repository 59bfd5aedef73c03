mod bot;
mod broadcast;
mod config;
mod gateway;
mod irrigation;
mod platform;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::{AppState, Command};
use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::irrigation::IrrigationClient;
use crate::platform::telegram::TelegramSender;
use crate::platform::MessageSender;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,irrigation_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Allowed users: {:?}", config.telegram.allowed_user_ids);
    if let Some(group_id) = config.telegram.notification_group_id {
        info!("  Notification group: {}", group_id);
    }
    info!(
        "  Gateway: {}:{}",
        config.gateway.bind, config.gateway.port
    );
    info!("  Irrigation API: {}", config.irrigation.status_url);

    let config = Arc::new(config);
    let bot = Bot::new(&config.telegram.bot_token);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let sender: Arc<dyn MessageSender> = Arc::new(TelegramSender::new(bot.clone()));
    let broadcaster = Arc::new(Broadcaster::new(
        sender.clone(),
        config.telegram.allowed_user_ids.clone(),
        config.broadcast.delay(),
    ));
    let irrigation = Arc::new(IrrigationClient::new(config.irrigation.status_url.clone()));

    let state = Arc::new(AppState::new(
        config.clone(),
        sender,
        broadcaster.clone(),
        irrigation,
    ));

    let gateway = tokio::spawn(gateway::serve(config.gateway.clone(), broadcaster));

    info!("Bot is starting...");
    tokio::select! {
        res = gateway => {
            res.context("Gateway task panicked")??;
        }
        res = platform::telegram::run(state, bot) => {
            res?;
        }
    }

    info!("Shutting down");
    Ok(())
}
